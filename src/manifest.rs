// Link manifest
//
//  Copyright (C) 2014-2023 Ryan Specialty, LLC.
//
//  This file is part of permlink.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Link manifest reader.
//!
//! A manifest describes everything the linker needs to know about a
//!   module:
//!     its name,
//!     its properties,
//!     the linkers to run,
//!     and the output of each compiled permutation.
//!
//! ```xml
//! <link module="com.example.Hello" function="hello" output-mode="obfuscated">
//!   <linker name="symbol-maps"/>
//!   <linker name="xsiframe"/>
//!   <property name="user.agent" values="gecko1_8,safari">
//!     <provider>{ return 'safari'; }</provider>
//!   </property>
//!   <property name="locale" values="default,en" fixed="en"/>
//!   <configuration-property name="installCode" value="false"/>
//!   <stylesheet src="Hello.css"/>
//!   <permutation id="0">
//!     <properties><set name="user.agent" value="safari"/></properties>
//!     <soft><set name="formfactor" value="mobile"/></soft>
//!     <fragment src="perm0.js" ranges="0:10,10:25"/>
//!     <symbol-map src="perm0.symbols"/>
//!   </permutation>
//! </link>
//! ```
//!
//! Program text and symbol maps are read from the files named by `src`,
//!   which are resolved relative to the directory containing the
//!   manifest.
//! Stylesheet and script `src`s are URLs for the browser and are passed
//!   through untouched.
//!
//! Linkers run in declaration order
//!   (see [`crate::ld`]);
//!     a linker's phase may be overridden with `order="pre|primary|post"`.
//! If no linker is declared,
//!   the module is linked by `xsiframe` alone.

use crate::js::OutputMode;
use crate::ld::xsiframe::CrossSiteIframeLinker;
use crate::ld::{LinkConfig, LinkerOrder, LinkerRegistration};
use crate::perm::PermutationResult;
use crate::property::{
    ConfigurationProperty, PropertyCatalog, PropertyMap, SelectionProperty,
};
use crate::range::{Range, RangeMap};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::error::Error;
use std::fmt::{self, Display};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A linker named by the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkerDecl {
    pub name: String,

    /// Phase overriding that of the linker itself.
    pub order: Option<LinkerOrder>,
}

/// Parsed link manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub config: LinkConfig,
    pub linkers: Vec<LinkerDecl>,
    pub permutations: Vec<PermutationResult>,
}

impl Manifest {
    /// Read the manifest at `path`
    ///   along with every file it references.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let xml = read_file(path)?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();

        Self::parse(&xml, base)
    }

    /// Parse a manifest,
    ///   resolving relative paths against `base`.
    pub fn parse<P: Into<PathBuf>>(
        xml: &str,
        base: P,
    ) -> Result<Self, ManifestError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        ManifestParser {
            reader,
            base: base.into(),
        }
        .parse()
    }

    /// Look up each declared linker among the built-in linkers.
    ///
    /// A manifest declaring no linkers is linked by the
    ///   [cross-site iframe linker](crate::ld::xsiframe) alone.
    pub fn registrations(
        &self,
    ) -> Result<Vec<LinkerRegistration>, ManifestError> {
        if self.linkers.is_empty() {
            return Ok(vec![LinkerRegistration::new(Box::new(
                CrossSiteIframeLinker::new(),
            ))]);
        }

        self.linkers
            .iter()
            .map(|decl| {
                let reg = LinkerRegistration::builtin(&decl.name)
                    .ok_or_else(|| ManifestError::UnknownLinker(decl.name.clone()))?;

                Ok(match decl.order {
                    Some(order) => reg.reorder(order),
                    None => reg,
                })
            })
            .collect()
    }
}

fn read_file(path: &Path) -> Result<String, ManifestError> {
    fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

struct ManifestParser<'a> {
    reader: Reader<&'a [u8]>,
    base: PathBuf,
}

impl<'a> ManifestParser<'a> {
    fn next(&mut self) -> Result<Event<'a>, ManifestError> {
        Ok(self.reader.read_event()?)
    }

    fn parse(mut self) -> Result<Manifest, ManifestError> {
        loop {
            match self.next()? {
                Event::Start(ele) if ele.name().as_ref() == b"link" => {
                    return self.link(&ele, false)
                }
                Event::Empty(ele) if ele.name().as_ref() == b"link" => {
                    return self.link(&ele, true)
                }
                Event::Start(ele) | Event::Empty(ele) => {
                    return Err(unexpected(&ele, None))
                }
                Event::Eof => return Err(ManifestError::UnexpectedEof),
                _ => (),
            }
        }
    }

    fn link(
        &mut self,
        ele: &BytesStart,
        empty: bool,
    ) -> Result<Manifest, ManifestError> {
        let mut config = LinkConfig::new(required(ele, "link", "module")?);

        if let Some(func) = attr(ele, "function")? {
            config = config.with_function_name(func);
        }

        if let Some(mode) = attr(ele, "output-mode")? {
            let mode = mode.parse::<OutputMode>().map_err(|reason| {
                ManifestError::BadValue {
                    element: "link",
                    attr: "output-mode",
                    value: mode.clone(),
                    reason,
                }
            })?;

            config = config.with_output_mode(mode);
        }

        let mut catalog = PropertyCatalog::new();
        let mut linkers = Vec::new();
        let mut permutations = Vec::new();

        while !empty {
            match self.next()? {
                Event::Start(ele) => match ele.name().as_ref() {
                    b"property" => {
                        catalog.add_selection(self.property(&ele, false)?);
                    }
                    b"permutation" => {
                        permutations.push(self.permutation(&ele, false)?)
                    }
                    _ => return Err(unexpected(&ele, Some("link"))),
                },

                Event::Empty(ele) => match ele.name().as_ref() {
                    b"linker" => linkers.push(linker_decl(&ele)?),
                    b"property" => {
                        catalog.add_selection(self.property(&ele, true)?);
                    }
                    b"configuration-property" => {
                        catalog.add_configuration(ConfigurationProperty::new(
                            required(&ele, "configuration-property", "name")?,
                            vec![required(
                                &ele,
                                "configuration-property",
                                "value",
                            )?],
                        ));
                    }
                    b"stylesheet" => {
                        config = config
                            .with_stylesheet(required(&ele, "stylesheet", "src")?)
                    }
                    b"script" => {
                        config =
                            config.with_script(required(&ele, "script", "src")?)
                    }
                    b"permutation" => {
                        permutations.push(self.permutation(&ele, true)?)
                    }
                    _ => return Err(unexpected(&ele, Some("link"))),
                },

                Event::End(_) => break,
                Event::Eof => return Err(ManifestError::UnexpectedEof),
                _ => (),
            }
        }

        Ok(Manifest {
            config: config.with_catalog(catalog),
            linkers,
            permutations,
        })
    }

    fn property(
        &mut self,
        ele: &BytesStart,
        empty: bool,
    ) -> Result<SelectionProperty, ManifestError> {
        let name = required(ele, "property", "name")?;
        let values = split_list(&required(ele, "property", "values")?);
        let fixed = attr(ele, "fixed")?;
        let derived = match attr(ele, "derived")? {
            Some(value) => parse_bool("property", "derived", value)?,
            None => false,
        };

        let mut provider = String::new();

        while !empty {
            match self.next()? {
                Event::Start(child) if child.name().as_ref() == b"provider" => {
                    provider = self.text()?;
                }
                Event::Start(child) | Event::Empty(child) => {
                    return Err(unexpected(&child, Some("property")))
                }
                Event::End(_) => break,
                Event::Eof => return Err(ManifestError::UnexpectedEof),
                _ => (),
            }
        }

        let prop =
            SelectionProperty::new(name, values, provider).with_derived(derived);

        Ok(match fixed {
            Some(value) => prop.with_fixed(value),
            None => prop,
        })
    }

    /// Text content up to the end of the current element.
    fn text(&mut self) -> Result<String, ManifestError> {
        let mut out = String::new();

        loop {
            match self.next()? {
                Event::Text(text) => out.push_str(&text.unescape()?),
                Event::CData(cdata) => {
                    out.push_str(&self.reader.decoder().decode(&cdata)?)
                }
                Event::End(_) => return Ok(out),
                Event::Start(child) | Event::Empty(child) => {
                    return Err(unexpected(&child, None))
                }
                Event::Eof => return Err(ManifestError::UnexpectedEof),
                _ => (),
            }
        }
    }

    fn permutation(
        &mut self,
        ele: &BytesStart,
        empty: bool,
    ) -> Result<PermutationResult, ManifestError> {
        let id = required(ele, "permutation", "id")?;
        let id = id.parse().map_err(|_| ManifestError::BadValue {
            element: "permutation",
            attr: "id",
            value: id.clone(),
            reason: "expected a non-negative integer".into(),
        })?;

        let mut perm = PermutationResult::new(id, Vec::new());
        let mut ranges = Vec::new();

        while !empty {
            match self.next()? {
                Event::Start(child) => match child.name().as_ref() {
                    b"properties" => perm.property_maps.push(self.assignments()?),
                    b"soft" => perm.soft_permutations.push(self.assignments()?),
                    _ => return Err(unexpected(&child, Some("permutation"))),
                },

                Event::Empty(child) => match child.name().as_ref() {
                    b"properties" => perm.property_maps.push(PropertyMap::new()),
                    b"soft" => perm.soft_permutations.push(PropertyMap::new()),
                    b"fragment" => {
                        let path = self.resolve(required(&child, "fragment", "src")?);
                        let text = read_file(&path)?;

                        if let Some(list) = attr(&child, "ranges")? {
                            ranges.push(parse_ranges(&list, &text)?);
                        }

                        perm.fragments.push(text);
                    }
                    b"symbol-map" => {
                        let path = self.resolve(required(&child, "symbol-map", "src")?);

                        perm.symbol_map = Some(fs::read(&path).map_err(|source| {
                            ManifestError::Io { path, source }
                        })?);
                    }
                    _ => return Err(unexpected(&child, Some("permutation"))),
                },

                Event::End(_) => break,
                Event::Eof => return Err(ManifestError::UnexpectedEof),
                _ => (),
            }
        }

        if !ranges.is_empty() && ranges.len() != perm.fragments.len() {
            return Err(ManifestError::BadValue {
                element: "fragment",
                attr: "ranges",
                value: format!("{} of {}", ranges.len(), perm.fragments.len()),
                reason: "statement ranges must be given for every fragment \
                         of a permutation or for none"
                    .into(),
            });
        }

        Ok(perm.with_statement_ranges(ranges))
    }

    /// `set` elements up to the end of the current element.
    fn assignments(&mut self) -> Result<PropertyMap, ManifestError> {
        let mut map = PropertyMap::new();

        loop {
            match self.next()? {
                Event::Empty(set) if set.name().as_ref() == b"set" => {
                    map.insert(
                        required(&set, "set", "name")?,
                        required(&set, "set", "value")?,
                    );
                }
                Event::Start(child) | Event::Empty(child) => {
                    return Err(unexpected(&child, None))
                }
                Event::End(_) => return Ok(map),
                Event::Eof => return Err(ManifestError::UnexpectedEof),
                _ => (),
            }
        }
    }

    fn resolve(&self, src: String) -> PathBuf {
        self.base.join(src)
    }
}

fn linker_decl(ele: &BytesStart) -> Result<LinkerDecl, ManifestError> {
    let name = required(ele, "linker", "name")?;

    let order = match attr(ele, "order")? {
        None => None,
        Some(value) => Some(match value.as_str() {
            "pre" => LinkerOrder::Pre,
            "primary" => LinkerOrder::Primary,
            "post" => LinkerOrder::Post,
            _ => {
                return Err(ManifestError::BadValue {
                    element: "linker",
                    attr: "order",
                    value,
                    reason: "expected `pre`, `primary`, or `post`".into(),
                })
            }
        }),
    };

    Ok(LinkerDecl { name, order })
}

/// Value of the attribute `name`,
///   unescaped.
fn attr(ele: &BytesStart, name: &str) -> Result<Option<String>, ManifestError> {
    for attr in ele.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;

        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }

    Ok(None)
}

fn required(
    ele: &BytesStart,
    element: &'static str,
    name: &'static str,
) -> Result<String, ManifestError> {
    attr(ele, name)?.ok_or(ManifestError::MissingAttribute {
        element,
        attr: name,
    })
}

fn unexpected(ele: &BytesStart, parent: Option<&'static str>) -> ManifestError {
    ManifestError::UnexpectedElement {
        name: String::from_utf8_lossy(ele.name().as_ref()).into_owned(),
        parent,
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(
    element: &'static str,
    attr: &'static str,
    value: String,
) -> Result<bool, ManifestError> {
    match value.as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ManifestError::BadValue {
            element,
            attr,
            value,
            reason: "expected `true` or `false`".into(),
        }),
    }
}

/// Parse `start:end` byte ranges of statements within `text`.
fn parse_ranges(list: &str, text: &str) -> Result<RangeMap, ManifestError> {
    let bad = |reason: String| ManifestError::BadValue {
        element: "fragment",
        attr: "ranges",
        value: list.into(),
        reason,
    };

    let mut ranges = Vec::new();
    let mut last_end = 0;

    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (start, end) = item
            .split_once(':')
            .and_then(|(s, e)| Some((s.parse::<usize>().ok()?, e.parse::<usize>().ok()?)))
            .ok_or_else(|| bad(format!("malformed range `{}`", item)))?;

        if start > end || start < last_end || end > text.len() {
            return Err(bad(format!(
                "range `{}` is out of order or exceeds fragment length {}",
                item,
                text.len(),
            )));
        }

        last_end = end;
        ranges.push(Range::new(start, end));
    }

    Ok(RangeMap::for_text(text, ranges))
}

/// Failure to read a link manifest.
#[derive(Debug)]
pub enum ManifestError {
    /// The manifest is not well-formed XML.
    Xml(quick_xml::Error),

    /// An element appeared where it is not permitted.
    UnexpectedElement {
        name: String,
        parent: Option<&'static str>,
    },

    /// The manifest ended before its root element was closed.
    UnexpectedEof,

    MissingAttribute {
        element: &'static str,
        attr: &'static str,
    },

    BadValue {
        element: &'static str,
        attr: &'static str,
        value: String,
        reason: String,
    },

    /// A declared linker is not known.
    UnknownLinker(String),

    /// The manifest or a file it references could not be read.
    Io { path: PathBuf, source: io::Error },
}

impl From<quick_xml::Error> for ManifestError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e)
    }
}

impl Display for ManifestError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Xml(e) => write!(fmt, "malformed manifest: {}", e),
            Self::UnexpectedElement { name, parent: None } => {
                write!(fmt, "unexpected element `{}`", name)
            }
            Self::UnexpectedElement {
                name,
                parent: Some(parent),
            } => write!(fmt, "unexpected element `{}` within `{}`", name, parent),
            Self::UnexpectedEof => write!(fmt, "unexpected end of manifest"),
            Self::MissingAttribute { element, attr } => {
                write!(fmt, "missing `{}/@{}`", element, attr)
            }
            Self::BadValue {
                element,
                attr,
                value,
                reason,
            } => write!(
                fmt,
                "invalid `{}/@{}` value `{}`: {}",
                element, attr, value, reason
            ),
            Self::UnknownLinker(name) => write!(
                fmt,
                "unknown linker `{}` (available: {})",
                name,
                crate::ld::linker::BUILTIN_LINKERS.join(", "),
            ),
            Self::Io { path, .. } => {
                write!(fmt, "unable to read `{}`", path.display())
            }
        }
    }
}

impl Error for ManifestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Xml(e) => Some(e),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
