// Light filesystem abstractions
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

//! Lightweight filesystem abstraction.
//!
//! This makes no attempt to be comprehensive---it
//!   includes only what the linker needs:
//!
//!   - [`ResourceLoader`] locates named resources such as selection
//!       script templates; and
//!   - [`Filesystem`] receives the files produced by a link.
//!
//!
//! Writing Files Once
//! ==================
//! [`WriteOnceFilesystem`] refuses to write any path more than once,
//!   and refuses to overwrite a file that existed before the link began.
//! Two artifacts resolving to the same path indicate a bug upstream
//!   (such as two programs with the same strong name),
//!     and silently keeping only the last of them would hide it.

use fxhash::FxBuildHasher;
use std::collections::HashSet;
use std::fs;
use std::hash::BuildHasher;
use std::io::{self, ErrorKind, Result, Write};
use std::path::{Path, PathBuf};

/// Resources compiled into the linker,
///   available regardless of search path.
const BUILTIN_RESOURCES: &[(&str, &str)] = &[(
    "CrossSiteIframeTemplate.js",
    include_str!("ld/xsiframe/CrossSiteIframeTemplate.js"),
)];

/// Source of named text resources.
pub trait ResourceLoader {
    /// Load the resource `name`.
    ///
    /// A missing resource yields an error of kind
    ///   [`ErrorKind::NotFound`].
    fn load(&self, name: &str) -> Result<String>;
}

/// Searches a list of directories,
///   falling back to resources built into the linker.
#[derive(Debug, Clone, Default)]
pub struct SearchPathLoader {
    dirs: Vec<PathBuf>,
}

impl SearchPathLoader {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }
}

impl ResourceLoader for SearchPathLoader {
    /// The first directory containing `name` wins.
    fn load(&self, name: &str) -> Result<String> {
        for dir in &self.dirs {
            match fs::read_to_string(dir.join(name)) {
                Ok(text) => return Ok(text),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }

        BUILTIN_RESOURCES
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, text)| text.to_string())
            .ok_or_else(|| {
                io::Error::new(
                    ErrorKind::NotFound,
                    format!("resource `{}` not found", name),
                )
            })
    }
}

/// Destination of link output.
pub trait Filesystem {
    /// Write `contents` to a new file at `path`,
    ///   creating parent directories as necessary.
    ///
    /// If `path` was already written,
    ///   or already exists,
    ///   an error of kind [`ErrorKind::AlreadyExists`] is returned and
    ///   nothing is written.
    fn write(&mut self, path: &Path, contents: &[u8]) -> Result<()>;
}

/// Writes each path at most once.
///
/// Directories are created lazily,
///   the first time a file is written beneath them.
#[derive(Debug)]
pub struct WriteOnceFilesystem<S = FxBuildHasher>
where
    S: BuildHasher,
{
    written: HashSet<PathBuf, S>,
}

impl<S> WriteOnceFilesystem<S>
where
    S: BuildHasher + Default,
{
    /// New filesystem with no recorded paths.
    pub fn new() -> Self {
        Self {
            written: Default::default(),
        }
    }

    /// Number of files written.
    pub fn write_len(&self) -> usize {
        self.written.len()
    }
}

impl<S> Default for WriteOnceFilesystem<S>
where
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> Filesystem for WriteOnceFilesystem<S> {
    fn write(&mut self, path: &Path, contents: &[u8]) -> Result<()> {
        if self.written.contains(path) {
            return Err(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("`{}` was already written", path.display()),
            ));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // `create_new` fails if the file exists,
        //   including files left over from a previous link.
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;

        file.write_all(contents)?;
        self.written.insert(path.to_path_buf());

        Ok(())
    }
}
