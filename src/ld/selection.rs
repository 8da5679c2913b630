// Selection script linkers
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

//! Primary linkers that load the module through a _selection script_.
//!
//! The selection script `<module>.nocache.js` is the only file a host
//!   page references.
//! It determines the value of each runtime property in the browser,
//!   looks up the strong name of the matching compiled program,
//!   and loads `<strong>.cache.js`.
//! Because the selection script changes whenever any permutation changes,
//!   it must never be cached;
//!     compiled programs are named by a digest of their contents and
//!     so may be cached forever.
//!
//! A [`SelectionScriptLinker`] supplies only what varies between output
//!   formats:
//!     how compiled programs are wrapped,
//!     which template produces the selection script,
//!     and any additional tokens in that template.
//! [`link_permutation`] and [`link_module`] do the rest and are intended
//!   to be called from the corresponding [`Linker`] methods.
//!
//! Per-permutation linking emits,
//!   for each compiled program:
//!
//!   - `<strong><ext>`,
//!       the initial fragment wrapped by the module prefix and suffix,
//!       optionally split into chunks at statement boundaries;
//!   - `deferredjs/<strong>/<n>.cache.js` for each deferred fragment `n`;
//!   - an [`EmittedCompilation`] recording the path and digest of the
//!       initial fragment as written;
//!       and
//!   - [`SelectionInformation`](crate::perm::SelectionInformation) for
//!       every property assignment selecting the program.
//!
//! Compilations that already have an [`EmittedCompilation`] are skipped.
//!
//! The final link gathers that selection information into the selection
//!   script.

use crate::artifact::{
    Artifact, ArtifactSet, EmittedArtifact, EmittedCompilation,
};
use crate::ld::{LinkError, Linker, LinkerContext};
use crate::perm::{CompilationResult, PermutationsMap};
use crate::property::PropertyCatalog;
use crate::range::RangeMap;

pub mod permutations;
pub mod properties;
pub mod resources;
pub mod template;

pub use permutations::permutations_js;
pub use properties::properties_js;
pub use template::{Slot, Template};

/// Directory of deferred fragments relative to the output directory.
pub const FRAGMENT_SUBDIR: &str = "deferredjs";

/// Extension of deferred fragment files.
pub const FRAGMENT_EXTENSION: &str = ".cache.js";

/// Configuration property naming the directory from which the browser
///   loads deferred fragments.
pub const FRAGMENT_SUBDIR_PROPERTY: &str = "iframe.linker.deferredjs.subdir";

/// Configuration property limiting the size of initial fragment chunks.
///
/// Negative values disable chunking.
pub const CHUNK_SIZE_PROPERTY: &str = "iframe.linker.script.chunk.size";

/// Selection property that,
///   when fixed to `true`,
///   disables chunking so that source maps remain accurate.
pub const USE_SOURCE_MAPS_PROPERTY: &str = "compiler.useSourceMaps";

/// Output format hooks of a primary linker loading its module through a
///   selection script.
///
/// Only the compilation extension,
///   template,
///   and module prefix and suffix are required;
///     every other hook defaults to doing nothing.
pub trait SelectionScriptLinker: Linker {
    /// Extension of the file containing a program's initial fragment,
    ///   including the leading `.`.
    fn compilation_extension(&self) -> &'static str;

    /// Name of the resource holding the selection script template.
    fn selection_script_template(&self) -> &'static str;

    /// Code preceding the initial fragment of the program `strong_name`.
    fn module_prefix(&self, ctx: &LinkerContext, strong_name: &str) -> String;

    /// Code following the initial fragment of the program `strong_name`.
    fn module_suffix(&self, ctx: &LinkerContext, strong_name: &str) -> String;

    fn deferred_fragment_prefix(
        &self,
        _ctx: &LinkerContext,
        _fragment: usize,
    ) -> String {
        String::new()
    }

    fn deferred_fragment_suffix(
        &self,
        _ctx: &LinkerContext,
        _fragment: usize,
        _strong_name: &str,
    ) -> String {
        String::new()
    }

    /// Text placed between chunks of the initial fragment.
    ///
    /// See [`split_primary_javascript`].
    fn script_chunk_separator(&self, _ctx: &LinkerContext) -> &'static str {
        ""
    }

    /// Final form of the initial fragment,
    ///   given its prefixed,
    ///     chunked,
    ///     and suffixed text.
    fn wrap_primary_fragment(
        &self,
        _ctx: &LinkerContext,
        script: String,
    ) -> Result<String, LinkError> {
        Ok(script)
    }

    /// Final form of deferred fragment `fragment`,
    ///   given its prefixed and suffixed text.
    fn wrap_deferred_fragment(
        &self,
        _ctx: &LinkerContext,
        _fragment: usize,
        script: String,
    ) -> Result<String, LinkError> {
        Ok(script)
    }

    /// Insert loaders for the module's external stylesheets and scripts.
    fn inject_resources(
        &self,
        _ctx: &LinkerContext,
        template: &mut Template,
        artifacts: &ArtifactSet,
    ) -> Result<(), LinkError> {
        resources::inject_stylesheets(template, artifacts);
        resources::inject_scripts(template, artifacts);
        Ok(())
    }

    /// Tokens to substitute in the selection script in addition to
    ///   `__MODULE_FUNC__` and `__MODULE_NAME__`.
    ///
    /// Tokens are substituted in order,
    ///   after the standard tokens.
    fn template_tokens(&self, _ctx: &LinkerContext) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Add artifacts describing the module as a whole to `out` after
    ///   the selection script has been emitted.
    fn emit_module_artifacts(
        &self,
        _ctx: &LinkerContext,
        _perms: &PermutationsMap,
        _out: &mut ArtifactSet,
    ) -> Result<(), LinkError> {
        Ok(())
    }
}

/// Emit the files of every compilation in `artifacts` not yet emitted.
pub fn link_permutation<L: SelectionScriptLinker + ?Sized>(
    linker: &L,
    ctx: &LinkerContext,
    artifacts: &ArtifactSet,
) -> Result<ArtifactSet, LinkError> {
    let mut out = artifacts.clone();

    for result in artifacts.compilations() {
        if artifacts.is_emitted(result.strong_name()) {
            tracing::debug!(
                linker = linker.name(),
                strong_name = result.strong_name().as_str(),
                "compilation already emitted",
            );
            continue;
        }

        for artifact in emit_compilation(linker, ctx, result)? {
            out.add(artifact);
        }
    }

    Ok(out)
}

/// Emit the selection script and any other module-wide artifacts.
pub fn link_module<L: SelectionScriptLinker + ?Sized>(
    linker: &L,
    ctx: &LinkerContext,
    artifacts: &ArtifactSet,
) -> Result<ArtifactSet, LinkError> {
    let perms = PermutationsMap::from_artifacts(artifacts);
    let mut out = artifacts.clone();

    out.add(emit_selection_script(linker, ctx, artifacts, &perms)?);
    linker.emit_module_artifacts(ctx, &perms, &mut out)?;

    Ok(out)
}

/// Files and selection information for a single compiled program.
pub fn emit_compilation<L: SelectionScriptLinker + ?Sized>(
    linker: &L,
    ctx: &LinkerContext,
    result: &CompilationResult,
) -> Result<Vec<Artifact>, LinkError> {
    let strong_name = result.strong_name().as_str();
    let js = result.javascript(ctx.store())?;
    let mut emitted = Vec::with_capacity(js.len() + 2);

    let initial = js.first().map(String::as_str).unwrap_or("");
    let primary = primary_fragment(linker, ctx, result, initial)?;

    tracing::debug!(
        linker = linker.name(),
        strong_name,
        fragments = js.len(),
        "emitting compilation",
    );

    let path = format!("{}{}", strong_name, linker.compilation_extension());
    let record = EmittedCompilation::new(
        result.strong_name().clone(),
        path.as_str(),
        primary.as_bytes(),
    );

    emitted.push(EmittedArtifact::from_text(linker.name(), path, &primary).into());

    for (i, fragment) in js.iter().enumerate().skip(1) {
        let mut text = linker.deferred_fragment_prefix(ctx, i);
        text.push_str(fragment);
        text.push_str(&linker.deferred_fragment_suffix(ctx, i, strong_name));

        let wrapped = linker.wrap_deferred_fragment(ctx, i, text)?;

        emitted.push(
            EmittedArtifact::from_text(
                linker.name(),
                format!(
                    "{}/{}/{}{}",
                    FRAGMENT_SUBDIR, strong_name, i, FRAGMENT_EXTENSION
                ),
                &wrapped,
            )
            .into(),
        );
    }

    emitted.extend(
        result
            .selection_information()
            .into_iter()
            .map(Artifact::from),
    );
    emitted.push(record.into());

    Ok(emitted)
}

fn primary_fragment<L: SelectionScriptLinker + ?Sized>(
    linker: &L,
    ctx: &LinkerContext,
    result: &CompilationResult,
    js: &str,
) -> Result<String, LinkError> {
    let strong_name = result.strong_name().as_str();
    let catalog = ctx.catalog();

    let chunked = split_primary_javascript(
        result.statement_ranges(0),
        js,
        catalog.int_config(CHUNK_SIZE_PROPERTY, -1),
        linker.script_chunk_separator(ctx),
        catalog,
    );

    let mut text = linker.module_prefix(ctx, strong_name);
    text.push_str(&chunked);
    text.push_str(&linker.module_suffix(ctx, strong_name));

    linker.wrap_primary_fragment(ctx, text)
}

/// Generate the selection script `<module>.nocache.js`.
pub fn emit_selection_script<L: SelectionScriptLinker + ?Sized>(
    linker: &L,
    ctx: &LinkerContext,
    artifacts: &ArtifactSet,
    perms: &PermutationsMap,
) -> Result<EmittedArtifact, LinkError> {
    let script = selection_script(linker, ctx, artifacts, perms)?;
    let path = format!("{}.nocache.js", ctx.module_name());

    tracing::debug!(
        linker = linker.name(),
        path = path.as_str(),
        permutations = perms.len(),
        "emitting selection script",
    );

    Ok(EmittedArtifact::from_text(linker.name(), path, &script))
}

/// Fill the linker's template and optimize the result.
pub fn selection_script<L: SelectionScriptLinker + ?Sized>(
    linker: &L,
    ctx: &LinkerContext,
    artifacts: &ArtifactSet,
    perms: &PermutationsMap,
) -> Result<String, LinkError> {
    let text = ctx.load_resource(linker.selection_script_template())?;
    let mut template = Template::parse(&text);

    linker.inject_resources(ctx, &mut template, artifacts)?;

    template.insert(Slot::Properties, &properties_js(ctx.catalog()));
    template.insert(
        Slot::Permutations,
        &permutations_js(perms, ctx.catalog(), ctx.module_name())?,
    );

    let mut tokens = vec![
        ("__MODULE_FUNC__", ctx.module_function_name().to_string()),
        ("__MODULE_NAME__", ctx.module_name().to_string()),
    ];
    tokens.extend(linker.template_tokens(ctx));

    ctx.optimize_javascript(&template.render(&tokens))
}

/// Whether `catalog` fixes source maps on,
///   which forbids rearranging program text.
fn uses_source_maps(catalog: &PropertyCatalog) -> bool {
    catalog
        .get_selection(USE_SOURCE_MAPS_PROPERTY)
        .and_then(|p| p.fixed())
        .map_or(false, |v| v.eq_ignore_ascii_case("true"))
}

/// Split `js` into chunks of roughly `chars_per_chunk` bytes at the
///   statement boundaries given by `ranges`.
///
/// Chunks are joined by `separator`,
///   always on a fresh line.
/// Statements are emitted in range order,
///   with `;` inserted between adjacent statements within a chunk unless
///   the first already ends in `;`, `}` or a newline;
///     text outside of any range is dropped.
/// A single statement larger than the limit forms its own chunk.
///
/// The text is returned unchanged if `chars_per_chunk` is negative,
///   if `ranges` is `None`,
///   if source maps are in use,
///   or if any range lies outside of `js`.
pub fn split_primary_javascript(
    ranges: Option<&RangeMap>,
    js: &str,
    chars_per_chunk: i64,
    separator: &str,
    catalog: &PropertyCatalog,
) -> String {
    let ranges = match ranges {
        Some(ranges) if chars_per_chunk >= 0 && !uses_source_maps(catalog) => {
            ranges
        }
        _ => return js.into(),
    };

    let statements = ranges
        .ranges()
        .iter()
        .map(|r| js.get(r.start..r.end))
        .collect::<Option<Vec<_>>>();

    let statements = match statements {
        Some(statements) => statements,
        None => {
            tracing::warn!(
                bytes = js.len(),
                "statement ranges exceed program text; not splitting",
            );
            return js.into();
        }
    };

    // Checked non-negative above.
    let limit = chars_per_chunk as usize;

    let mut out = String::with_capacity(js.len());
    let mut in_chunk = 0usize;

    for stmt in statements {
        if in_chunk > 0 && in_chunk + stmt.len() > limit {
            if !out.ends_with('\n') {
                out.push('\n');
            }

            out.push_str(separator);
            in_chunk = 0;
        } else if in_chunk > 0 && !out.ends_with(&['\n', ';', '}'][..]) {
            out.push(';');
        }

        out.push_str(stmt);
        in_chunk += stmt.len();
    }

    out
}
