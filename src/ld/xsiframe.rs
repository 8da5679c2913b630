// Cross-site iframe linker
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

//! Primary linker loading compiled programs into a hidden iframe.
//!
//! The selection script and compiled programs may be served from a
//!   different origin than the host page.
//! Compiled code executes inside an iframe created by the selection
//!   script,
//!     where `$wnd` refers to the host window.
//!
//! By default the program is not loaded by a `<script src>` within the
//!   iframe;
//!     the initial fragment is instead wrapped in a call to
//!     `<func>.onScriptDownloaded`,
//!       which receives the program as a list of string chunks and
//!       installs each into the iframe.
//! Deferred fragments are wrapped likewise in
//!   `<func>.runAsyncCallback<n>`.
//! Set the configuration property `installCode` to `false` to emit bare
//!   programs instead.
//!
//! External `<script>` references cannot be honored,
//!   since the selection script does not use `document.write`;
//!     their presence is an error unless `xsiframe.failIfScriptTag` is
//!     `false`.

use super::selection::{
    self, resources, SelectionScriptLinker, Template, FRAGMENT_EXTENSION,
    FRAGMENT_SUBDIR, FRAGMENT_SUBDIR_PROPERTY,
};
use super::{LinkError, Linker, LinkerContext, LinkerOrder};
use crate::artifact::{ArtifactSet, EmittedArtifact, PropertiesMapping};
use crate::js::{string_literal, TextOutput};
use crate::perm::PermutationsMap;

/// Configuration property enabling program installation by the
///   selection script.
pub const INSTALL_CODE_PROPERTY: &str = "installCode";

/// Configuration property making `<script>` references fatal.
pub const FAIL_IF_SCRIPT_TAG_PROPERTY: &str = "xsiframe.failIfScriptTag";

/// Marks the boundaries between chunks of the initial fragment until
///   they are split into separate strings.
const CHUNK_SEPARATOR: &str = "__SCRIPT_CHUNK_SEPARATOR_MARKER__";

/// Public file mapping property values to compiled programs.
pub const COMPILATION_MAPPINGS: &str = "compilation-mappings.txt";

#[derive(Debug, Clone, Copy, Default)]
pub struct CrossSiteIframeLinker;

impl CrossSiteIframeLinker {
    pub const NAME: &'static str = "xsiframe";

    pub fn new() -> Self {
        Self
    }

    fn install_code(ctx: &LinkerContext) -> bool {
        ctx.catalog().bool_config(INSTALL_CODE_PROPERTY, true)
    }
}

impl Linker for CrossSiteIframeLinker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Cross-Site-Iframe"
    }

    fn order(&self) -> LinkerOrder {
        LinkerOrder::Primary
    }

    fn is_shardable(&self) -> bool {
        true
    }

    fn link(
        &self,
        ctx: &LinkerContext,
        artifacts: &ArtifactSet,
    ) -> Result<ArtifactSet, LinkError> {
        selection::link_module(self, ctx, artifacts)
    }

    fn link_permutation(
        &self,
        ctx: &LinkerContext,
        artifacts: &ArtifactSet,
    ) -> Result<ArtifactSet, LinkError> {
        selection::link_permutation(self, ctx, artifacts)
    }
}

impl SelectionScriptLinker for CrossSiteIframeLinker {
    fn compilation_extension(&self) -> &'static str {
        ".cache.js"
    }

    fn selection_script_template(&self) -> &'static str {
        "CrossSiteIframeTemplate.js"
    }

    fn module_prefix(&self, ctx: &LinkerContext, strong_name: &str) -> String {
        let func = ctx.module_function_name();
        let subdir = ctx
            .catalog()
            .string_config(FRAGMENT_SUBDIR_PROPERTY, FRAGMENT_SUBDIR);

        let mut out = TextOutput::new(ctx.is_output_compact());

        out.print(&format!("var __gwtModuleFunction = $wnd.{};", func))
            .newline_opt()
            .print("var $sendStats = __gwtModuleFunction.__sendStats;")
            .newline_opt()
            .print("$sendStats('moduleStartup', 'moduleEvalStart');")
            .newline_opt()
            .print(&format!(
                "var $gwt_version = \"{}\";",
                env!("CARGO_PKG_VERSION")
            ))
            .newline_opt()
            .print(&format!("var $strongName = '{}';", strong_name))
            .newline_opt()
            .print("var $doc = $wnd.document;")
            .newline_opt()
            .print("function __gwtStartLoadingFragment(frag) {")
            .newline_opt()
            .print(&format!(
                "var fragFile = '{}/' + $strongName + '/' + frag + '{}';",
                subdir, FRAGMENT_EXTENSION,
            ))
            .newline_opt()
            .print("return __gwtModuleFunction.__startLoadingFragment(fragFile);")
            .newline_opt()
            .print("}")
            .newline_opt()
            .print(
                "function __gwtInstallCode(code) {\
                 return __gwtModuleFunction.__installRunAsyncCode(code);}",
            )
            .newline_opt()
            .print(
                "var $stats = $wnd.__gwtStatsEvent ? \
                 function(a) {return $wnd.__gwtStatsEvent(a);} : null;",
            )
            .newline_opt()
            .print(
                "var $sessionId = $wnd.__gwtStatsSessionId ? \
                 $wnd.__gwtStatsSessionId : null;",
            )
            .newline_opt();

        out.into_string()
    }

    fn module_suffix(&self, ctx: &LinkerContext, _strong_name: &str) -> String {
        let mut out = TextOutput::new(ctx.is_output_compact());

        out.print("$sendStats('moduleStartup', 'moduleEvalEnd');")
            .newline_opt()
            .print(
                "gwtOnLoad(__gwtModuleFunction.__errFn, \
                 __gwtModuleFunction.__moduleName, \
                 __gwtModuleFunction.__moduleBase, \
                 __gwtModuleFunction.__softPermutationId,\
                 __gwtModuleFunction.__computePropValue);",
            )
            .newline_opt()
            .print("$sendStats('moduleStartup', 'end');");

        let mut suffix = out.into_string();
        suffix.push_str("\n//@ sourceURL=0.js\n");
        suffix
    }

    fn deferred_fragment_suffix(
        &self,
        _ctx: &LinkerContext,
        fragment: usize,
        _strong_name: &str,
    ) -> String {
        format!("\n//@ sourceURL={}.js\n", fragment)
    }

    fn script_chunk_separator(&self, ctx: &LinkerContext) -> &'static str {
        if Self::install_code(ctx) {
            CHUNK_SEPARATOR
        } else {
            ""
        }
    }

    fn wrap_primary_fragment(
        &self,
        ctx: &LinkerContext,
        script: String,
    ) -> Result<String, LinkError> {
        if !Self::install_code(ctx) {
            return Ok(script + "\n");
        }

        let chunks = script
            .split(CHUNK_SEPARATOR)
            .map(string_literal)
            .collect::<Vec<_>>();

        Ok(format!(
            "{}.onScriptDownloaded([{}]);\n",
            ctx.module_function_name(),
            chunks.join(", "),
        ))
    }

    fn wrap_deferred_fragment(
        &self,
        ctx: &LinkerContext,
        fragment: usize,
        script: String,
    ) -> Result<String, LinkError> {
        if !Self::install_code(ctx) {
            return Ok(script);
        }

        Ok(format!(
            "$wnd.{}.runAsyncCallback{}({})\n",
            ctx.module_function_name(),
            fragment,
            string_literal(&script),
        ))
    }

    fn inject_resources(
        &self,
        ctx: &LinkerContext,
        template: &mut Template,
        artifacts: &ArtifactSet,
    ) -> Result<(), LinkError> {
        if let Some(script) = artifacts.scripts().next() {
            if ctx.catalog().bool_config(FAIL_IF_SCRIPT_TAG_PROPERTY, true) {
                return Err(LinkError::ScriptTagsUnsupported {
                    linker: Self::NAME,
                    src: script.src().into(),
                });
            }

            tracing::info!(
                linker = Self::NAME,
                scripts = artifacts.scripts().count(),
                "ignoring <script> references unsupported by this linker",
            );
        }

        resources::inject_stylesheets(template, artifacts);
        Ok(())
    }

    fn template_tokens(&self, ctx: &LinkerContext) -> Vec<(&'static str, String)> {
        let (start_obf, end_obf) = if ctx.is_output_compact() {
            ("", "")
        } else {
            ("/*", "*/")
        };

        vec![
            ("__WINDOW_DEF__", "window".into()),
            ("__DOCUMENT_DEF__", "document".into()),
            ("__START_OBFUSCATED_ONLY__", start_obf.into()),
            ("__END_OBFUSCATED_ONLY__", end_obf.into()),
            ("__BEGIN_TRY_BLOCK__", String::new()),
            ("__END_TRY_BLOCK_AND_START_CATCH__", String::new()),
            ("__MODULE_FUNC_ERROR_CATCH__", String::new()),
            ("__END_CATCH_BLOCK__", String::new()),
            ("__INSTALL_CODE__", Self::install_code(ctx).to_string()),
        ]
    }

    /// Record the property mapping for server-side selection.
    fn emit_module_artifacts(
        &self,
        _ctx: &LinkerContext,
        perms: &PermutationsMap,
        out: &mut ArtifactSet,
    ) -> Result<(), LinkError> {
        if perms.is_empty() {
            return Ok(());
        }

        let mapping = PropertiesMapping::new(Self::NAME, perms.clone());

        out.add(EmittedArtifact::from_text(
            Self::NAME,
            COMPILATION_MAPPINGS,
            &mapping.serialize(),
        ));
        out.add(mapping);

        Ok(())
    }
}
