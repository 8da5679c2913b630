// Linker orchestration
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

//! Orchestration of the linker stack.
//!
//! [`StandardLinkerContext`] owns the registered linkers and the
//!   compiled permutations,
//!     and drives them through the link.
//!
//! Stack Discipline
//! ================
//! Linkers are processed in declaration order,
//!   each being pushed onto a stack;
//!     [`LinkerOrder::Pre`] and [`LinkerOrder::Primary`] linkers run as
//!     they are pushed.
//! The primary linker,
//!   which is always declared last,
//!   is then popped without running again,
//!     and the rest of the stack is unwound,
//!       running only [`LinkerOrder::Post`] linkers.
//! Given the declaration `[A(pre), B(post), C(post), P(primary)]`,
//!   the linkers run in the order `A, P, C, B`.
//!
//! Each linker receives the artifacts produced by the one before it and
//!   its result replaces them entirely.
//! If any linker fails,
//!   the link fails;
//!     nothing the failed linker produced is kept,
//!     and no later linker runs.

use super::{LinkError, LinkerOrder, LinkerRegistration};
use crate::artifact::{Artifact, ArtifactSet, ResourceReference, Visibility};
use crate::cache::BlobStore;
use crate::fs::{Filesystem, ResourceLoader, SearchPathLoader};
use crate::js::{JsOptimizer, OutputMode, StandardOptimizer};
use crate::perm::{CompilationResult, PermutationRegistry, PermutationResult};
use crate::property::PropertyCatalog;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Description of the module being linked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkConfig {
    pub module_name: String,

    /// Name of the JavaScript function through which the module is
    ///   bootstrapped.
    pub module_function_name: String,

    pub catalog: PropertyCatalog,
    pub output_mode: OutputMode,

    /// External stylesheets in declaration order.
    pub stylesheets: Vec<String>,

    /// External scripts in declaration order.
    pub scripts: Vec<String>,
}

impl LinkConfig {
    /// Configuration for `module_name` whose function name is derived
    ///   from the module name.
    pub fn new<S: Into<String>>(module_name: S) -> Self {
        let module_name = module_name.into();
        let module_function_name = module_name.replace('.', "_");

        Self {
            module_name,
            module_function_name,
            ..Default::default()
        }
    }

    pub fn with_function_name<S: Into<String>>(mut self, name: S) -> Self {
        self.module_function_name = name.into();
        self
    }

    pub fn with_catalog(mut self, catalog: PropertyCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_stylesheet<S: Into<String>>(mut self, src: S) -> Self {
        self.stylesheets.push(src.into());
        self
    }

    pub fn with_script<S: Into<String>>(mut self, src: S) -> Self {
        self.scripts.push(src.into());
        self
    }
}

/// Everything a [`Linker`](super::Linker) may consult.
pub struct LinkerContext {
    config: LinkConfig,
    store: Arc<dyn BlobStore>,
    optimizer: Box<dyn JsOptimizer>,
    resources: Box<dyn ResourceLoader>,
}

impl LinkerContext {
    /// Context using the [`StandardOptimizer`] and resources built into
    ///   the linker.
    pub fn new(config: LinkConfig, store: Arc<dyn BlobStore>) -> Self {
        Self {
            config,
            store,
            optimizer: Box::new(StandardOptimizer),
            resources: Box::new(SearchPathLoader::default()),
        }
    }

    pub fn with_optimizer(mut self, optimizer: Box<dyn JsOptimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_resources(mut self, resources: Box<dyn ResourceLoader>) -> Self {
        self.resources = resources;
        self
    }

    pub fn module_name(&self) -> &str {
        &self.config.module_name
    }

    pub fn module_function_name(&self) -> &str {
        &self.config.module_function_name
    }

    pub fn catalog(&self) -> &PropertyCatalog {
        &self.config.catalog
    }

    pub fn output_mode(&self) -> OutputMode {
        self.config.output_mode
    }

    /// Whether generated JavaScript should omit optional whitespace.
    pub fn is_output_compact(&self) -> bool {
        self.config.output_mode.is_compact()
    }

    pub fn store(&self) -> &dyn BlobStore {
        self.store.as_ref()
    }

    /// Load the text resource `name`,
    ///   such as a selection script template.
    pub fn load_resource(&self, name: &str) -> Result<String, LinkError> {
        self.resources
            .load(name)
            .map_err(|source| LinkError::TemplateLoad {
                name: name.into(),
                source,
            })
    }

    /// Check and optimize generated JavaScript according to the
    ///   configured output mode.
    pub fn optimize_javascript(&self, js: &str) -> Result<String, LinkError> {
        Ok(self.optimizer.optimize(js, self.config.output_mode)?)
    }
}

/// Directories receiving link output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirs {
    /// Public artifacts;
    ///   the deployable module.
    pub out: PathBuf,

    /// Private artifacts,
    ///   beneath a subdirectory per linker.
    /// Private artifacts are discarded if [`None`].
    pub extra: Option<PathBuf>,

    /// Deploy artifacts.
    /// Deploy artifacts are discarded if [`None`].
    pub deploy: Option<PathBuf>,
}

impl OutputDirs {
    pub fn new<P: Into<PathBuf>>(out: P) -> Self {
        Self {
            out: out.into(),
            extra: None,
            deploy: None,
        }
    }

    pub fn with_extra<P: Into<PathBuf>>(mut self, extra: P) -> Self {
        self.extra = Some(extra.into());
        self
    }

    pub fn with_deploy<P: Into<PathBuf>>(mut self, deploy: P) -> Self {
        self.deploy = Some(deploy.into());
        self
    }
}

/// Owner of the linker stack and of the permutations being linked.
pub struct StandardLinkerContext {
    ctx: LinkerContext,
    linkers: Vec<LinkerRegistration>,
    registry: PermutationRegistry,

    /// Artifacts describing the module itself,
    ///   present at the start of every link.
    module_artifacts: ArtifactSet,

    /// Per-permutation output of every compilation linked so far.
    gathered: ArtifactSet,
}

impl StandardLinkerContext {
    /// Prepare to link with the given linker stack.
    ///
    /// Exactly one linker must be [`LinkerOrder::Primary`],
    ///   and it must be last.
    pub fn new(
        ctx: LinkerContext,
        linkers: Vec<LinkerRegistration>,
    ) -> Result<Self, LinkError> {
        let primaries: Vec<_> = linkers
            .iter()
            .filter(|reg| reg.order() == LinkerOrder::Primary)
            .map(|reg| reg.linker().name())
            .collect();

        if primaries.len() != 1 {
            return Err(LinkError::InvalidLinkerOrder(format!(
                "expected exactly one primary linker, found {} ({})",
                primaries.len(),
                primaries.join(", "),
            )));
        }

        match linkers.last() {
            Some(reg) if reg.order() == LinkerOrder::Primary => (),
            _ => {
                return Err(LinkError::InvalidLinkerOrder(format!(
                    "primary linker `{}` must be declared last",
                    primaries[0],
                )))
            }
        }

        let config = &ctx.config;
        let module_artifacts = config
            .stylesheets
            .iter()
            .enumerate()
            .map(|(i, src)| Artifact::Stylesheet(ResourceReference::new(i, src)))
            .chain(config.scripts.iter().enumerate().map(|(i, src)| {
                Artifact::Script(ResourceReference::new(i, src.as_str()))
            }))
            .collect();

        Ok(Self {
            ctx,
            linkers,
            registry: PermutationRegistry::new(),
            module_artifacts,
            gathered: ArtifactSet::new(),
        })
    }

    pub fn context(&self) -> &LinkerContext {
        &self.ctx
    }

    /// Register the output of a compiled permutation.
    ///
    /// See [`PermutationRegistry::register`].
    pub fn add_compilation(
        &mut self,
        perm: PermutationResult,
    ) -> Result<&CompilationResult, LinkError> {
        Ok(self.registry.register(self.ctx.store(), perm)?)
    }

    /// Distinct compiled programs in order of registration.
    pub fn compilations(&self) -> impl Iterator<Item = &CompilationResult> {
        self.registry.iter()
    }

    /// Link a single compiled program using only the shardable linkers.
    pub fn invoke_link_for_one_permutation(
        &self,
        result: Arc<CompilationResult>,
    ) -> Result<ArtifactSet, LinkError> {
        let mut working = self.module_artifacts.clone();
        working.add(result);

        self.run_stack(working, true)
    }

    /// Run every linker over `artifacts`,
    ///   which are typically the gathered results of
    ///   [`invoke_link_for_one_permutation`](Self::invoke_link_for_one_permutation).
    pub fn invoke_final_link(
        &self,
        artifacts: ArtifactSet,
    ) -> Result<ArtifactSet, LinkError> {
        let mut working = self.module_artifacts.clone();
        working.add_all(&artifacts);

        self.run_stack(working, false)
    }

    /// Link each registered compilation not yet emitted and then the
    ///   module as a whole.
    ///
    /// The output of earlier calls is retained,
    ///   so compilations registered after a link are linked by the next
    ///   one without emitting the others again.
    pub fn link(&mut self) -> Result<ArtifactSet, LinkError> {
        let mut gathered = self.gathered.clone();
        let mut linked = 0;

        for result in self.registry.iter() {
            let result = Arc::new(result.clone());

            if gathered.is_emitted(result.strong_name()) {
                // Property maps may have been added since it was emitted.
                for info in result.selection_information() {
                    gathered.add(info);
                }

                gathered.replace(result);
                continue;
            }

            let perm = self.invoke_link_for_one_permutation(result)?;
            gathered.add_all(&perm);
            linked += 1;
        }

        let artifacts = self.invoke_final_link(gathered.clone())?;
        self.gathered = gathered;

        tracing::info!(
            module = self.ctx.module_name(),
            compilations = self.registry.len(),
            linked,
            artifacts = artifacts.len(),
            "link complete",
        );

        Ok(artifacts)
    }

    fn run_stack(
        &self,
        mut working: ArtifactSet,
        per_permutation: bool,
    ) -> Result<ArtifactSet, LinkError> {
        let mut stack = Vec::with_capacity(self.linkers.len());

        for reg in &self.linkers {
            if per_permutation && !reg.linker().is_shardable() {
                continue;
            }

            stack.push(reg);

            if reg.order().is_forward() {
                working = self.invoke(reg, &working, per_permutation)?;
            }
        }

        // The primary linker has already run.
        if matches!(stack.last(), Some(reg) if reg.order() == LinkerOrder::Primary)
        {
            stack.pop();
        }

        while let Some(reg) = stack.pop() {
            if reg.order() == LinkerOrder::Post {
                working = self.invoke(reg, &working, per_permutation)?;
            }
        }

        Ok(working)
    }

    fn invoke(
        &self,
        reg: &LinkerRegistration,
        artifacts: &ArtifactSet,
        per_permutation: bool,
    ) -> Result<ArtifactSet, LinkError> {
        let linker = reg.linker();

        tracing::debug!(
            linker = linker.name(),
            order = %reg.order(),
            per_permutation,
            "invoking linker: {}",
            linker.description(),
        );

        let result = if per_permutation {
            linker.link_permutation(&self.ctx, artifacts)
        } else {
            linker.link(&self.ctx, artifacts)
        };

        result.map_err(|e| {
            tracing::error!(linker = linker.name(), error = %e, "linker failed");

            LinkError::Linker {
                linker: linker.name(),
                source: Box::new(e),
            }
        })
    }

    /// Write every emitted artifact of `artifacts` to `fs`.
    ///
    /// Private artifacts are written beneath a directory named after the
    ///   linker that emitted them.
    /// Writing to a path that already exists is an
    ///   [`LinkError::OutputCollision`].
    pub fn produce_output(
        &self,
        fs: &mut dyn Filesystem,
        artifacts: &ArtifactSet,
        dirs: &OutputDirs,
    ) -> Result<(), LinkError> {
        let mut written = 0;

        for emitted in artifacts.emitted() {
            let base = match emitted.visibility() {
                Visibility::Public => Some(dirs.out.clone()),
                Visibility::Private => {
                    dirs.extra.as_ref().map(|extra| extra.join(emitted.linker()))
                }
                Visibility::Deploy => dirs.deploy.clone(),
            };

            let Some(base) = base else {
                tracing::debug!(
                    path = emitted.partial_path(),
                    visibility = ?emitted.visibility(),
                    "no output directory; skipping",
                );
                continue;
            };

            let path = resolve(&base, emitted.partial_path());

            fs.write(&path, emitted.contents()).map_err(|e| {
                match e.kind() {
                    ErrorKind::AlreadyExists => {
                        LinkError::OutputCollision(path.clone())
                    }
                    _ => LinkError::Io(e),
                }
            })?;

            tracing::debug!(path = %path.display(), "wrote artifact");
            written += 1;
        }

        tracing::info!(files = written, out = %dirs.out.display(), "output written");

        Ok(())
    }
}

/// Join a `/`-separated partial path onto `base`.
fn resolve(base: &Path, partial: &str) -> PathBuf {
    partial
        .split('/')
        .filter(|seg| !seg.is_empty())
        .fold(base.to_path_buf(), |path, seg| path.join(seg))
}
