// Symbol map linker
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

//! Emits the symbol table of each compiled program for use in
//!   deobfuscating stack traces.
//!
//! Symbol maps are private artifacts:
//!   they are written beneath the linker's auxiliary directory
//!   (`<extra>/symbol-maps/<strong>.symbolMap`)
//!   and never deployed.

use super::{LinkError, Linker, LinkerContext, LinkerOrder};
use crate::artifact::{ArtifactSet, EmittedArtifact, Visibility};

#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolMapsLinker;

impl SymbolMapsLinker {
    pub const NAME: &'static str = "symbol-maps";

    /// Extension of emitted symbol maps.
    pub const EXTENSION: &'static str = ".symbolMap";
}

impl Linker for SymbolMapsLinker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Export CompilationResult symbol maps"
    }

    fn order(&self) -> LinkerOrder {
        LinkerOrder::Post
    }

    fn is_shardable(&self) -> bool {
        true
    }

    /// Symbol maps were already emitted per permutation.
    fn link(
        &self,
        _ctx: &LinkerContext,
        artifacts: &ArtifactSet,
    ) -> Result<ArtifactSet, LinkError> {
        Ok(artifacts.clone())
    }

    fn link_permutation(
        &self,
        ctx: &LinkerContext,
        artifacts: &ArtifactSet,
    ) -> Result<ArtifactSet, LinkError> {
        let mut out = artifacts.clone();

        for result in artifacts.compilations() {
            let token = match result.symbol_map() {
                Some(token) => token,
                None => continue,
            };

            let path = format!("{}{}", result.strong_name(), Self::EXTENSION);
            let symbols = ctx.store().get(token)?;

            tracing::debug!(path = path.as_str(), bytes = symbols.len(), "emitting symbol map");

            out.add(
                EmittedArtifact::new(Self::NAME, path, symbols)
                    .with_visibility(Visibility::Private),
            );
        }

        Ok(out)
    }
}
