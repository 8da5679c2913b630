// Runtime permutation selection
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

//! Code assigning `strongName` in the selection script.
//!
//! With more than one permutation,
//!   the script builds a table named `answers` with one dimension per
//!   runtime property,
//!     populated by `unflattenKeylistIntoAnswers`,
//!   and indexes it using the values computed by each property's
//!   provider.
//! The template is expected to define both of those functions.

use crate::js::quoted;
use crate::ld::LinkError;
use crate::perm::PermutationsMap;
use crate::property::PropertyCatalog;
use std::collections::BTreeSet;

/// JavaScript selecting a strong name from `perms`.
///
/// A module with no permutations at all alerts the user and returns
///   from the enclosing function.
/// A single permutation needs no runtime selection.
pub fn permutations_js(
    perms: &PermutationsMap,
    catalog: &PropertyCatalog,
    module_name: &str,
) -> Result<String, LinkError> {
    let mut keys = perms.keys();

    match (keys.next(), keys.next()) {
        (None, _) => Ok(format!(
            "alert(\"GWT module '{}' may need to be (re)compiled\");return;",
            module_name,
        )),

        (Some(only), None) => Ok(format!(
            "strongName = {};",
            quoted(only.strong_name().as_str(), '\''),
        )),

        _ => answers_js(perms, catalog),
    }
}

fn answers_js(
    perms: &PermutationsMap,
    catalog: &PropertyCatalog,
) -> Result<String, LinkError> {
    let mut out = String::new();
    let mut used = BTreeSet::new();

    for (key, maps) in perms {
        for map in maps {
            out.push_str("unflattenKeylistIntoAnswers([");

            for (i, prop) in catalog.runtime().enumerate() {
                let value = map
                    .get(prop.name())
                    .ok_or_else(|| LinkError::MissingProperty(prop.name().into()))?;

                if i > 0 {
                    out.push(',');
                }

                out.push_str(&quoted(value, '\''));
                used.insert(prop.name());
            }

            out.push_str(&format!(
                "], {}",
                quoted(key.strong_name().as_str(), '\'')
            ));

            if key.soft_id() > 0 {
                out.push_str(&format!(" + ':{}'", key.soft_id()));
            }

            out.push_str(");\n");
        }
    }

    out.push_str("strongName = answers");

    for name in used {
        out.push_str(&format!("[computePropValue({})]", quoted(name, '\'')));
    }

    out.push(';');

    Ok(out)
}
