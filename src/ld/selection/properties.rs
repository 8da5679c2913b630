// Runtime property providers
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

//! Declarations of runtime property providers and their possible values.
//!
//! The selection script expects the objects `providers` and `values` to
//!   be in scope;
//!     `values[name][value]` is the index of `value` along the dimension
//!     of the answer table belonging to `name`.

use crate::js::quoted;
use crate::property::PropertyCatalog;

/// JavaScript registering each runtime property of `catalog`,
///   in catalog order.
pub fn properties_js(catalog: &PropertyCatalog) -> String {
    let mut out = String::new();

    for prop in catalog.runtime() {
        let name = quoted(prop.name(), '\'');

        out.push_str(&format!(
            "providers[{}] = function(){};values[{}] = {{",
            name,
            prop.provider(),
            name,
        ));

        for (i, value) in prop.values().iter().enumerate() {
            if i > 0 {
                out.push(',');
            }

            out.push_str(&format!("{}:{}", quoted(value, '\''), i));
        }

        out.push_str("};");
    }

    out
}
