// External resource injection
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

//! Loading of external stylesheets and scripts declared by the module.
//!
//! Each injector is guarded by a global table
//!   (`__gwt_stylesLoaded` or `__gwt_scriptsLoaded`)
//!   so that a resource shared by multiple modules on the same page is
//!   loaded only once.
//! Relative URLs are resolved against `base`,
//!   the module base URL computed by the selection script.

use super::template::{Slot, Template};
use crate::artifact::ArtifactSet;
use crate::js::quoted;

/// Whether `url` must be resolved against the module base.
///
/// Paths beginning with `/` are host-relative and used as-is,
///   as are URLs with a scheme.
pub fn is_relative_url(url: &str) -> bool {
    !url.starts_with('/') && url::Url::parse(url).is_err()
}

fn url_expr(url: &str) -> String {
    if is_relative_url(url) {
        format!("base + {}", quoted(url, '\''))
    } else {
        quoted(url, '\'')
    }
}

/// Code appending a `<link>` to the document head for `url`.
pub fn stylesheet_injector(url: &str) -> String {
    let key = quoted(url, '\'');

    format!(
        "if (!__gwt_stylesLoaded[{key}]) {{\n\
         \x20 var l = $doc.createElement('link');\n\
         \x20 __gwt_stylesLoaded[{key}] = l;\n\
         \x20 l.setAttribute('rel', 'stylesheet');\n\
         \x20 l.setAttribute('href', {href});\n\
         \x20 $doc.getElementsByTagName('head')[0].appendChild(l);\n\
         }}\n",
        key = key,
        href = url_expr(url),
    )
}

/// Code writing a `<script>` tag for `url` into the document.
pub fn script_injector(url: &str) -> String {
    let key = quoted(url, '\'');

    format!(
        "if (!__gwt_scriptsLoaded[{key}]) {{\n\
         \x20 __gwt_scriptsLoaded[{key}] = true;\n\
         \x20 document.write('<script language=\"javascript\" src=\"' + \
         {src} + '\"></script>');\n\
         }}\n",
        key = key,
        src = url_expr(url),
    )
}

/// Insert an injector for each stylesheet in `artifacts`,
///   in declaration order.
pub fn inject_stylesheets(template: &mut Template, artifacts: &ArtifactSet) {
    for sheet in artifacts.stylesheets() {
        template.insert(Slot::Styles, &stylesheet_injector(sheet.src()));
    }
}

/// Insert an injector for each script in `artifacts`,
///   in declaration order.
pub fn inject_scripts(template: &mut Template, artifacts: &ArtifactSet) {
    for script in artifacts.scripts() {
        template.insert(Slot::Scripts, &script_injector(script.src()));
    }
}
