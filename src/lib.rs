// Permutation linker library
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

//! Linker for modules compiled into many JavaScript permutations.
//!
//! A module is compiled once for each combination of its selection
//!   properties
//!     (browser, locale, and the like).
//! The linker gathers those compiled programs,
//!   gives each distinct program a content-derived
//!   [strong name](digest::StrongName),
//!   and emits the files to deploy along with a small _selection
//!   script_ that determines in the browser which program to load.
//!
//! The [`ld`] module is the heart of the system;
//!   start there.
//! Link input is described by a [`manifest`].

#[macro_use]
extern crate static_assertions;

pub mod artifact;
pub mod cache;
pub mod digest;
pub mod fs;
pub mod js;
pub mod ld;
pub mod manifest;
pub mod perm;
pub mod property;
pub mod range;
