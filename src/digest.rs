// Strong names of compiled programs
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

//! Content-derived identity of compiled programs.
//!
//! A [`StrongName`] is a digest of the complete text of a compiled
//!   program (all of its fragments, concatenated in order).
//! Two permutations that compile to byte-identical output therefore share
//!   a strong name,
//!     which is what allows the linker to emit each distinct program
//!     exactly once.
//!
//! The strong name is also the stem of the program's output file name
//!   (e.g. `<strong>.cache.js`),
//!     so it must be stable across runs and platforms.
//! We use the first 128 bits of SHA-256,
//!   rendered as 32 upper-case hexadecimal digits;
//!     this is the width that deployed selection scripts and server-side
//!     mapping consumers have always seen.

use sha2::{Digest, Sha256};
use std::fmt::{self, Display};

/// Number of digest bytes retained in a [`StrongName`].
const STRONG_NAME_BYTES: usize = 16;

/// Content hash of a compiled program.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrongName(String);

impl StrongName {
    /// Compute the strong name of the concatenation of `fragments`.
    ///
    /// Fragment boundaries do not contribute to the digest;
    ///   `["ab", "c"]` and `["a", "bc"]` yield the same name.
    pub fn digest<I, B>(fragments: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut hasher = Sha256::new();

        for frag in fragments {
            hasher.update(frag.as_ref());
        }

        let bytes = hasher.finalize();

        Self(
            bytes[..STRONG_NAME_BYTES]
                .iter()
                .map(|byte| format!("{:02X}", byte))
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for StrongName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StrongName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = StrongName::digest(["function f(){}"]);
        let b = StrongName::digest(["function f(){}"]);

        assert_eq!(a, b);
        assert_eq!(32, a.as_str().len());
        assert!(a
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn digest_of_empty_input() {
        // Leading bytes of the SHA-256 of nothing.
        assert_eq!(
            "E3B0C44298FC1C149AFBF4C8996FB924",
            StrongName::digest(Vec::<&[u8]>::new()).as_str(),
        );
    }

    #[test]
    fn digest_ignores_fragment_boundaries() {
        assert_eq!(
            StrongName::digest(["ab", "c"]),
            StrongName::digest(["a", "bc"]),
        );
    }

    #[test]
    fn distinct_content_distinct_name() {
        assert_ne!(StrongName::digest(["X"]), StrongName::digest(["Y"]));
    }
}
