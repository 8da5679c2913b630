// Blob storage for compiled program text
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

//! Storage of large byte blobs behind opaque tokens.
//!
//! Compiled programs can be very large,
//!   and a module may have dozens of permutations,
//!   so [`CompilationResult`](crate::perm::CompilationResult) does not hold
//!   its JavaScript inline.
//! Instead,
//!   each fragment is [`put`](BlobStore::put) into a [`BlobStore`] and the
//!   result holds only the returned [`BlobToken`].
//!
//! A store makes no attempt to de-duplicate its contents;
//!   storing the same bytes twice yields two tokens.
//! De-duplication happens one level up by
//!   [`StrongName`](crate::digest::StrongName).
//!
//! Stores are constructed by whatever drives the link and are passed
//!   explicitly to everything that needs them;
//!     there is no global store.
//! Their lifetime is that of the link;
//!   nothing persists across runs.
//!
//!   - [`MemoryStore`] keeps everything on the heap.
//!     It is the obvious choice for tests and small modules.
//!   - [`DiskStore`] appends blobs to an anonymous temporary file that the
//!       operating system removes when the process exits.
//!
//! Both stores accept concurrent [`put`](BlobStore::put)s.

use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{self, Display};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::string::FromUtf8Error;
use std::sync::Arc;

pub type CacheResult<T> = Result<T, CacheError>;

/// Handle to a blob held by a [`BlobStore`].
///
/// Tokens are meaningful only to the store that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobToken {
    offset: u64,
    len: u64,
}

impl BlobToken {
    /// Length of the referenced blob in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Token-addressed blob storage.
pub trait BlobStore: Send + Sync {
    /// Store `bytes`,
    ///   returning a token usable as soon as this method returns.
    fn put(&self, bytes: &[u8]) -> CacheResult<BlobToken>;

    /// Retrieve the blob referenced by `token`.
    fn get(&self, token: BlobToken) -> CacheResult<Vec<u8>>;

    /// Retrieve the blob referenced by `token` as UTF-8 text.
    fn get_text(&self, token: BlobToken) -> CacheResult<String> {
        Ok(String::from_utf8(self.get(token)?)?)
    }
}

/// Blobs held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<Vec<Arc<[u8]>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }
}

impl BlobStore for MemoryStore {
    fn put(&self, bytes: &[u8]) -> CacheResult<BlobToken> {
        let mut blobs = self.blobs.lock();
        let offset = blobs.len() as u64;

        blobs.push(bytes.into());

        Ok(BlobToken {
            offset,
            len: bytes.len() as u64,
        })
    }

    fn get(&self, token: BlobToken) -> CacheResult<Vec<u8>> {
        let blobs = self.blobs.lock();

        match blobs.get(token.offset as usize) {
            Some(blob) if blob.len() as u64 == token.len => Ok(blob.to_vec()),
            _ => Err(CacheError::InvalidToken(token)),
        }
    }
}

/// Blobs appended to an anonymous temporary file.
///
/// A token is the offset and length of its blob within the file.
#[derive(Debug)]
pub struct DiskStore {
    file: Mutex<DiskFile>,
}

#[derive(Debug)]
struct DiskFile {
    file: File,

    /// Offset at which the next blob will be written.
    end: u64,
}

impl DiskStore {
    /// Create a store backed by a new temporary file.
    pub fn new() -> CacheResult<Self> {
        Ok(Self {
            file: Mutex::new(DiskFile {
                file: tempfile::tempfile()?,
                end: 0,
            }),
        })
    }
}

impl BlobStore for DiskStore {
    fn put(&self, bytes: &[u8]) -> CacheResult<BlobToken> {
        let mut disk = self.file.lock();
        let offset = disk.end;

        disk.file.seek(SeekFrom::Start(offset))?;
        disk.file.write_all(bytes)?;
        disk.end += bytes.len() as u64;

        Ok(BlobToken {
            offset,
            len: bytes.len() as u64,
        })
    }

    fn get(&self, token: BlobToken) -> CacheResult<Vec<u8>> {
        let mut disk = self.file.lock();

        match token.offset.checked_add(token.len) {
            Some(end) if end <= disk.end => {}
            _ => return Err(CacheError::InvalidToken(token)),
        }

        let mut buf = vec![0; token.len as usize];

        disk.file.seek(SeekFrom::Start(token.offset))?;
        disk.file.read_exact(&mut buf)?;

        Ok(buf)
    }
}

assert_impl_all!(MemoryStore: Send, Sync);
assert_impl_all!(DiskStore: Send, Sync);

/// Error retrieving from or writing to a [`BlobStore`].
#[derive(Debug)]
pub enum CacheError {
    /// Failure of the backing file.
    Io(io::Error),

    /// The token does not reference a blob in this store.
    ///
    /// This almost certainly means that the token came from a different
    ///   store.
    InvalidToken(BlobToken),

    /// A blob requested as text is not valid UTF-8.
    Utf8(FromUtf8Error),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "blob store I/O error: {}", e),
            Self::InvalidToken(token) => write!(
                f,
                "invalid blob token (offset {}, length {})",
                token.offset, token.len
            ),
            Self::Utf8(e) => write!(f, "blob is not valid UTF-8: {}", e),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::InvalidToken(_) => None,
            Self::Utf8(e) => Some(e),
        }
    }
}

impl From<io::Error> for CacheError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<FromUtf8Error> for CacheError {
    fn from(e: FromUtf8Error) -> Self {
        Self::Utf8(e)
    }
}

#[cfg(test)]
mod test;
