// Tests for blob storage
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

use super::*;
use std::thread;

fn exercise_store<S: BlobStore>(store: &S) -> CacheResult<()> {
    let a = store.put(b"var a = 1;")?;
    let empty = store.put(b"")?;
    let b = store.put("var ü = 2;".as_bytes())?;

    assert_eq!(b"var a = 1;".to_vec(), store.get(a)?);
    assert_eq!("var ü = 2;", store.get_text(b)?);
    assert_eq!("", store.get_text(empty)?);
    assert!(empty.is_empty());
    assert_eq!(10, a.len());

    Ok(())
}

#[test]
fn memory_store_put_get() -> CacheResult<()> {
    exercise_store(&MemoryStore::new())
}

#[test]
fn disk_store_put_get() -> CacheResult<()> {
    exercise_store(&DiskStore::new()?)
}

// Identical content is not de-duplicated by the store itself.
#[test]
fn identical_content_distinct_tokens() -> CacheResult<()> {
    let store = MemoryStore::new();

    let a = store.put(b"same")?;
    let b = store.put(b"same")?;

    assert_ne!(a, b);
    assert_eq!(store.get(a)?, store.get(b)?);

    Ok(())
}

#[test]
fn foreign_token_rejected() -> CacheResult<()> {
    let big = MemoryStore::new();
    let small = DiskStore::new()?;

    big.put(b"one")?;
    let token = big.put(b"two two two")?;

    assert!(matches!(small.get(token), Err(CacheError::InvalidToken(_))));
    assert!(matches!(
        MemoryStore::new().get(token),
        Err(CacheError::InvalidToken(_))
    ));

    Ok(())
}

#[test]
fn get_text_rejects_invalid_utf8() -> CacheResult<()> {
    let store = MemoryStore::new();
    let token = store.put(&[0xff, 0xfe])?;

    assert!(matches!(store.get_text(token), Err(CacheError::Utf8(_))));

    Ok(())
}

#[test]
fn concurrent_puts_yield_usable_tokens() -> CacheResult<()> {
    let store = Arc::new(DiskStore::new()?);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);

            thread::spawn(move || {
                let text = format!("permutation {}", i).repeat(i + 1);
                let token = store.put(text.as_bytes()).unwrap();

                (text, token)
            })
        })
        .collect();

    for handle in handles {
        let (text, token) = handle.join().unwrap();
        assert_eq!(text, store.get_text(token)?);
    }

    Ok(())
}
