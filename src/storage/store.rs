use std::sync::MutexGuard;

use crate::utils::auxiliary::{SharableRef, SharableRefExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store write failed at address {address}")]
    Write { address: u32 },
    #[error("store read of {length} bytes at address {address} failed")]
    Read { address: u32, length: u32 },
    #[error("store not ready after {attempts} polls (address {address})")]
    Timeout { address: u32, attempts: u32 },
    #[error("{length} bytes at address {address} do not fit a store of {capacity} bytes")]
    OutOfRange { address: u32, length: u32, capacity: u32 },
}

/// A byte addressable store written in pages.
pub trait PersistentStore {
    /// Writes `bytes` starting at `address`. Returns once the medium acknowledged every page.
    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), StoreError>;

    /// Reads exactly `length` bytes starting at `address`.
    fn read(&mut self, address: u32, length: u32) -> Result<Vec<u8>, StoreError>;

    /// Non-blocking readiness check: true when the store accepts a new operation.
    fn poll_ready(&mut self) -> bool;

    fn capacity(&self) -> u32;
}

pub(crate) fn check_range(address: u32, length: u32, capacity: u32) -> Result<(), StoreError> {
    match address.checked_add(length) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StoreError::OutOfRange {
            address,
            length,
            capacity,
        }),
    }
}

/// Splits a write starting at `address` into chunks that never cross a page boundary.
pub(crate) fn page_chunks(address: u32, bytes: &[u8], page_size: usize) -> Vec<(u32, &[u8])> {
    let mut chunks = Vec::new();
    let mut address = address;
    let mut rest = bytes;
    while !rest.is_empty() {
        let room = page_size - (address as usize % page_size);
        let (chunk, tail) = rest.split_at(room.min(rest.len()));
        chunks.push((address, chunk));
        address += chunk.len() as u32;
        rest = tail;
    }
    chunks
}

/// A store shared by the capture worker, which writes, and the playback worker, which only reads
/// through a [StoreReader].
pub struct SharedStore<S> {
    inner: SharableRef<S>,
}

/// Read-only view of a [SharedStore].
pub struct StoreReader<S> {
    inner: SharableRef<S>,
}

impl<S: PersistentStore> SharedStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            inner: SharableRef::new_sharable(store),
        }
    }

    pub fn reader(&self) -> StoreReader<S> {
        StoreReader {
            inner: self.inner.clone(),
        }
    }

    /// Direct access to the underlying store, for setup and diagnostics.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock_sharable()
    }
}

impl<S: PersistentStore> PersistentStore for SharedStore<S> {
    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), StoreError> {
        self.inner.lock_sharable().write(address, bytes)
    }

    fn read(&mut self, address: u32, length: u32) -> Result<Vec<u8>, StoreError> {
        self.inner.lock_sharable().read(address, length)
    }

    fn poll_ready(&mut self) -> bool {
        self.inner.lock_sharable().poll_ready()
    }

    fn capacity(&self) -> u32 {
        self.inner.lock_sharable().capacity()
    }
}

impl<S: PersistentStore> StoreReader<S> {
    pub fn read(&self, address: u32, length: u32) -> Result<Vec<u8>, StoreError> {
        self.inner.lock_sharable().read(address, length)
    }
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> Clone for StoreReader<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test0_chunks_stop_at_page_boundaries() {
        let bytes = [7u8; 10];
        let chunks = page_chunks(60, &bytes, 64);
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].0, chunks[0].1.len()), (60, 4));
        assert_eq!((chunks[1].0, chunks[1].1.len()), (64, 6));
    }

    #[test]
    fn test1_aligned_write_spanning_pages() {
        let bytes = [1u8; 130];
        let lens: Vec<(u32, usize)> = page_chunks(0, &bytes, 64)
            .into_iter()
            .map(|(address, chunk)| (address, chunk.len()))
            .collect();
        assert_eq!(lens, vec![(0, 64), (64, 64), (128, 2)]);
        assert!(page_chunks(5, &[], 64).is_empty());
    }

    #[test]
    fn test2_range_check() {
        assert_eq!(check_range(0, 32768, 32768), Ok(()));
        assert_eq!(
            check_range(32767, 2, 32768),
            Err(StoreError::OutOfRange { address: 32767, length: 2, capacity: 32768 })
        );
        assert!(check_range(u32::MAX, 1, 32768).is_err());
    }
}
