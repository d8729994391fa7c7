// SPDX-License-Identifier: CEPL-1.0
//! Fixed-capacity list used for every driver-reported enumeration.
//!
//! Overflow is an error, never a silent truncation: index-based lookups
//! elsewhere assume the list holds exactly what the driver reported.

use std::ops::{Deref, DerefMut};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("capacity of {capacity} exceeded ({requested} requested)")]
pub struct CapacityError {
    pub capacity: usize,
    pub requested: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedVec<T, const N: usize> {
    items: Vec<T>,
}

impl<T, const N: usize> BoundedVec<T, N> {
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        Self { items: Vec::with_capacity(N) }
    }

    /// Collects `iter`, failing (and reporting the full count) if it yields more than `N` items.
    pub fn try_from_iter<I>(iter: I) -> Result<Self, CapacityError>
    where
        I: IntoIterator<Item = T>,
    {
        let mut out = Self::new();
        let mut iter = iter.into_iter();
        while let Some(item) = iter.next() {
            if out.is_full() {
                let requested = N + 1 + iter.count();
                return Err(CapacityError { capacity: N, requested });
            }
            out.items.push(item);
        }
        Ok(out)
    }

    pub fn try_push(&mut self, item: T) -> Result<(), CapacityError> {
        if self.is_full() {
            return Err(CapacityError {
                capacity: N,
                requested: self.items.len() + 1,
            });
        }
        self.items.push(item);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= N
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T, const N: usize> Default for BoundedVec<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Deref for BoundedVec<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

// Slice access only: the length can change through `try_push`/`clear` alone.
impl<T, const N: usize> DerefMut for BoundedVec<T, N> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a BoundedVec<T, N> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
