// Copyright @yucwang 2026

//! Buffers shared between the compute side and a display context.
//!
//! The compute side may only write through an [`AcquiredBuffer`], the
//! display side may only read through a [`DisplayView`]. Both are scoped
//! guards: release happens when the guard drops, on every exit path.

use crate::core::error::TracerError;

use std::ops::{Deref, DerefMut};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

pub struct SharedBuffer<T> {
    label: String,
    data: RwLock<Vec<T>>,
}

pub struct AcquiredBuffer<'a, T> {
    label: &'a str,
    guard: RwLockWriteGuard<'a, Vec<T>>,
}

pub struct DisplayView<'a, T> {
    guard: RwLockReadGuard<'a, Vec<T>>,
}

impl<T> SharedBuffer<T> {
    pub fn new(label: &str, data: Vec<T>) -> Self {
        Self { label: label.to_string(), data: RwLock::new(data) }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Acquires the buffer for compute writes, waiting for display readers to release it.
    pub fn acquire(&self) -> Result<AcquiredBuffer<'_, T>, TracerError> {
        let guard = self.data.write().map_err(|_| {
            TracerError::SynchronizationViolation(format!("'{}' was poisoned by a failed writer", self.label))
        })?;
        log::trace!("acquired '{}' for compute", self.label);
        Ok(AcquiredBuffer { label: &self.label, guard })
    }

    /// Like [`SharedBuffer::acquire`] but fails instead of waiting.
    pub fn try_acquire(&self) -> Result<AcquiredBuffer<'_, T>, TracerError> {
        match self.data.try_write() {
            Ok(guard) => Ok(AcquiredBuffer { label: &self.label, guard }),
            Err(TryLockError::WouldBlock) => Err(TracerError::SynchronizationViolation(
                format!("'{}' is still held by the display context", self.label),
            )),
            Err(TryLockError::Poisoned(_)) => Err(TracerError::SynchronizationViolation(
                format!("'{}' was poisoned by a failed writer", self.label),
            )),
        }
    }

    pub fn read(&self) -> Result<DisplayView<'_, T>, TracerError> {
        let guard = self.data.read().map_err(|_| {
            TracerError::SynchronizationViolation(format!("'{}' was poisoned by a failed writer", self.label))
        })?;
        Ok(DisplayView { guard })
    }
}

impl<T: Clone> SharedBuffer<T> {
    /// Private copy for consumers that must not hold the buffer.
    pub fn copy_out(&self) -> Result<Vec<T>, TracerError> {
        Ok(self.read()?.to_vec())
    }
}

impl<'a, T> Deref for AcquiredBuffer<'a, T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.guard
    }
}

impl<'a, T> DerefMut for AcquiredBuffer<'a, T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.guard
    }
}

impl<'a, T> Drop for AcquiredBuffer<'a, T> {
    fn drop(&mut self) {
        log::trace!("released '{}' to display", self.label);
    }
}

impl<'a, T> Deref for DisplayView<'a, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.guard
    }
}
