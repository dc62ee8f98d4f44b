// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 spindle project

//! Descriptor registration table.
//!
//! Maps a raw descriptor to its readiness callback. Slots are claimed by the
//! first-inactive-slot scan and become reusable again on removal. Duplicate
//! registration of the same descriptor is rejected: epoll refuses it at the
//! primitive level, so the table enforces the same rule up front with a
//! typed error.

use std::os::unix::io::RawFd;

use crate::error::{Error, Result};
use crate::reactor::IoCallback;

/// One descriptor registration.
///
/// `callback` is `Option` so the engine can take it out of the slot for the
/// duration of its own dispatch; an active slot with no callback exists only
/// while that callback is running.
struct DescriptorSlot {
    fd: RawFd,
    callback: Option<IoCallback>,
    active: bool,
}

impl DescriptorSlot {
    fn vacant() -> Self {
        Self {
            fd: -1,
            callback: None,
            active: false,
        }
    }
}

/// Fixed-capacity descriptor table with a high-water scan bound.
pub(crate) struct DescriptorTable {
    slots: Vec<DescriptorSlot>,
    high_water: usize,
}

impl DescriptorTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| DescriptorSlot::vacant()).collect(),
            high_water: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Highest ever-used slot index + 1.
    pub(crate) fn high_water(&self) -> usize {
        self.high_water
    }

    /// True when no slot is active.
    pub(crate) fn is_empty(&self) -> bool {
        !self.slots[..self.high_water].iter().any(|s| s.active)
    }

    pub(crate) fn contains(&self, fd: RawFd) -> bool {
        self.slots[..self.high_water]
            .iter()
            .any(|s| s.active && s.fd == fd)
    }

    /// Claim the first inactive slot for `fd`. Returns the slot index.
    pub(crate) fn insert(&mut self, fd: RawFd, callback: IoCallback) -> Result<usize> {
        if self.contains(fd) {
            return Err(Error::DuplicateDescriptor(fd));
        }
        let idx = self
            .slots
            .iter()
            .position(|s| !s.active)
            .ok_or(Error::CapacityExhausted)?;
        let slot = &mut self.slots[idx];
        slot.fd = fd;
        slot.callback = Some(callback);
        slot.active = true;
        if self.high_water <= idx {
            self.high_water = idx + 1;
        }
        Ok(idx)
    }

    /// Deactivate the slot holding `fd`. Returns the freed slot index.
    pub(crate) fn remove(&mut self, fd: RawFd) -> Result<usize> {
        let idx = self.slots[..self.high_water]
            .iter()
            .position(|s| s.active && s.fd == fd)
            .ok_or(Error::NotFound)?;
        let slot = &mut self.slots[idx];
        slot.fd = -1;
        slot.callback = None;
        slot.active = false;
        Ok(idx)
    }

    /// Descriptor stored at `idx`, if the slot is active.
    pub(crate) fn fd_at(&self, idx: usize) -> Option<RawFd> {
        let slot = self.slots.get(idx)?;
        slot.active.then_some(slot.fd)
    }

    /// Take the callback out of slot `idx` for dispatch.
    ///
    /// Returns `None` when the slot went inactive since readiness was
    /// recorded (a callback earlier in the same tick removed it) or when the
    /// slot is already mid-dispatch.
    pub(crate) fn begin_dispatch(&mut self, idx: usize) -> Option<(RawFd, IoCallback)> {
        let slot = self.slots.get_mut(idx)?;
        if !slot.active {
            return None;
        }
        let cb = slot.callback.take()?;
        Some((slot.fd, cb))
    }

    /// Put a dispatched callback back into slot `idx`.
    ///
    /// The callback is dropped instead when the slot no longer belongs to
    /// `fd`: the callback may have removed its own registration, or removed
    /// it and a later add re-occupied the slot.
    pub(crate) fn end_dispatch(&mut self, idx: usize, fd: RawFd, callback: IoCallback) {
        if let Some(slot) = self.slots.get_mut(idx) {
            if slot.active && slot.fd == fd && slot.callback.is_none() {
                slot.callback = Some(callback);
            }
        }
    }
}
