// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 spindle project

//! Timer registration table.
//!
//! Deadlines are absolute epoch seconds. Each registration is identified by
//! an opaque [`TimerHandle`] carrying a generation counter, so a handle kept
//! past its timer's death is inert even after the slot is reused.
//!
//! Firing follows a strict two-phase protocol: the slot is re-armed
//! (repeating) or cleared (one-shot) and the callback taken out *before* the
//! callback runs. A callback that registers or removes timers, including its
//! own, always observes a consistent table.

use crate::error::{Error, Result};
use crate::reactor::TimerCallback;

/// Opaque handle to a registered timer.
///
/// Encoded as: upper 16 bits = generation, lower 16 bits = slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u32);

impl TimerHandle {
    fn new(generation: u16, index: u16) -> Self {
        Self((u32::from(generation) << 16) | u32::from(index))
    }

    fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }

    fn index(self) -> usize {
        usize::from((self.0 & 0xFFFF) as u16)
    }
}

struct TimerSlot {
    /// Absolute wake time, epoch seconds. Meaningful only while active.
    deadline: u64,
    /// Re-arm interval in seconds; 0 for one-shot.
    interval: u64,
    /// Bumped on every slot reuse; stale handles fail the match.
    generation: u16,
    callback: Option<TimerCallback>,
    active: bool,
}

impl TimerSlot {
    fn vacant() -> Self {
        Self {
            deadline: 0,
            interval: 0,
            generation: 0,
            callback: None,
            active: false,
        }
    }
}

/// What the firing pass found at a slot.
pub(crate) enum FireAction {
    /// Not active, not due, or mid-dispatch.
    Skip,
    /// Due one-shot: the slot is already cleared, run the callback last.
    OneShot(TimerCallback),
    /// Due repeating: the slot is already re-armed to `now + interval`.
    /// The callback goes back via [`TimerTable::end_fire`] with this
    /// generation.
    Repeating(u16, TimerCallback),
}

/// Fixed-capacity timer table with a high-water scan bound.
pub(crate) struct TimerTable {
    slots: Vec<TimerSlot>,
    high_water: usize,
}

impl TimerTable {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(
            capacity <= usize::from(u16::MAX),
            "timer capacity must fit a 16-bit slot index"
        );
        Self {
            slots: (0..capacity).map(|_| TimerSlot::vacant()).collect(),
            high_water: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn high_water(&self) -> usize {
        self.high_water
    }

    /// Claim the first inactive slot.
    ///
    /// `interval == 0` registers a one-shot; anything else re-arms to
    /// `fire_time + interval` on every firing.
    pub(crate) fn insert(
        &mut self,
        deadline: u64,
        interval: u64,
        callback: TimerCallback,
    ) -> Result<TimerHandle> {
        let idx = self
            .slots
            .iter()
            .position(|s| !s.active)
            .ok_or(Error::CapacityExhausted)?;
        let slot = &mut self.slots[idx];
        slot.generation = slot.generation.wrapping_add(1);
        slot.deadline = deadline;
        slot.interval = interval;
        slot.callback = Some(callback);
        slot.active = true;
        if self.high_water <= idx {
            self.high_water = idx + 1;
        }
        // new() asserted the index fits u16.
        Ok(TimerHandle::new(slot.generation, idx as u16))
    }

    /// Slot referenced by `handle`, if it is still the same registration.
    fn live_slot(&mut self, handle: TimerHandle) -> Option<&mut TimerSlot> {
        let slot = self.slots.get_mut(handle.index())?;
        (slot.active && slot.generation == handle.generation()).then_some(slot)
    }

    /// Move a timer's deadline to `deadline`, keeping its repeat interval.
    pub(crate) fn rearm(&mut self, handle: TimerHandle, deadline: u64) -> Result<()> {
        let slot = self.live_slot(handle).ok_or(Error::NotFound)?;
        slot.deadline = deadline;
        Ok(())
    }

    /// Deactivate the registration behind `handle`.
    pub(crate) fn remove(&mut self, handle: TimerHandle) -> Result<()> {
        let slot = self.live_slot(handle).ok_or(Error::NotFound)?;
        slot.callback = None;
        slot.active = false;
        Ok(())
    }

    /// Nearest deadline over all active slots, for the wait bound.
    pub(crate) fn earliest_deadline(&self) -> Option<u64> {
        self.slots[..self.high_water]
            .iter()
            .filter(|s| s.active)
            .map(|s| s.deadline)
            .min()
    }

    /// First phase of firing slot `idx` at `now`.
    ///
    /// Re-arms or clears the slot and surrenders the callback, so the
    /// callback itself runs against a table that no longer references it.
    pub(crate) fn begin_fire(&mut self, idx: usize, now: u64) -> FireAction {
        let Some(slot) = self.slots.get_mut(idx) else {
            return FireAction::Skip;
        };
        if !slot.active || slot.deadline > now {
            return FireAction::Skip;
        }
        if slot.interval != 0 {
            // Measured from fire time, not from the missed deadline: a late
            // tick shifts the whole cadence rather than bunching catch-ups.
            slot.deadline = now + slot.interval;
            match slot.callback.take() {
                Some(cb) => FireAction::Repeating(slot.generation, cb),
                None => FireAction::Skip,
            }
        } else {
            slot.active = false;
            match slot.callback.take() {
                Some(cb) => FireAction::OneShot(cb),
                None => FireAction::Skip,
            }
        }
    }

    /// Second phase for repeating timers: give the callback back.
    ///
    /// Dropped instead when the callback removed its own registration, or
    /// removed it and a later add re-occupied the slot (generation differs).
    pub(crate) fn end_fire(&mut self, idx: usize, generation: u16, callback: TimerCallback) {
        if let Some(slot) = self.slots.get_mut(idx) {
            if slot.active && slot.generation == generation && slot.callback.is_none() {
                slot.callback = Some(callback);
            }
        }
    }
}
