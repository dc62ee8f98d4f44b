// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 spindle project

//! Fixed-capacity registration tables for descriptors and timers.
//!
//! Both tables are allocated once at construction and scanned linearly up to
//! a high-water mark (highest ever-used index + 1). The mark never shrinks,
//! which keeps removal O(1) bookkeeping and bounds every scan without a
//! free-list.

pub(crate) mod descriptors;
pub(crate) mod timers;

pub use timers::TimerHandle;
