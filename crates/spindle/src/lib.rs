// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 spindle project

//! # spindle - single-threaded readiness reactor
//!
//! A bounded event loop for programs that want callback-driven I/O and
//! timers without threads or an async runtime: a fixed-capacity descriptor
//! table, a fixed-capacity timer table, and one blocking wait per tick that
//! serves both. Allocation-free after construction.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use spindle::{Reactor, ReactorConfig};
//!
//! fn main() -> spindle::Result<()> {
//!     let mut reactor = Reactor::new(ReactorConfig::default())?;
//!
//!     // Fires every 5 seconds, re-armed from fire time.
//!     let _beat = reactor.add_timer_repeating(5, |_reactor, now| {
//!         println!("heartbeat at {now}");
//!     })?;
//!
//!     // Loops until reactor.stop() (or a StopHandle) is observed.
//!     reactor.run();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------------------------+
//! |                     Loop Controller                        |
//! |        run() / tick_once() / stop() / StopHandle           |
//! +-----------------------------------------------------------+
//! |                  Wait/Dispatch Engine                      |
//! |   one mio::Poll wait per tick -> dispatch ready fds in     |
//! |   slot order -> fire expired timers in slot order          |
//! +-----------------------------------------------------------+
//! |   Descriptor Registry          |   Timer Registry          |
//! |   fixed slots, high-water scan |   fixed slots, handles    |
//! +-----------------------------------------------------------+
//! ```
//!
//! ## Guarantees and limits
//!
//! - One tick = one wait + one dispatch pass. The wait never overshoots
//!   the nearest timer deadline.
//! - Dispatch and firing order is ascending slot index, not readiness
//!   arrival or deadline order.
//! - Repeating timers re-arm to `fire_time + interval`; they drift under
//!   sustained overload rather than bunching catch-up firings.
//! - Callbacks run on the loop thread with `&mut Reactor` and may mutate
//!   any registration, including their own. They must be fast and
//!   non-blocking, and must not unwind into the reactor.
//! - Read-readiness only, level-triggered, single waiter. Cross-thread
//!   interaction is limited to [`StopHandle`].

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod error;
mod reactor;
mod registry;
mod time;

pub use error::{Error, Result};
pub use reactor::{
    IoCallback, Reactor, ReactorConfig, StopHandle, Tick, TimerCallback,
};
pub use registry::TimerHandle;
pub use time::{ManualClock, SystemClock, TimeSource};
