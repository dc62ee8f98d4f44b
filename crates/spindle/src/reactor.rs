// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 spindle project

//! Wait/dispatch engine and loop controller.
//!
//! One [`Reactor`] owns one `mio::Poll`, both registration tables, and the
//! run flag. Each tick performs exactly one wait on the poll, dispatches
//! ready descriptors in ascending slot-index order, then fires expired
//! timers.
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                          Reactor                             |
//! |  +--------------------------------------------------------+  |
//! |  |                      mio::Poll                          |  |
//! |  |  - SourceFd per active descriptor slot (READABLE)      |  |
//! |  |  - Waker (cross-thread stop)                           |  |
//! |  +--------------------------------------------------------+  |
//! |                             |                                |
//! |                             v                                |
//! |  +----------------+   +----------------+   +-------------+  |
//! |  |  dispatch fds  |-->|  fire timers   |-->|  tick outcome|  |
//! |  | (slot order)   |   | (slot order)   |   +-------------+  |
//! |  +----------------+   +----------------+                    |
//! +--------------------------------------------------------------+
//! ```
//!
//! Callbacks receive `&mut Reactor` and may register, remove, re-arm or
//! stop from inside a tick. The tables hand each callback out of its slot
//! before it runs, so a callback never observes itself half-fired.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token, Waker};

use crate::error::{Error, Result};
use crate::registry::descriptors::DescriptorTable;
use crate::registry::timers::{FireAction, TimerTable};
use crate::registry::TimerHandle;
use crate::time::{SystemClock, TimeSource};

/// Token for the waker
const WAKER_TOKEN: Token = Token(0);

/// First token assigned to descriptor slots (slot index + `TOKEN_BASE`)
const TOKEN_BASE: usize = 1;

/// Readiness callback: `(reactor, descriptor)`.
///
/// Expected to perform its own non-blocking I/O; a slow callback delays
/// every other registration for the rest of the tick.
pub type IoCallback = Box<dyn FnMut(&mut Reactor, RawFd)>;

/// Timer callback: `(reactor, fire_time_epoch_secs)`.
///
/// The second argument is the tick's "now", not the originally scheduled
/// deadline.
pub type TimerCallback = Box<dyn FnMut(&mut Reactor, u64)>;

/// Reactor construction parameters.
///
/// Capacities are fixed for the reactor's lifetime; both tables are
/// allocated once and never grow.
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Maximum simultaneously registered descriptors
    pub descriptor_capacity: usize,

    /// Maximum simultaneously registered timers
    pub timer_capacity: usize,

    /// Wait bound for [`Reactor::tick_once`], applied regardless of timers
    pub poll_bound: Duration,

    /// Sleep applied by [`Reactor::run`] after a tick with nothing to wait
    /// on or a failed wait, so the loop never spins
    pub idle_backoff: Duration,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            descriptor_capacity: 20,
            timer_capacity: 20,
            poll_bound: Duration::from_millis(10),
            idle_backoff: Duration::from_millis(200),
        }
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The wait returned with readiness; `n` descriptor callbacks ran
    Dispatched(usize),

    /// The wait returned with nothing ready; only timers may have fired
    TimedOut,

    /// No descriptor is registered, so the wait was skipped entirely;
    /// expired timers still fired. The loop driver backs off on this
    NoDescriptors,
}

/// Cloneable, `Send` handle that stops a running reactor from another
/// thread.
///
/// Clearing the run flag alone would not end an unbounded wait; the handle
/// also signals the poll's waker so the current tick returns promptly.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl StopHandle {
    /// Request loop exit at the next tick boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            log::warn!("stop wake failed: {e}");
        }
    }
}

/// How a tick bounds its single wait.
enum WaitMode {
    /// Short fixed bound, independent of timers (`tick_once`)
    Single,
    /// Bound by the nearest timer deadline, unbounded when no timer is
    /// active (`run`)
    Loop,
}

/// Single-threaded readiness reactor.
///
/// Construction resets both registration tables; there is no separate init
/// step. All mutation goes through `&mut self`, so registrations can only
/// change on the loop thread: before [`run`](Self::run) starts, after it
/// returns, or from inside a callback. The only cross-thread entry point is
/// [`StopHandle`].
pub struct Reactor {
    config: ReactorConfig,
    poll: Poll,
    events: Events,
    /// Per-slot readiness marks for the current tick: the descriptor that
    /// was ready, or -1. Keyed by slot so dispatch runs in slot order and
    /// skips slots re-occupied mid-tick.
    ready: Vec<RawFd>,
    waker: Arc<Waker>,
    running: Arc<AtomicBool>,
    clock: Box<dyn TimeSource>,
    descriptors: DescriptorTable,
    timers: TimerTable,
}

impl Reactor {
    /// Create a reactor on the wall clock.
    pub fn new(config: ReactorConfig) -> Result<Self> {
        Self::with_clock(config, Box::new(SystemClock))
    }

    /// Create a reactor on an explicit time source.
    pub fn with_clock(config: ReactorConfig, clock: Box<dyn TimeSource>) -> Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);
        let events = Events::with_capacity(config.descriptor_capacity + 1);
        let ready = vec![-1; config.descriptor_capacity];
        let descriptors = DescriptorTable::new(config.descriptor_capacity);
        let timers = TimerTable::new(config.timer_capacity);

        Ok(Self {
            config,
            poll,
            events,
            ready,
            waker,
            running: Arc::new(AtomicBool::new(false)),
            clock,
            descriptors,
            timers,
        })
    }

    /// Current time in epoch seconds, read from the reactor's clock.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Maximum simultaneously registered descriptors.
    pub fn descriptor_capacity(&self) -> usize {
        self.descriptors.capacity()
    }

    /// Maximum simultaneously registered timers.
    pub fn timer_capacity(&self) -> usize {
        self.timers.capacity()
    }

    // ------------------------------------------------------------------
    // Descriptor registry
    // ------------------------------------------------------------------

    /// Register `fd` for read-readiness.
    ///
    /// The descriptor stays externally owned; the reactor never closes it.
    /// Registering an fd twice is rejected with
    /// [`Error::DuplicateDescriptor`].
    pub fn add_descriptor<F>(&mut self, fd: RawFd, callback: F) -> Result<()>
    where
        F: FnMut(&mut Reactor, RawFd) + 'static,
    {
        let idx = match self.descriptors.insert(fd, Box::new(callback)) {
            Ok(idx) => idx,
            Err(e) => {
                log::error!("descriptor {fd} not added: {e}");
                return Err(e);
            }
        };
        if let Err(e) = self.poll.registry().register(
            &mut SourceFd(&fd),
            Token(TOKEN_BASE + idx),
            Interest::READABLE,
        ) {
            // Keep the table in sync with the poll set.
            let _ = self.descriptors.remove(fd);
            return Err(Error::Io(e));
        }
        log::debug!("descriptor {fd} registered in slot {idx}");
        Ok(())
    }

    /// Drop `fd` from the watched set.
    pub fn remove_descriptor(&mut self, fd: RawFd) -> Result<()> {
        let idx = match self.descriptors.remove(fd) {
            Ok(idx) => idx,
            Err(e) => {
                log::warn!("descriptor {fd} not removed: {e}");
                return Err(e);
            }
        };
        if let Err(e) = self.poll.registry().deregister(&mut SourceFd(&fd)) {
            // The slot is already freed; a closed fd deregisters itself.
            log::debug!("deregister of descriptor {fd} failed: {e}");
        }
        // Readiness recorded for this slot earlier in the tick is void now.
        if let Some(mark) = self.ready.get_mut(idx) {
            *mark = -1;
        }
        log::debug!("descriptor {fd} removed from slot {idx}");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Timer registry
    // ------------------------------------------------------------------

    /// Register a one-shot timer due `secs` from now.
    pub fn add_timer<F>(&mut self, secs: u64, callback: F) -> Result<TimerHandle>
    where
        F: FnMut(&mut Reactor, u64) + 'static,
    {
        let deadline = self.clock.now().saturating_add(secs);
        self.timers.insert(deadline, 0, Box::new(callback))
    }

    /// Register a repeating timer firing every `secs`, first due `secs`
    /// from now.
    ///
    /// An interval of 0 registers a one-shot due immediately. Each firing
    /// re-arms to `fire_time + secs`; a late tick shifts the cadence rather
    /// than compensating for drift.
    pub fn add_timer_repeating<F>(&mut self, secs: u64, callback: F) -> Result<TimerHandle>
    where
        F: FnMut(&mut Reactor, u64) + 'static,
    {
        let deadline = self.clock.now().saturating_add(secs);
        self.timers.insert(deadline, secs, Box::new(callback))
    }

    /// Register a one-shot timer due at an absolute epoch instant.
    ///
    /// A deadline in the past fires on the next tick.
    pub fn add_timer_at<F>(&mut self, epoch_secs: u64, callback: F) -> Result<TimerHandle>
    where
        F: FnMut(&mut Reactor, u64) + 'static,
    {
        self.timers.insert(epoch_secs, 0, Box::new(callback))
    }

    /// Move a timer's deadline: `secs == 0` means "due now" (fires on the
    /// very next tick), otherwise `now + secs`. The repeat interval is
    /// unchanged.
    pub fn rearm_timer(&mut self, handle: TimerHandle, secs: u64) -> Result<()> {
        let now = self.clock.now();
        let deadline = if secs == 0 { now } else { now.saturating_add(secs) };
        self.timers.rearm(handle, deadline)
    }

    /// Deactivate a timer. A handle whose timer already fired (one-shot) or
    /// was removed is [`Error::NotFound`].
    pub fn remove_timer(&mut self, handle: TimerHandle) -> Result<()> {
        self.timers.remove(handle)
    }

    // ------------------------------------------------------------------
    // Loop controller
    // ------------------------------------------------------------------

    /// Drive ticks until [`stop`](Self::stop) is observed, then return.
    ///
    /// With no descriptors registered the loop sleeps `idle_backoff`
    /// between timer passes instead of spinning; a failed wait is logged
    /// and backed off the same way. Stopping never exits the process.
    pub fn run(&mut self) {
        self.running.store(true, Ordering::Release);
        log::debug!("reactor loop started");
        while self.running.load(Ordering::Acquire) {
            match self.tick(WaitMode::Loop) {
                Ok(Tick::NoDescriptors) => thread::sleep(self.config.idle_backoff),
                Ok(_) => {}
                Err(Error::Io(e)) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::warn!("reactor wait failed: {e}");
                    thread::sleep(self.config.idle_backoff);
                }
            }
        }
        log::debug!("reactor loop stopped");
    }

    /// Perform exactly one tick bounded by `poll_bound`.
    ///
    /// Never blocks past the bound, runs regardless of the run flag, and
    /// touches neither registrations nor the run flag itself.
    pub fn tick_once(&mut self) -> Result<Tick> {
        self.tick(WaitMode::Single)
    }

    /// Request loop exit.
    ///
    /// Observed at the next tick boundary only: a stop issued from a
    /// callback lets the current tick finish dispatching, then the loop
    /// returns without starting another tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            log::warn!("stop wake failed: {e}");
        }
    }

    /// Handle for stopping this reactor from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
            waker: Arc::clone(&self.waker),
        }
    }

    // ------------------------------------------------------------------
    // Wait/dispatch engine
    // ------------------------------------------------------------------

    /// One wait plus one dispatch pass.
    fn tick(&mut self, mode: WaitMode) -> Result<Tick> {
        if self.descriptors.is_empty() {
            // Nothing to wait on: fire what is due and let the caller
            // decide how long to back off.
            let now = self.clock.now();
            self.fire_expired(now);
            return Ok(Tick::NoDescriptors);
        }

        let bound = match mode {
            WaitMode::Single => Some(self.config.poll_bound),
            WaitMode::Loop => self.timers.earliest_deadline().map(|deadline| {
                // Never overshoot the nearest deadline; a deadline already
                // due polls without blocking.
                Duration::from_secs(deadline.saturating_sub(self.clock.now()))
            }),
        };

        let wait = self.poll.poll(&mut self.events, bound);

        for mark in &mut self.ready {
            *mark = -1;
        }
        for event in self.events.iter() {
            let token = event.token();
            if token == WAKER_TOKEN {
                continue;
            }
            let idx = token.0 - TOKEN_BASE;
            if idx < self.ready.len() {
                // Record which fd was ready, so a slot re-occupied by a
                // callback later in this tick is not dispatched by mistake.
                self.ready[idx] = self.descriptors.fd_at(idx).unwrap_or(-1);
            }
        }

        // On a wait error the primitive marked nothing ready, so this
        // dispatches nothing; timers still fire before the error surfaces.
        let dispatched = self.dispatch_ready();
        let now = self.clock.now();
        self.fire_expired(now);

        match wait {
            Err(e) => Err(Error::Io(e)),
            Ok(()) if dispatched == 0 => Ok(Tick::TimedOut),
            Ok(()) => Ok(Tick::Dispatched(dispatched)),
        }
    }

    /// Run the callback of every marked slot, in ascending slot order.
    fn dispatch_ready(&mut self) -> usize {
        let mut fired = 0;
        let mut idx = 0;
        // The high-water mark is re-read every iteration: callbacks may
        // register or remove descriptors mid-pass.
        while idx < self.descriptors.high_water() {
            let marked = self.ready.get(idx).copied().unwrap_or(-1);
            if marked >= 0 {
                if let Some((fd, mut cb)) = self.descriptors.begin_dispatch(idx) {
                    if fd == marked {
                        cb(self, fd);
                        fired += 1;
                    }
                    self.descriptors.end_dispatch(idx, fd, cb);
                }
            }
            idx += 1;
        }
        fired
    }

    /// Fire every timer whose deadline has passed, in ascending slot order.
    fn fire_expired(&mut self, now: u64) {
        let mut idx = 0;
        while idx < self.timers.high_water() {
            match self.timers.begin_fire(idx, now) {
                FireAction::Skip => {}
                FireAction::OneShot(mut cb) => cb(self, now),
                FireAction::Repeating(generation, mut cb) => {
                    cb(self, now);
                    self.timers.end_fire(idx, generation, cb);
                }
            }
            idx += 1;
        }
    }
}
