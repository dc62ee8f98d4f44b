// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 spindle project

//! End-to-end timer behavior on a manually driven clock.

use std::cell::{Cell, RefCell};
use std::net::UdpSocket;
use std::os::unix::io::AsRawFd;
use std::rc::Rc;

use spindle::{Error, ManualClock, Reactor, ReactorConfig, Tick};

fn reactor_at(epoch: u64, config: ReactorConfig) -> (Reactor, ManualClock) {
    let clock = ManualClock::new(epoch);
    let reactor = Reactor::with_clock(config, Box::new(clock.clone())).expect("reactor");
    (reactor, clock)
}

#[test]
fn one_shot_scenario_fires_once_then_handle_is_dead() {
    let (mut reactor, clock) = reactor_at(1_000, ReactorConfig::default());

    let fires = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&fires);
    let handle = reactor
        .add_timer(2, move |_, now| seen.borrow_mut().push(now))
        .expect("add");

    clock.advance(3);
    assert_eq!(reactor.tick_once().expect("tick"), Tick::NoDescriptors);
    // The callback received the tick's now, not the scheduled deadline.
    assert_eq!(*fires.borrow(), vec![1_003]);

    // One-shot: slot freed at fire time, the handle no longer resolves.
    assert!(matches!(reactor.rearm_timer(handle, 1), Err(Error::NotFound)));
    clock.advance(10);
    reactor.tick_once().expect("tick");
    assert_eq!(fires.borrow().len(), 1);
}

#[test]
fn absolute_timer_fires_at_its_epoch_deadline() {
    let (mut reactor, clock) = reactor_at(500, ReactorConfig::default());
    let fired = Rc::new(Cell::new(false));
    let seen = Rc::clone(&fired);
    reactor
        .add_timer_at(600, move |_, _| seen.set(true))
        .expect("add");

    clock.set(599);
    reactor.tick_once().expect("tick");
    assert!(!fired.get());

    clock.set(600);
    reactor.tick_once().expect("tick");
    assert!(fired.get());
}

#[test]
fn past_absolute_deadline_fires_on_next_tick() {
    let (mut reactor, _clock) = reactor_at(500, ReactorConfig::default());
    let fired = Rc::new(Cell::new(false));
    let seen = Rc::clone(&fired);
    reactor
        .add_timer_at(100, move |_, _| seen.set(true))
        .expect("add");

    reactor.tick_once().expect("tick");
    assert!(fired.get());
}

#[test]
fn stale_handle_after_slot_reuse_is_not_found() {
    let config = ReactorConfig {
        timer_capacity: 1,
        ..ReactorConfig::default()
    };
    let (mut reactor, _clock) = reactor_at(0, config);

    let old = reactor.add_timer(10, |_, _| {}).expect("add");
    reactor.remove_timer(old).expect("remove");
    let new = reactor.add_timer(20, |_, _| {}).expect("re-add");

    assert!(matches!(reactor.rearm_timer(old, 1), Err(Error::NotFound)));
    assert!(matches!(reactor.remove_timer(old), Err(Error::NotFound)));
    reactor.rearm_timer(new, 1).expect("live handle still works");
}

#[test]
fn timers_fire_on_a_dispatching_tick_too() {
    let a = UdpSocket::bind("127.0.0.1:0").expect("bind");
    let b = UdpSocket::bind("127.0.0.1:0").expect("bind");
    a.connect(b.local_addr().expect("addr")).expect("connect");
    b.connect(a.local_addr().expect("addr")).expect("connect");
    b.set_nonblocking(true).expect("nonblocking");
    a.send(b"wake").expect("send");

    let (mut reactor, clock) = reactor_at(10, ReactorConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));

    let order = Rc::clone(&log);
    reactor
        .add_descriptor(b.as_raw_fd(), move |_, _| {
            let mut buf = [0u8; 8];
            let _ = b.recv(&mut buf);
            order.borrow_mut().push("io");
        })
        .expect("add descriptor");
    let order = Rc::clone(&log);
    reactor
        .add_timer(1, move |_, _| order.borrow_mut().push("timer"))
        .expect("add timer");

    clock.advance(2);
    assert_eq!(reactor.tick_once().expect("tick"), Tick::Dispatched(1));
    // Descriptors dispatch first, expired timers fire at tick end.
    assert_eq!(*log.borrow(), vec!["io", "timer"]);
}

#[test]
fn repeating_zero_interval_degrades_to_immediate_one_shot() {
    let (mut reactor, _clock) = reactor_at(42, ReactorConfig::default());
    let fires = Rc::new(Cell::new(0));
    let seen = Rc::clone(&fires);
    reactor
        .add_timer_repeating(0, move |_, _| seen.set(seen.get() + 1))
        .expect("add");

    reactor.tick_once().expect("tick");
    reactor.tick_once().expect("tick");
    assert_eq!(fires.get(), 1, "interval 0 must not re-arm");
}

#[test]
fn timer_callback_can_stop_a_running_loop() {
    let (mut reactor, clock) = reactor_at(0, ReactorConfig {
        idle_backoff: std::time::Duration::from_millis(1),
        ..ReactorConfig::default()
    });
    let ticks = Rc::new(Cell::new(0));
    let seen = Rc::clone(&ticks);
    reactor
        .add_timer(1, move |reactor, _| {
            seen.set(seen.get() + 1);
            reactor.stop();
        })
        .expect("add");
    clock.advance(5);

    // No descriptors: run() cycles NoDescriptors ticks until the timer
    // callback requests the stop.
    reactor.run();
    assert_eq!(ticks.get(), 1);
}
