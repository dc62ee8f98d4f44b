// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 spindle project

//! Loop controller behavior: stop observation and cross-thread wake.

use std::cell::Cell;
use std::net::UdpSocket;
use std::os::unix::io::AsRawFd;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use spindle::{Reactor, ReactorConfig};

fn udp_pair() -> (UdpSocket, UdpSocket) {
    let a = UdpSocket::bind("127.0.0.1:0").expect("bind");
    let b = UdpSocket::bind("127.0.0.1:0").expect("bind");
    a.connect(b.local_addr().expect("addr")).expect("connect");
    b.connect(a.local_addr().expect("addr")).expect("connect");
    a.set_nonblocking(true).expect("nonblocking");
    b.set_nonblocking(true).expect("nonblocking");
    (a, b)
}

#[test]
fn stop_from_callback_ends_the_loop_after_the_current_tick() {
    let (tx, rx) = udp_pair();
    tx.send(b"one").expect("send");
    // A second datagram stays queued: if a tick K+1 happened, the callback
    // would run again and the count would exceed 1.
    tx.send(b"two").expect("send");

    let mut reactor = Reactor::new(ReactorConfig::default()).expect("reactor");
    let dispatches = Rc::new(Cell::new(0));
    let seen = Rc::clone(&dispatches);
    reactor
        .add_descriptor(rx.as_raw_fd(), move |reactor, _| {
            let mut buf = [0u8; 8];
            let _ = rx.recv(&mut buf);
            seen.set(seen.get() + 1);
            reactor.stop();
        })
        .expect("add");

    reactor.run();
    assert_eq!(dispatches.get(), 1, "stop in tick K must prevent tick K+1");
}

#[test]
fn stop_handle_wakes_an_unbounded_wait() {
    let (_tx, rx) = udp_pair();
    let mut reactor = Reactor::new(ReactorConfig::default()).expect("reactor");
    // One quiet descriptor and no timers: the loop blocks without a bound.
    reactor.add_descriptor(rx.as_raw_fd(), |_, _| {}).expect("add");

    let handle = reactor.stop_handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        handle.stop();
    });

    let start = Instant::now();
    reactor.run();
    let elapsed = start.elapsed();
    stopper.join().expect("stopper thread");

    assert!(elapsed >= Duration::from_millis(90), "loop ended too early");
    assert!(elapsed < Duration::from_secs(5), "wake did not end the wait");
}

#[test]
fn empty_reactor_loops_on_backoff_until_stopped() {
    let config = ReactorConfig {
        idle_backoff: Duration::from_millis(5),
        ..ReactorConfig::default()
    };
    let mut reactor = Reactor::new(config).expect("reactor");

    let handle = reactor.stop_handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        handle.stop();
    });

    let start = Instant::now();
    reactor.run();
    stopper.join().expect("stopper thread");
    // With nothing registered the loop must neither spin at full speed nor
    // ignore the stop request.
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn run_restarts_after_a_stop() {
    let (tx, rx) = udp_pair();
    let mut reactor = Reactor::new(ReactorConfig::default()).expect("reactor");
    let dispatches = Rc::new(Cell::new(0));
    let seen = Rc::clone(&dispatches);
    reactor
        .add_descriptor(rx.as_raw_fd(), move |reactor, _| {
            let mut buf = [0u8; 8];
            let _ = rx.recv(&mut buf);
            seen.set(seen.get() + 1);
            reactor.stop();
        })
        .expect("add");

    tx.send(b"first run").expect("send");
    reactor.run();
    tx.send(b"second run").expect("send");
    reactor.run();

    assert_eq!(dispatches.get(), 2, "registrations survive across runs");
}
