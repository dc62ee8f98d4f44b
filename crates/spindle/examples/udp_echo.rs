// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 spindle project

//! UDP echo server on a single reactor tick loop.
//!
//! Echoes every datagram back to its sender and logs a heartbeat every
//! five seconds. Try it with:
//!
//! ```text
//! cargo run --example udp_echo
//! printf hello | nc -u -w1 127.0.0.1 <port>
//! ```

use std::net::UdpSocket;
use std::os::unix::io::AsRawFd;

use spindle::{Reactor, ReactorConfig};

fn main() -> spindle::Result<()> {
    let socket = UdpSocket::bind("127.0.0.1:0")?;
    socket.set_nonblocking(true)?;
    println!("echoing on {}", socket.local_addr()?);

    let mut reactor = Reactor::new(ReactorConfig::default())?;

    reactor.add_descriptor(socket.as_raw_fd(), move |_, _| {
        let mut buf = [0u8; 1500];
        // Level-triggered: drain everything that is readable right now.
        while let Ok((n, peer)) = socket.recv_from(&mut buf) {
            println!("{n} bytes from {peer}");
            let _ = socket.send_to(&buf[..n], peer);
        }
    })?;

    let _beat = reactor.add_timer_repeating(5, |_, now| {
        println!("heartbeat at {now}");
    })?;

    reactor.run();
    Ok(())
}
