// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 spindle project

//! Error types for reactor operations.

use std::fmt;
use std::io;
use std::os::unix::io::RawFd;

/// Result type for reactor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for reactor operations
#[derive(Debug)]
pub enum Error {
    /// Registration rejected: every slot in the table is active
    CapacityExhausted,

    /// Remove or rearm target is not registered (or its handle is stale)
    NotFound,

    /// Descriptor is already registered
    DuplicateDescriptor(RawFd),

    /// The underlying wait primitive or descriptor registration failed
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CapacityExhausted => write!(f, "registration table is full"),
            Error::NotFound => write!(f, "no matching registration"),
            Error::DuplicateDescriptor(fd) => {
                write!(f, "descriptor {fd} is already registered")
            }
            Error::Io(e) => write!(f, "wait primitive error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
