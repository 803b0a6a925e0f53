// Copyright (C) 2026 pg-journal developers
//
// This file is part of pg-journal.
//
// pg-journal is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// pg-journal is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with pg-journal.  If
// not, see <http://www.gnu.org/licenses/>.

//! The journal transport layer.
//!
//! This module defines the [`Journal`] trait that all sinks must support, the real
//! [`JournalSocket`] implementation speaking journald's native protocol over a Unix datagram
//! socket, and two in-process implementations ([`MemoryJournal`], [`FailingJournal`]) for tests
//! and for hosts exercising their own integration.
//!
//! # Examples
//!
//! To send to the journald instance on this machine:
//!
//! ```no_run
//! use pg_journal::transport::JournalSocket;
//! let journal = JournalSocket::try_default().unwrap();
//! ```
//!
//! To capture batches in memory:
//!
//! ```rust
//! use pg_journal::transport::{Journal, MemoryJournal};
//! use std::io::IoSlice;
//!
//! let journal = MemoryJournal::new();
//! journal.send(&[IoSlice::new(b"MESSAGE=hi")]).unwrap();
//! assert_eq!(journal.len(), 1);
//! ```

use crate::error::{Error, Result};

use backtrace::Backtrace;
use bytes::BufMut;

use std::{
    io::IoSlice,
    os::unix::net::UnixDatagram,
    path::Path,
    sync::{Arc, Mutex},
};

/// Where journald listens for native-protocol datagrams.
pub const JOURNAL_SOCKET_PATH: &str = "/run/systemd/journal/socket";

/// Operations all journal sinks must support.
///
/// `fields` is the resolved form of one record's batch: every slice is a stable
/// (pointer, length) pair into a buffer that will not move again, each covering one complete
/// `KEY=value` field. Implementations transmit the whole batch in a single operation; no retry,
/// one call per record.
pub trait Journal {
    fn send(&self, fields: &[IoSlice<'_>]) -> Result<()>;
}

/// Serialize a batch into one native-protocol datagram.
///
/// A field travels as `KEY=value\n`, unless the value itself contains a newline, in which case
/// the daemon expects the binary form: `KEY\n`, a little-endian 64-bit byte length, the value,
/// `\n`.
fn encode_datagram(fields: &[IoSlice<'_>]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(fields.iter().map(|f| f.len() + 16).sum());
    for field in fields {
        let bytes: &[u8] = field;
        let eq = bytes.iter().position(|&b| b == b'=');
        match eq {
            Some(i) if bytes[i + 1..].contains(&b'\n') => {
                buf.put_slice(&bytes[..i]);
                buf.put_u8(b'\n');
                buf.put_u64_le((bytes.len() - i - 1) as u64);
                buf.put_slice(&bytes[i + 1..]);
                buf.put_u8(b'\n');
            }
            _ => {
                buf.put_slice(bytes);
                buf.put_u8(b'\n');
            }
        }
    }
    buf
}

/// Sending batches to journald via its native Unix datagram socket.
pub struct JournalSocket {
    socket: UnixDatagram,
}

impl JournalSocket {
    /// Construct a [`Journal`] implementation speaking to the socket at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<JournalSocket> {
        let socket = UnixDatagram::unbound().map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        socket.connect(path).map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        Ok(JournalSocket { socket })
    }

    /// Construct a [`Journal`] implementation speaking to this machine's journald.
    pub fn try_default() -> Result<JournalSocket> {
        JournalSocket::new(JOURNAL_SOCKET_PATH)
    }
}

impl Journal for JournalSocket {
    fn send(&self, fields: &[IoSlice<'_>]) -> Result<()> {
        let datagram = encode_datagram(fields);
        self.socket.send(&datagram).map_err(|err| Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        Ok(())
    }
}

/// A [`Journal`] that records every batch it is handed.
///
/// Clones share storage, so a test can keep one handle and give the other to the hook.
#[derive(Clone, Debug, Default)]
pub struct MemoryJournal {
    entries: Arc<Mutex<Vec<Vec<Vec<u8>>>>>,
}

impl MemoryJournal {
    pub fn new() -> MemoryJournal {
        MemoryJournal::default()
    }

    /// Every batch received so far, each field as owned bytes.
    pub fn entries(&self) -> Vec<Vec<Vec<u8>>> {
        self.entries.lock().unwrap().clone()
    }

    /// Number of batches received.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Journal for MemoryJournal {
    fn send(&self, fields: &[IoSlice<'_>]) -> Result<()> {
        let entry = fields.iter().map(|f| f.to_vec()).collect();
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

/// A [`Journal`] that fails every send with the given OS error code, counting the attempts.
#[derive(Debug)]
pub struct FailingJournal {
    errno: i32,
    attempts: Arc<Mutex<usize>>,
}

impl FailingJournal {
    pub fn new(errno: i32) -> FailingJournal {
        FailingJournal {
            errno,
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl Journal for FailingJournal {
    fn send(&self, _fields: &[IoSlice<'_>]) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        Err(Error::Transport {
            source: Box::new(std::io::Error::from_raw_os_error(self.errno)),
            back: Backtrace::new(),
        })
    }
}
