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

//! An emit-log hook that forwards structured diagnostic [`Record`]s to [systemd-journald].
//!
//! [systemd-journald]: https://www.freedesktop.org/software/systemd/man/systemd-journald.service.html
//! [`Record`]: crate::record::Record
//!
//! # Introduction
//!
//! Database-style hosts produce rich diagnostic records: a severity level, a primary message,
//! and a tail of optional context — SQLSTATE, detail, hint, the offending statement, structured
//! error components, session metadata. Flattening all of that into one log line throws the
//! structure away; journald can keep it, because a journal entry is an open-ended set of
//! `KEY=value` fields that tooling can match on individually (`SQLSTATE=22012`,
//! `PGDATABASE=shop`, ...).
//!
//! This crate is the plumbing between the two. For each record it selects the fields that are
//! present, lays them out in a single growable buffer, and sends the batch to the journal's
//! native-protocol socket as one datagram. The interesting constraints:
//!
//! - the buffer relocates when it grows, so field locations are tracked as offsets and resolved
//!   to real slices only after a single explicit freeze ([`fields`]);
//! - the batch is bounded by a declared capacity, and blowing it is a defect to be reported
//!   loudly, not truncated quietly ([`fields::MAX_FIELDS`]);
//! - a dead journal must surface exactly one warning per process lifetime, not one per record,
//!   and that warning travels through the host's own logging — which can hand it right back to
//!   this crate, so a recursion guard keeps the hook from eating its own tail ([`hook`]).
//!
//! # Usage
//!
//! A host with its own diagnostics pipeline drives the hook directly:
//!
//! ```rust
//! use pg_journal::hook::JournalHook;
//! use pg_journal::record::Record;
//! use pg_journal::severity::Severity;
//! use pg_journal::transport::MemoryJournal;
//!
//! let journal = MemoryJournal::new(); // or JournalSocket::try_default()
//! let hook = JournalHook::builder(journal.clone())
//!     .identifier("postgres".to_string())
//!     .build();
//!
//! let mut record = Record {
//!     statement: Some("SELECT 1/0"),
//!     ..Record::new(Severity::ERROR, "division by zero")
//! };
//! hook.emit(&mut record);
//! assert_eq!(journal.len(), 1);
//! ```
//!
//! Hosts that already speak [`tracing`] mount the bridge [`layer::Layer`] instead:
//!
//! ```no_run
//! use pg_journal::layer::Layer;
//! use tracing::info;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//! use tracing_subscriber::registry::Registry;
//!
//! let subscriber = Registry::default().with(Layer::try_default().unwrap());
//! let _guard = tracing::subscriber::set_default(subscriber);
//!
//! info!("Hello, journal!");
//! ```
//!
//! Several handlers can observe the same records through a [`hook::HookChain`]; the journal hook
//! is just one [`hook::EmitHook`] among them, and popping it off restores whatever was installed
//! before.

pub mod error;
pub mod fields;
pub mod hook;
pub mod layer;
pub mod record;
pub mod severity;
pub mod transport;
