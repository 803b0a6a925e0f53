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

//! Severity level & journal priority definitions.
//!
//! [`Severity`] is the host's ordered diagnostic-level domain: five debug tiers below a run of
//! increasingly urgent levels, numbered so that new tiers can be added above the known maximum.
//! [`Priority`] replicates the names used in `<syslog.h>`, which is also the scale journald
//! stores in its `PRIORITY` field. The two scales have different shapes (the host distinguishes
//! five debug tiers and both a client-visible and a server-only informational level; the journal
//! has exactly eight rungs), so [`map_priority`] is many-to-one.

type StdResult<T, E> = std::result::Result<T, E>;

/// One diagnostic level of the host.
///
/// A newtype rather than an enumeration: `PGLEVEL` must carry the raw numeric level even for
/// values this crate has never heard of, and [`map_priority`] must be total over all of them.
/// The known domain is exposed as associated constants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Severity(pub i32);

impl Severity {
    /// Noisiest debug tier
    pub const DEBUG5: Severity = Severity(10);
    pub const DEBUG4: Severity = Severity(11);
    pub const DEBUG3: Severity = Severity(12);
    pub const DEBUG2: Severity = Severity(13);
    /// Quietest debug tier
    pub const DEBUG1: Severity = Severity(14);
    /// Server-log-only informational message
    pub const LOG: Severity = Severity(15);
    /// Client-communication failure; reported like LOG but never sent to the client
    pub const COMMERROR: Severity = Severity(16);
    /// Informational message passed to the client
    pub const INFO: Severity = Severity(17);
    pub const NOTICE: Severity = Severity(18);
    pub const WARNING: Severity = Severity(19);
    /// Aborts the current operation
    pub const ERROR: Severity = Severity(20);
    /// Aborts the current session
    pub const FATAL: Severity = Severity(21);
    /// Takes down the whole host
    pub const PANIC: Severity = Severity(22);

    /// The tag prefixed to `MESSAGE` fields, matching what the host prints in its own log.
    /// All five debug tiers collapse to `"DEBUG"`; anything unknown renders as `"???"`.
    pub fn tag(&self) -> &'static str {
        match self.0 {
            10..=14 => "DEBUG",
            15 | 16 => "LOG",
            17 => "INFO",
            18 => "NOTICE",
            19 => "WARNING",
            20 => "ERROR",
            21 => "FATAL",
            22 => "PANIC",
            _ => "???",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

/// The journal's eight urgency rungs. The enumeration values duplicate the constants documented
/// in the `syslog()` manual [page] & defined in `<syslog.h>`; journald stores the numeric value
/// in each entry's `PRIORITY` field.
///
/// [page]: https://man7.org/linux/man-pages/man3/syslog.3.html
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Priority {
    /// system is unusable
    LOG_EMERG,
    /// action must be taken immediately
    LOG_ALERT,
    /// critical conditions
    LOG_CRIT,
    /// error conditions
    LOG_ERR,
    /// warning conditions
    LOG_WARNING,
    /// normal, but significant condition
    LOG_NOTICE,
    /// informational message
    LOG_INFO,
    /// debug-level message
    LOG_DEBUG,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Priority::LOG_EMERG => "LOG_EMERG",
                Priority::LOG_ALERT => "LOG_ALERT",
                Priority::LOG_CRIT => "LOG_CRIT",
                Priority::LOG_ERR => "LOG_ERR",
                Priority::LOG_WARNING => "LOG_WARNING",
                Priority::LOG_NOTICE => "LOG_NOTICE",
                Priority::LOG_INFO => "LOG_INFO",
                Priority::LOG_DEBUG => "LOG_DEBUG",
            }
        )
    }
}

/// Map a host severity to a journal priority.
///
/// Total over all of `i32`. Anything outside the known domain, negative values included, maps to
/// [`Priority::LOG_EMERG`]: a corrupted level must be noticed, not buried below the debug tiers.
pub fn map_priority(severity: Severity) -> Priority {
    match severity.0 {
        10..=14 => Priority::LOG_DEBUG,
        15 | 16 | 17 => Priority::LOG_INFO,
        18 => Priority::LOG_NOTICE,
        19 => Priority::LOG_WARNING,
        20 => Priority::LOG_ERR,
        21 => Priority::LOG_CRIT,
        22 => Priority::LOG_ALERT,
        // Out of range: log with EMERG so the message is noticed
        _ => Priority::LOG_EMERG,
    }
}
