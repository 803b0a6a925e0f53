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

//! The inbound diagnostic record.
//!
//! [`Record`] is the host-side view of one diagnostic event, handed to the emit hook for the
//! duration of a single call; every text field borrows from the host. The hook reads all of it
//! and writes exactly one thing back: [`Record::output_to_server`], cleared after a successful
//! journal send when the hook is configured to suppress the host's own mirrored log line.

use crate::severity::Severity;

type StdResult<T, E> = std::result::Result<T, E>;

/// A packed five-character SQLSTATE code.
///
/// The host packs each character into six bits, low bits first, offset from `'0'`; `Display`
/// unpacks it back to the usual five-character form (`"22012"`, `"42P01"`, ...).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SqlState(pub u32);

impl SqlState {
    /// Pack a five-character code. Characters are taken modulo the six-bit alphabet; the code is
    /// assumed well formed (digits and uppercase ASCII), as with everything else on a [`Record`].
    pub fn from_code(code: &[u8; 5]) -> SqlState {
        let mut packed = 0u32;
        for (i, &ch) in code.iter().enumerate() {
            packed |= ((ch.wrapping_sub(b'0') as u32) & 0x3f) << (i * 6);
        }
        SqlState(packed)
    }
}

impl std::fmt::Display for SqlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        let mut buf = [0u8; 5];
        let mut code = self.0;
        for b in &mut buf {
            *b = b'0' + (code & 0x3f) as u8;
            code >>= 6;
        }
        // Six-bit groups offset from '0' stay within ASCII
        write!(f, "{}", std::str::from_utf8(&buf).unwrap())
    }
}

/// One structured diagnostic event, borrowed from the host for the duration of one emit call.
///
/// Plain data rather than a configured component, so the fields are public and absent values are
/// simply `None`. [`Record::new`] fills in the two required fields and leaves everything else
/// empty; tests and hosts alike build variations with struct-update syntax:
///
/// ```rust
/// use pg_journal::record::Record;
/// use pg_journal::severity::Severity;
///
/// let record = Record {
///     statement: Some("SELECT 1/0"),
///     ..Record::new(Severity::ERROR, "division by zero")
/// };
/// assert!(record.output_to_server);
/// ```
#[derive(Clone, Debug)]
pub struct Record<'a> {
    pub severity: Severity,
    /// Primary human-readable message
    pub message: &'a str,
    /// User-facing detail
    pub detail: Option<&'a str>,
    /// Detail destined for the server log only; wins over `detail` when both are present
    pub detail_log: Option<&'a str>,
    pub hint: Option<&'a str>,
    /// Text of an internally-generated query
    pub internal_query: Option<&'a str>,
    /// Context trace (where the error occurred)
    pub context: Option<&'a str>,
    /// The statement being executed when the event was raised
    pub statement: Option<&'a str>,
    pub sqlstate: Option<SqlState>,

    pub schema_name: Option<&'a str>,
    pub table_name: Option<&'a str>,
    pub column_name: Option<&'a str>,
    pub datatype_name: Option<&'a str>,
    pub constraint_name: Option<&'a str>,

    /// Source file the event was raised from
    pub file: Option<&'a str>,
    /// Source line; meaningful only together with `file`
    pub line: u32,
    pub function: Option<&'a str>,

    pub user: Option<&'a str>,
    pub database: Option<&'a str>,
    pub remote_host: Option<&'a str>,
    pub remote_port: Option<u16>,
    pub application_name: Option<&'a str>,

    /// Set when the statement text is already part of the message (statement logging), in which
    /// case emitting `STATEMENT` would duplicate it
    pub hide_statement: bool,
    /// Whether the host intends to write this event to its own server log. The emit hook skips
    /// records with this cleared, and may clear it itself after a successful journal send.
    pub output_to_server: bool,
}

impl<'a> Record<'a> {
    pub fn new(severity: Severity, message: &'a str) -> Record<'a> {
        Record {
            severity,
            message,
            detail: None,
            detail_log: None,
            hint: None,
            internal_query: None,
            context: None,
            statement: None,
            sqlstate: None,
            schema_name: None,
            table_name: None,
            column_name: None,
            datatype_name: None,
            constraint_name: None,
            file: None,
            line: 0,
            function: None,
            user: None,
            database: None,
            remote_host: None,
            remote_port: None,
            application_name: None,
            hide_statement: false,
            output_to_server: true,
        }
    }
}
