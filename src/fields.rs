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

//! Field assembly: one growable buffer, one bounded batch per record.
//!
//! All of a record's `KEY=value` fields are laid out back to back in a single [`FieldBuffer`]
//! rather than one allocation per field: a dozen short fields per event make per-field buffers
//! mostly malloc overhead. The price of the shared buffer is that it relocates when it grows, so
//! nothing may hold a pointer into it while fields are still being appended. Every append
//! therefore yields only a [`Span`] (offset + length); [`FieldBuffer::freeze`] borrows the buffer
//! immutably and [`Frozen::resolve`] turns spans into real slices. While a [`Frozen`] is alive
//! the borrow checker statically rejects further appends, which is the whole point: a span can
//! only become a pointer once growth is provably over.
//!
//! [`FieldBatch::assemble`] walks a [`Record`](crate::record::Record) in a fixed, documented
//! order, appends the fields that are present, and enforces [`MAX_FIELDS`].

use crate::{
    error::{Error, Result},
    record::Record,
    severity::map_priority,
};

use backtrace::Backtrace;
use bytes::BufMut;

use std::fmt;
use std::io::IoSlice;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         growable buffer                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The maximum number of fields one record can produce.
///
/// Equal to the number of distinct field kinds the assembler knows. The real worst case is one
/// lower (`MESSAGE_ID` and `STATEMENT` are mutually exclusive), which
/// `tests::test_worst_case_is_within_capacity` pins by enumerating every field-producing
/// condition. [`FieldBatch::assemble`] treats exceeding this as fatal: it means a field kind was
/// added without revisiting this constant.
pub const MAX_FIELDS: usize = 23;

/// `MESSAGE_ID` assigned to statement logging, so external tooling can classify and deduplicate
/// logged statements across hosts. Fixed forever; tooling matches on the literal value.
pub const STATEMENT_MESSAGE_ID: &str = "a63699368b304b4cb51bce5644736306";

/// A field's location inside a [`FieldBuffer`]: offset + length, pointer-free, and therefore
/// immune to the buffer relocating on growth.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Span {
    start: usize,
    len: usize,
}

/// A single append-only byte buffer holding every field of one record, key and value
/// concatenated (keys carry their trailing `=` already).
#[derive(Debug, Default)]
pub struct FieldBuffer {
    buf: Vec<u8>,
}

/// Adapts `fmt::write` to append straight into the field buffer, so formatted values are
/// rendered in place instead of through a temporary `String`.
struct ByteWriter<'a>(&'a mut Vec<u8>);

impl fmt::Write for ByteWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

impl FieldBuffer {
    pub fn new() -> FieldBuffer {
        FieldBuffer::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> FieldBuffer {
        FieldBuffer {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append `key` immediately followed by `value`, growing the buffer as needed.
    pub fn append_kv(&mut self, key: &str, value: &str) -> Span {
        let start = self.buf.len();
        self.buf.put_slice(key.as_bytes());
        self.buf.put_slice(value.as_bytes());
        Span {
            start,
            len: self.buf.len() - start,
        }
    }

    /// Append `key` followed by a formatted value, rendered directly into the buffer.
    ///
    /// Growth during rendering is `Vec`'s problem, not ours. A `Display` impl that errors
    /// mid-render has its partial output truncated, so a span never covers a half-written value.
    pub fn append_fmt(&mut self, key: &str, args: fmt::Arguments) -> Span {
        let start = self.buf.len();
        self.buf.put_slice(key.as_bytes());
        let value_start = self.buf.len();
        if fmt::write(&mut ByteWriter(&mut self.buf), args).is_err() {
            self.buf.truncate(value_start);
        }
        Span {
            start,
            len: self.buf.len() - start,
        }
    }

    /// Number of bytes appended so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Stop growing and start resolving.
    ///
    /// The returned [`Frozen`] borrows this buffer for its entire lifetime, so the compiler
    /// rejects any further `append_*` while a resolved slice can still be observed. Call it once,
    /// after the last append for the record.
    pub fn freeze(&self) -> Frozen<'_> {
        Frozen { buf: &self.buf }
    }
}

/// A frozen view of a [`FieldBuffer`]: spans resolve to the exact bytes that were appended,
/// valid for as long as this borrow lives.
#[derive(Copy, Clone, Debug)]
pub struct Frozen<'a> {
    buf: &'a [u8],
}

impl<'a> Frozen<'a> {
    pub fn resolve(&self, span: Span) -> &'a [u8] {
        &self.buf[span.start..span.start + span.len]
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         batch assembly                                         //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The ordered, capacity-bounded set of fields built for one record.
#[derive(Debug)]
pub struct FieldBatch {
    buf: FieldBuffer,
    spans: Vec<Span>,
}

fn check_capacity(count: usize) -> Result<()> {
    if count > MAX_FIELDS {
        Err(Error::TooManyFields {
            count,
            max: MAX_FIELDS,
            back: Backtrace::new(),
        })
    } else {
        Ok(())
    }
}

impl FieldBatch {
    /// Build the field batch for one record.
    ///
    /// The field order is fixed and not data-dependent, so downstream consumers can rely on it:
    /// the statement-logging `MESSAGE_ID` leads when it applies, `SYSLOG_IDENTIFIER` always
    /// closes, and everything in between appears iff its source value is present. A field is
    /// never emitted with an empty value.
    pub fn assemble(record: &Record<'_>, identifier: &str) -> Result<FieldBatch> {
        let mut buf = FieldBuffer::new();
        let mut spans = Vec::with_capacity(MAX_FIELDS);

        // Statement logging repeats the statement inside the message; tag such entries with the
        // fixed MESSAGE_ID so tooling can pick them out.
        if record.hide_statement
            && record.statement.is_some()
            && record.message.starts_with("statement: ")
        {
            spans.push(buf.append_kv("MESSAGE_ID=", STATEMENT_MESSAGE_ID));
        }

        spans.push(buf.append_fmt(
            "PRIORITY=",
            format_args!("{}", map_priority(record.severity) as u8),
        ));
        spans.push(buf.append_fmt("PGLEVEL=", format_args!("{}", record.severity)));

        if let Some(sqlstate) = record.sqlstate {
            spans.push(buf.append_fmt("SQLSTATE=", format_args!("{}", sqlstate)));
        }

        spans.push(buf.append_fmt(
            "MESSAGE=",
            format_args!("{}: {}", record.severity.tag(), record.message),
        ));

        // The log-only detail wins when both are present
        if let Some(detail) = record.detail_log.or(record.detail) {
            spans.push(buf.append_kv("DETAIL=", detail));
        }

        if let Some(hint) = record.hint {
            spans.push(buf.append_kv("HINT=", hint));
        }

        if let Some(query) = record.internal_query {
            spans.push(buf.append_kv("QUERY=", query));
        }

        if let Some(context) = record.context {
            spans.push(buf.append_kv("CONTEXT=", context));
        }

        if !record.hide_statement {
            if let Some(statement) = record.statement {
                spans.push(buf.append_kv("STATEMENT=", statement));
            }
        }

        if let Some(schema) = record.schema_name {
            spans.push(buf.append_kv("SCHEMA=", schema));
        }
        if let Some(table) = record.table_name {
            spans.push(buf.append_kv("TABLE=", table));
        }
        if let Some(column) = record.column_name {
            spans.push(buf.append_kv("COLUMN=", column));
        }
        if let Some(datatype) = record.datatype_name {
            spans.push(buf.append_kv("DATATYPE=", datatype));
        }
        if let Some(constraint) = record.constraint_name {
            spans.push(buf.append_kv("CONSTRAINT=", constraint));
        }

        // The daemon only knows where the datagram came from; the event's true origin has to be
        // spelled out to override it.
        if let Some(file) = record.file {
            spans.push(buf.append_kv("CODE_FILE=", file));
            if record.line > 0 {
                spans.push(buf.append_fmt("CODE_LINE=", format_args!("{}", record.line)));
            }
        }
        if let Some(function) = record.function {
            spans.push(buf.append_kv("CODE_FUNC=", function));
        }

        if let Some(user) = record.user {
            spans.push(buf.append_kv("PGUSER=", user));
        }
        if let Some(database) = record.database {
            spans.push(buf.append_kv("PGDATABASE=", database));
        }
        if let Some(host) = record.remote_host {
            match record.remote_port {
                Some(port) => {
                    spans.push(buf.append_fmt("PGHOST=", format_args!("{}:{}", host, port)))
                }
                None => spans.push(buf.append_kv("PGHOST=", host)),
            }
        }
        if let Some(appname) = record.application_name {
            if !appname.is_empty() {
                spans.push(buf.append_kv("PGAPPNAME=", appname));
            }
        }

        spans.push(buf.append_kv("SYSLOG_IDENTIFIER=", identifier));

        check_capacity(spans.len())?;
        Ok(FieldBatch { buf, spans })
    }

    /// Number of fields in the batch.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Freeze the buffer and resolve every span, in order, into the vectored form the transport
    /// wants. One pass, after the last append.
    pub fn io_slices(&self) -> Vec<IoSlice<'_>> {
        let frozen = self.buf.freeze();
        self.spans
            .iter()
            .map(|&span| IoSlice::new(frozen.resolve(span)))
            .collect()
    }

    /// The resolved fields as plain byte slices, in batch order.
    pub fn fields(&self) -> Vec<&[u8]> {
        let frozen = self.buf.freeze();
        self.spans.iter().map(|&span| frozen.resolve(span)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SqlState;
    use crate::severity::Severity;

    /// Every span resolved after freezing points at exactly the bytes that were appended, no
    /// matter how many times the buffer grew in between.
    #[test]
    fn test_spans_survive_growth() {
        let mut buf = FieldBuffer::with_capacity(1);
        let mut expected: Vec<(Span, Vec<u8>)> = Vec::new();
        for i in 0..100 {
            let value = format!("value-{}-{}", i, "x".repeat(i));
            let span = buf.append_kv("KEY=", &value);
            expected.push((span, format!("KEY={}", value).into_bytes()));
        }
        let frozen = buf.freeze();
        for (span, bytes) in expected {
            assert_eq!(frozen.resolve(span), &bytes[..]);
        }
    }

    #[test]
    fn test_append_fmt_renders_in_place() {
        let mut buf = FieldBuffer::new();
        let span = buf.append_fmt("PRIORITY=", format_args!("{}", 3));
        let span2 = buf.append_fmt("PGHOST=", format_args!("{}:{}", "10.0.0.1", 5432));
        let frozen = buf.freeze();
        assert_eq!(frozen.resolve(span), b"PRIORITY=3");
        assert_eq!(frozen.resolve(span2), b"PGHOST=10.0.0.1:5432");
    }

    #[test]
    fn test_capacity_check_boundary() {
        assert!(check_capacity(MAX_FIELDS).is_ok());
        let err = check_capacity(MAX_FIELDS + 1).unwrap_err();
        assert!(format!("{}", err).contains("too many log fields"));
    }

    fn field_keys(batch: &FieldBatch) -> Vec<String> {
        batch
            .fields()
            .iter()
            .map(|f| {
                let eq = f.iter().position(|&b| b == b'=').unwrap();
                String::from_utf8(f[..=eq].to_vec()).unwrap()
            })
            .collect()
    }

    /// An error during query execution: the shape an ordinary failed statement produces.
    #[test]
    fn test_division_by_zero_shape() {
        let record = Record {
            sqlstate: Some(SqlState::from_code(b"22012")),
            statement: Some("SELECT 1/0"),
            ..Record::new(Severity::ERROR, "division by zero")
        };
        let batch = FieldBatch::assemble(&record, "postgres").unwrap();
        let fields = batch.fields();
        assert_eq!(
            fields,
            vec![
                &b"PRIORITY=3"[..],
                b"PGLEVEL=20",
                b"SQLSTATE=22012",
                b"MESSAGE=ERROR: division by zero",
                b"STATEMENT=SELECT 1/0",
                b"SYSLOG_IDENTIFIER=postgres",
            ]
        );
    }

    /// Statement logging: the fixed correlation id leads the batch, and STATEMENT is withheld
    /// because the message already carries the statement text.
    #[test]
    fn test_statement_logging_gets_message_id_first() {
        let record = Record {
            statement: Some("SELECT 1"),
            hide_statement: true,
            ..Record::new(Severity::LOG, "statement: SELECT 1")
        };
        let batch = FieldBatch::assemble(&record, "postgres").unwrap();
        let fields = batch.fields();
        let first = format!("MESSAGE_ID={}", STATEMENT_MESSAGE_ID);
        assert_eq!(fields[0], first.as_bytes());
        assert!(!field_keys(&batch).contains(&"STATEMENT=".to_string()));
    }

    /// A message that merely starts with the magic prefix is not statement logging.
    #[test]
    fn test_no_message_id_without_hide_statement() {
        let record = Record {
            statement: Some("SELECT 1"),
            ..Record::new(Severity::LOG, "statement: SELECT 1")
        };
        let batch = FieldBatch::assemble(&record, "postgres").unwrap();
        assert_eq!(batch.fields()[0], b"PRIORITY=6");
        assert!(field_keys(&batch).contains(&"STATEMENT=".to_string()));
    }

    #[test]
    fn test_detail_log_wins_over_detail() {
        let record = Record {
            detail: Some("user-facing detail"),
            detail_log: Some("server-log detail"),
            ..Record::new(Severity::ERROR, "boom")
        };
        let batch = FieldBatch::assemble(&record, "postgres").unwrap();
        assert!(batch
            .fields()
            .iter()
            .any(|f| *f == b"DETAIL=server-log detail"));

        let record = Record {
            detail: Some("user-facing detail"),
            ..Record::new(Severity::ERROR, "boom")
        };
        let batch = FieldBatch::assemble(&record, "postgres").unwrap();
        assert!(batch
            .fields()
            .iter()
            .any(|f| *f == b"DETAIL=user-facing detail"));
    }

    #[test]
    fn test_empty_application_name_is_omitted() {
        let record = Record {
            application_name: Some(""),
            ..Record::new(Severity::LOG, "hello")
        };
        let batch = FieldBatch::assemble(&record, "postgres").unwrap();
        assert!(!field_keys(&batch).contains(&"PGAPPNAME=".to_string()));
    }

    #[test]
    fn test_host_and_port_forms() {
        let record = Record {
            remote_host: Some("10.1.2.3"),
            remote_port: Some(54321),
            ..Record::new(Severity::LOG, "connection received")
        };
        let batch = FieldBatch::assemble(&record, "postgres").unwrap();
        assert!(batch.fields().iter().any(|f| *f == b"PGHOST=10.1.2.3:54321"));

        let record = Record {
            remote_host: Some("[local]"),
            ..Record::new(Severity::LOG, "connection received")
        };
        let batch = FieldBatch::assemble(&record, "postgres").unwrap();
        assert!(batch.fields().iter().any(|f| *f == b"PGHOST=[local]"));
    }

    #[test]
    fn test_line_without_file_is_omitted() {
        let record = Record {
            line: 42,
            function: Some("exec_simple_query"),
            ..Record::new(Severity::ERROR, "boom")
        };
        let batch = FieldBatch::assemble(&record, "postgres").unwrap();
        let keys = field_keys(&batch);
        assert!(!keys.contains(&"CODE_FILE=".to_string()));
        assert!(!keys.contains(&"CODE_LINE=".to_string()));
        assert!(keys.contains(&"CODE_FUNC=".to_string()));
    }

    /// A record with every optional populated, in both statement-flag configurations.
    fn maximal_record(hide_statement: bool) -> Record<'static> {
        Record {
            detail: Some("detail"),
            detail_log: Some("detail_log"),
            hint: Some("hint"),
            internal_query: Some("SELECT 1"),
            context: Some("PL/pgSQL function f() line 1"),
            statement: Some("SELECT 1"),
            sqlstate: Some(SqlState::from_code(b"22012")),
            schema_name: Some("public"),
            table_name: Some("t"),
            column_name: Some("c"),
            datatype_name: Some("integer"),
            constraint_name: Some("t_c_check"),
            file: Some("int8.c"),
            line: 652,
            function: Some("int8div"),
            user: Some("alice"),
            database: Some("shop"),
            remote_host: Some("10.0.0.1"),
            remote_port: Some(5432),
            application_name: Some("psql"),
            hide_statement,
            ..Record::new(
                Severity::ERROR,
                if hide_statement {
                    "statement: SELECT 1"
                } else {
                    "division by zero"
                },
            )
        }
    }

    /// Enumerates every field-producing condition: the worst case must stay within the declared
    /// capacity, in both statement-flag configurations (MESSAGE_ID and STATEMENT can never
    /// appear together). A failure here means a field kind was added without updating
    /// [`MAX_FIELDS`].
    #[test]
    fn test_worst_case_is_within_capacity() {
        for hide_statement in [false, true] {
            let record = maximal_record(hide_statement);
            let batch = FieldBatch::assemble(&record, "postgres").unwrap();
            assert_eq!(batch.len(), 22, "hide_statement={}", hide_statement);
            assert!(batch.len() <= MAX_FIELDS);
        }
    }

    /// Spot-check the documented order on a fully-populated record.
    #[test]
    fn test_field_order_is_fixed() {
        let batch = FieldBatch::assemble(&maximal_record(false), "postgres").unwrap();
        assert_eq!(
            field_keys(&batch),
            vec![
                "PRIORITY=",
                "PGLEVEL=",
                "SQLSTATE=",
                "MESSAGE=",
                "DETAIL=",
                "HINT=",
                "QUERY=",
                "CONTEXT=",
                "STATEMENT=",
                "SCHEMA=",
                "TABLE=",
                "COLUMN=",
                "DATATYPE=",
                "CONSTRAINT=",
                "CODE_FILE=",
                "CODE_LINE=",
                "CODE_FUNC=",
                "PGUSER=",
                "PGDATABASE=",
                "PGHOST=",
                "PGAPPNAME=",
                "SYSLOG_IDENTIFIER=",
            ]
        );
    }

    #[test]
    fn test_io_slices_match_fields() {
        let batch = FieldBatch::assemble(&maximal_record(true), "postgres").unwrap();
        let slices = batch.io_slices();
        let fields = batch.fields();
        assert_eq!(slices.len(), fields.len());
        for (slice, field) in slices.iter().zip(fields) {
            assert_eq!(&slice[..], field);
        }
    }
}
