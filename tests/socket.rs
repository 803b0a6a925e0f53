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

//! End-to-end tests over a real Unix datagram socket.
//!
//! A bound socket in the temp directory stands in for journald, so the full path — record in,
//! one native-protocol datagram out — runs without a live daemon.

use pg_journal::hook::JournalHook;
use pg_journal::record::{Record, SqlState};
use pg_journal::severity::Severity;
use pg_journal::transport::JournalSocket;

use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;

struct FakeJournald {
    socket: UnixDatagram,
    path: PathBuf,
}

impl FakeJournald {
    fn bind(name: &str) -> FakeJournald {
        let path = std::env::temp_dir().join(format!(
            "pg-journal-test-{}-{}.socket",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_file(&path);
        let socket = UnixDatagram::bind(&path).expect("bind test socket");
        FakeJournald { socket, path }
    }

    fn recv_datagram(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 64 * 1024];
        let n = self.socket.recv(&mut buf).expect("recv datagram");
        buf.truncate(n);
        buf
    }
}

impl Drop for FakeJournald {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Decode one native-protocol datagram back into `KEY=value` fields.
fn decode_fields(datagram: &[u8]) -> Vec<Vec<u8>> {
    let mut fields = Vec::new();
    let mut rest = datagram;
    while !rest.is_empty() {
        let nl = rest
            .iter()
            .position(|&b| b == b'\n')
            .expect("truncated datagram");
        let line = &rest[..nl];
        if line.contains(&b'=') {
            fields.push(line.to_vec());
            rest = &rest[nl + 1..];
        } else {
            // Binary form: KEY \n u64-le length, value, \n
            let after = &rest[nl + 1..];
            let len = u64::from_le_bytes(after[..8].try_into().unwrap()) as usize;
            let mut field = line.to_vec();
            field.push(b'=');
            field.extend_from_slice(&after[8..8 + len]);
            fields.push(field);
            assert_eq!(after[8 + len], b'\n', "binary field not newline-terminated");
            rest = &after[8 + len + 1..];
        }
    }
    fields
}

/// The ordinary failed-statement shape arrives as one datagram with exactly the expected
/// fields, in order, and no DETAIL.
#[test]
fn test_error_record_arrives_in_one_datagram() {
    let daemon = FakeJournald::bind("error-record");
    let hook = JournalHook::builder(JournalSocket::new(&daemon.path).unwrap())
        .identifier("postgres".to_string())
        .build();

    let mut record = Record {
        sqlstate: Some(SqlState::from_code(b"22012")),
        statement: Some("SELECT 1/0"),
        user: Some("alice"),
        database: Some("shop"),
        ..Record::new(Severity::ERROR, "division by zero")
    };
    hook.emit(&mut record);

    let fields = decode_fields(&daemon.recv_datagram());
    assert_eq!(
        fields,
        vec![
            b"PRIORITY=3".to_vec(),
            b"PGLEVEL=20".to_vec(),
            b"SQLSTATE=22012".to_vec(),
            b"MESSAGE=ERROR: division by zero".to_vec(),
            b"STATEMENT=SELECT 1/0".to_vec(),
            b"PGUSER=alice".to_vec(),
            b"PGDATABASE=shop".to_vec(),
            b"SYSLOG_IDENTIFIER=postgres".to_vec(),
        ]
    );
}

/// Statement logging: the correlation id leads the batch on the wire too.
#[test]
fn test_statement_logging_message_id_on_the_wire() {
    let daemon = FakeJournald::bind("statement-logging");
    let hook = JournalHook::builder(JournalSocket::new(&daemon.path).unwrap())
        .identifier("postgres".to_string())
        .build();

    let mut record = Record {
        statement: Some("SELECT pg_sleep(1)"),
        hide_statement: true,
        ..Record::new(Severity::LOG, "statement: SELECT pg_sleep(1)")
    };
    hook.emit(&mut record);

    let fields = decode_fields(&daemon.recv_datagram());
    assert_eq!(
        fields[0],
        b"MESSAGE_ID=a63699368b304b4cb51bce5644736306".to_vec()
    );
    assert!(fields.contains(&b"PRIORITY=6".to_vec()));
}

/// A multi-line statement round-trips intact through the binary field form.
#[test]
fn test_multiline_value_round_trips() {
    let daemon = FakeJournald::bind("multiline");
    let hook = JournalHook::builder(JournalSocket::new(&daemon.path).unwrap())
        .identifier("postgres".to_string())
        .build();

    let statement = "SELECT 1,\n       2,\n       3";
    let mut record = Record {
        statement: Some(statement),
        ..Record::new(Severity::ERROR, "canceling statement due to user request")
    };
    hook.emit(&mut record);

    let fields = decode_fields(&daemon.recv_datagram());
    let expected = format!("STATEMENT={}", statement);
    assert!(fields.contains(&expected.into_bytes()));
}

/// Consecutive records produce one datagram each.
#[test]
fn test_one_datagram_per_record() {
    let daemon = FakeJournald::bind("one-per-record");
    let hook = JournalHook::builder(JournalSocket::new(&daemon.path).unwrap())
        .identifier("postgres".to_string())
        .build();

    for message in ["first", "second", "third"] {
        let mut record = Record::new(Severity::NOTICE, message);
        hook.emit(&mut record);
    }

    for message in ["first", "second", "third"] {
        let fields = decode_fields(&daemon.recv_datagram());
        let expected = format!("MESSAGE=NOTICE: {}", message);
        assert!(fields.contains(&expected.into_bytes()));
    }
}
