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

//! The emit hook itself.
//!
//! [`JournalHook`] carries everything with process lifetime: the sink, the cached [`Settings`],
//! the recursion guard and the reported-a-failure flag. One instance is constructed at host
//! startup and shared for the life of the process; constructing a fresh one is what "restart"
//! means in tests.
//!
//! [`JournalHook::emit`] processes one record start to finish: gate, assemble, freeze, send,
//! report or suppress. Failure reporting goes through a fallback channel — a closure supplied by
//! the host, routed through the host's ordinary logging. That call can itself produce a record
//! that arrives right back here, which is why the recursion guard stays held across it: the
//! synthetic warning must reach every *other* handler, but must not be journaled.
//!
//! [`HookChain`] is the installation side: an ordered list of [`EmitHook`] handlers invoked for
//! every record, with `push`/`pop` pairing install and teardown. A chain of owned handlers
//! composes where a single overwritable hook pointer cannot: several handlers coexist and each
//! uninstalls cleanly.

use crate::{fields::FieldBatch, record::Record, severity::Severity, transport::Journal};

use std::sync::atomic::{AtomicBool, Ordering};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            settings                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Host-supplied configuration, read once at construction and cached for the process lifetime.
#[derive(Clone, Debug)]
pub struct Settings {
    /// After a successful journal send, clear the record's `output_to_server` flag so the host
    /// skips its own mirrored log line
    pub suppress_server_log: bool,
    /// `SYSLOG_IDENTIFIER` tag stamped on every batch
    pub identifier: String,
}

impl std::default::Default for Settings {
    /// Mirroring stays on; the identifier falls back to the current executable's file name, or
    /// `"-"` when even that cannot be retrieved.
    fn default() -> Self {
        Settings {
            suppress_server_log: false,
            identifier: default_identifier(),
        }
    }
}

fn default_identifier() -> String {
    std::env::current_exe() // :=> StdResult<PathBuf, std::io::Error>
        .ok()
        .and_then(|pbuf| {
            pbuf.file_name()
                .map(|os_str| os_str.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "-".to_string())
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         struct JournalHook                                     //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The process-scoped emit hook: sink, cached settings, and the two process-lifetime flags.
///
/// `Send + Sync` whenever the sink is, so it can live behind an `Arc` with no further locking;
/// the host serializes its own emit calls, and the flags are single atomics rather than counters
/// because processing is synchronous — there is no second frame to count.
pub struct JournalHook<J: Journal> {
    journal: J,
    settings: Settings,
    /// Set for the duration of one emit call; a record arriving while it is set came out of our
    /// own fallback path and is skipped
    in_hook: AtomicBool,
    /// A send has already failed and been reported; stays set until process restart
    reported_failure: AtomicBool,
    fallback: Box<dyn Fn(Severity, &str) + Send + Sync>,
}

/// The default fallback channel: the crate's own diagnostics flow through [`tracing`], picking
/// up whatever subscriber stack the host installed.
fn tracing_fallback(severity: Severity, message: &str) {
    if severity >= Severity::ERROR {
        tracing::error!("{}", message);
    } else {
        tracing::warn!("{}", message);
    }
}

impl<J: Journal> JournalHook<J> {
    /// Construct a hook around `journal` with default [`Settings`] and the [`tracing`] fallback.
    pub fn new(journal: J) -> JournalHook<J> {
        JournalHook {
            journal,
            settings: Settings::default(),
            in_hook: AtomicBool::new(false),
            reported_failure: AtomicBool::new(false),
            fallback: Box::new(tracing_fallback),
        }
    }

    pub fn builder(journal: J) -> JournalHookBuilder<J> {
        JournalHookBuilder {
            imp: JournalHook::new(journal),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Process one record: gate, assemble, freeze, send, report or suppress.
    ///
    /// Never returns an error to the host. A failed send is reported once per process lifetime
    /// through the fallback channel and otherwise swallowed; a capacity overflow is reported at
    /// the most severe level this subsystem may use and the record abandoned.
    pub fn emit(&self, record: &mut Record<'_>) {
        if self.in_hook.swap(true, Ordering::AcqRel) {
            // Our own fallback re-entering; earlier handlers have already seen this record
            return;
        }
        self.emit_guarded(record);
        self.in_hook.store(false, Ordering::Release);
    }

    fn emit_guarded(&self, record: &mut Record<'_>) {
        if !record.output_to_server {
            return;
        }

        let batch = match FieldBatch::assemble(record, &self.settings.identifier) {
            Ok(batch) => batch,
            Err(err) => {
                // The field set and the capacity constant disagree; a truncated batch would be
                // worse than a loud abort
                (self.fallback)(Severity::FATAL, &format!("pg_journal: {}", err));
                return;
            }
        };

        match self.journal.send(&batch.io_slices()) {
            Ok(()) => {
                if self.settings.suppress_server_log {
                    record.output_to_server = false;
                }
            }
            Err(err) => {
                // One warning per process lifetime; a dead journal must not turn every
                // subsequent record into its own complaint
                if !self.reported_failure.swap(true, Ordering::AcqRel) {
                    (self.fallback)(
                        Severity::WARNING,
                        &format!(
                            "pg_journal: failed logging message with {} fields: {}",
                            batch.len(),
                            err
                        ),
                    );
                }
            }
        }
    }
}

impl<J: Journal> std::fmt::Debug for JournalHook<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalHook")
            .field("settings", &self.settings)
            .field("in_hook", &self.in_hook)
            .field("reported_failure", &self.reported_failure)
            .finish_non_exhaustive()
    }
}

pub struct JournalHookBuilder<J: Journal> {
    imp: JournalHook<J>,
}

impl<J: Journal> JournalHookBuilder<J> {
    pub fn suppress_server_log(mut self, suppress: bool) -> Self {
        self.imp.settings.suppress_server_log = suppress;
        self
    }

    pub fn identifier(mut self, identifier: String) -> Self {
        self.imp.settings.identifier = identifier;
        self
    }

    /// Replace the fallback channel the hook reports its own failures through.
    pub fn fallback(mut self, f: impl Fn(Severity, &str) + Send + Sync + 'static) -> Self {
        self.imp.fallback = Box::new(f);
        self
    }

    pub fn build(self) -> JournalHook<J> {
        self.imp
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          hook chaining                                         //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// One handler in the host's emit pipeline.
pub trait EmitHook: Send + Sync {
    fn emit(&self, record: &mut Record<'_>);
}

impl<J: Journal + Send + Sync> EmitHook for JournalHook<J> {
    fn emit(&self, record: &mut Record<'_>) {
        JournalHook::emit(self, record)
    }
}

/// An ordered list of emit handlers, invoked front to back for every record.
///
/// Install by pushing on top of whatever is already there; uninstall by popping — the handlers
/// below are untouched, which is what a well-behaved teardown looks like.
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn EmitHook>>,
}

impl HookChain {
    pub fn new() -> HookChain {
        HookChain::default()
    }

    pub fn push(&mut self, hook: Box<dyn EmitHook>) {
        self.hooks.push(hook);
    }

    pub fn pop(&mut self) -> Option<Box<dyn EmitHook>> {
        self.hooks.pop()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Hand `record` to every handler in installation order.
    pub fn emit(&self, record: &mut Record<'_>) {
        for hook in &self.hooks {
            hook.emit(record);
        }
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain").field("len", &self.hooks.len()).finish()
    }
}
