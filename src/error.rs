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

//! [pg-journal](crate) errors

use backtrace::Backtrace;

/// [pg-journal](crate) error type
///
/// [pg-journal](crate) eschews libraries like [thiserror], [anyhow] & [Snafu] in favor of a
/// straightforward enumeration with a few match arms chosen on the basis of what the caller will
/// need to respond.
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
/// [Snafu]: https://docs.rs/snafu/latest/snafu
#[non_exhaustive]
pub enum Error {
    /// A record produced more fields than the declared capacity; the field set and the capacity
    /// constant have fallen out of sync. This is a defect in the crate, not in the record.
    TooManyFields {
        count: usize,
        max: usize,
        back: Backtrace,
    },
    /// The journal socket refused the datagram
    Transport {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
}

impl std::convert::From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        }
    }
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::TooManyFields { count, max, .. } => {
                write!(f, "too many log fields ({} > {})", count, max)
            }
            Error::Transport { source, .. } => {
                write!(f, "sending to the journal failed: {}", source)
            }
            _ => write!(f, "pg-journal error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::TooManyFields {
                count: _,
                max: _,
                back,
            } => write!(f, "{}\n{:#?}", self, back),
            Error::Transport { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            _ => write!(f, "{}", self),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
