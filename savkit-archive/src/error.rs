use savkit_core::{binary, string::SavStringError};
use thiserror::Error;

use crate::records::RecordWindow;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid container signature {found:?} (expected {expected:?})", expected = crate::container::MAGIC)]
    InvalidMagic { found: Vec<u8> },

    #[error("entry at offset {offset:08x} is truncated")]
    TruncatedEntry {
        offset: usize,
        #[source]
        source: binary::Error,
    },

    #[error("{trailing} trailing bytes at offset {offset:08x} do not form an entry")]
    TrailingBytes { offset: usize, trailing: usize },

    #[error("cannot decompress entry {name:?}")]
    Compression {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("entry {name:?} decompressed to {actual} bytes but declares {expected}")]
    SizeMismatch {
        name: String,
        expected: u32,
        /// Capped at one byte past `expected`.
        actual: usize,
    },

    #[error(
        "record window {window} does not fit a payload of {payload_len} bytes{}: {reason}",
        in_entry(.name)
    )]
    InvalidWindow {
        /// Entry whose payload was being sorted. Unset when sorting a bare payload.
        name: Option<String>,
        window: RecordWindow,
        payload_len: usize,
        reason: &'static str,
    },

    #[error("no entry named {name:?}")]
    EntryNotFound { name: String },

    #[error("invalid entry name {name:?}")]
    InvalidName {
        name: String,
        #[source]
        source: Option<SavStringError>,
    },

    #[error("{what} of {len} bytes does not fit in a u32 length field")]
    TooLarge { what: &'static str, len: usize },

    #[error(transparent)]
    Binary(#[from] binary::Error),
}

impl Error {
    /// Names the entry a window error was raised for, if it doesn't name one already.
    pub(crate) fn for_entry(self, entry: &str) -> Self {
        match self {
            Error::InvalidWindow {
                name: None,
                window,
                payload_len,
                reason,
            } => Error::InvalidWindow {
                name: Some(entry.to_owned()),
                window,
                payload_len,
                reason,
            },
            other => other,
        }
    }
}

fn in_entry(name: &Option<String>) -> String {
    name.as_ref()
        .map(|name| format!(" of entry {name:?}"))
        .unwrap_or_default()
}
