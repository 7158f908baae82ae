use std::{
    borrow::Cow,
    io::{Read, SeekFrom, Write},
};

use savkit_core::{
    binary::{self, Deserialize, Deserializer, ErrorKind, ResultContextExt, Serialize, Serializer},
    string::SavString,
};
use tracing::{debug, trace};

use crate::{
    compression,
    error::{Error, Result},
};

/// Size of the three `u32` fields surrounding every entry's name and data.
pub const ENTRY_HEADER_SIZE: usize = 12;

/// One named, compressed resource inside a container.
///
/// On disk:
///
/// ```text
/// name_field_len     u32
/// name               name_field_len bytes, NUL terminated
/// uncompressed_len   u32
/// compressed_len     u32
/// compressed_data    compressed_len bytes of zlib
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Entry {
    name: SavString,
    uncompressed_len: u32,
    compressed_data: Vec<u8>,
}

impl Entry {
    /// Parses the entry starting at `offset` in `buffer`, returning it along with the number of
    /// bytes it occupies.
    pub fn parse(buffer: &[u8], offset: usize) -> Result<(Self, usize)> {
        let mut deserializer = Deserializer::from_buffer(buffer);
        deserializer.seek(SeekFrom::Start(offset as u64))?;
        let entry = Self::deserialize(&mut deserializer)
            .map_err(|source| entry_error(source, offset))?;
        let consumed = deserializer.stream_position() as usize - offset;
        debug_assert_eq!(consumed, entry.serialized_size());
        Ok((entry, consumed))
    }

    /// Builds a new entry by compressing `payload`.
    pub fn from_payload(name: &str, payload: &[u8]) -> Result<Self> {
        if !name.is_ascii() {
            return Err(Error::InvalidName {
                name: name.to_owned(),
                source: None,
            });
        }
        let name = SavString::try_from(name).map_err(|source| Error::InvalidName {
            name: name.to_owned(),
            source: Some(source),
        })?;
        let mut entry = Self {
            name,
            uncompressed_len: 0,
            compressed_data: vec![],
        };
        entry.set_payload(payload)?;
        Ok(entry)
    }

    /// Resource name, without the NUL terminator.
    pub fn name(&self) -> Cow<'_, str> {
        self.name.to_str_lossy()
    }

    pub fn name_bytes(&self) -> &[u8] {
        self.name.to_bytes()
    }

    /// Length of the stored name field, terminator (and any padding) included.
    pub fn name_field_len(&self) -> u32 {
        self.name.field_len()
    }

    pub fn uncompressed_len(&self) -> u32 {
        self.uncompressed_len
    }

    pub fn compressed_len(&self) -> u32 {
        // Both construction paths bound the data to a u32 length.
        self.compressed_data.len() as u32
    }

    pub fn compressed_data(&self) -> &[u8] {
        &self.compressed_data
    }

    /// Number of bytes this entry occupies in a container.
    pub fn serialized_size(&self) -> usize {
        ENTRY_HEADER_SIZE + self.name_field_len() as usize + self.compressed_len() as usize
    }

    /// Resource name without its extension, eg. `THBAG05` for `THBAG05.sto`.
    pub fn resource_ref(&self) -> Cow<'_, str> {
        match self.name() {
            Cow::Borrowed(name) => Cow::Borrowed(strip_extension(name)),
            Cow::Owned(name) => Cow::Owned(strip_extension(&name).to_owned()),
        }
    }

    /// Upper-cased extension of the resource name, eg. `STO` for `THBAG05.sto`.
    pub fn extension(&self) -> String {
        let name = self.name();
        let extension = match name.rfind('.') {
            Some(dot) => &name[dot + 1..],
            None => &name[..],
        };
        extension.to_ascii_uppercase()
    }

    /// Inflates the payload, checking it against the declared uncompressed length.
    pub fn decompress(&self) -> Result<Vec<u8>> {
        let payload = compression::decompress(&self.compressed_data, self.uncompressed_len as usize)
            .map_err(|source| Error::Compression {
                name: self.name().into_owned(),
                source,
            })?;
        if payload.len() != self.uncompressed_len as usize {
            return Err(Error::SizeMismatch {
                name: self.name().into_owned(),
                expected: self.uncompressed_len,
                actual: payload.len(),
            });
        }
        Ok(payload)
    }

    /// Replaces the payload, recompressing it. The entry is left untouched if this fails.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<()> {
        let uncompressed_len = u32::try_from(payload.len()).map_err(|_| Error::TooLarge {
            what: "payload",
            len: payload.len(),
        })?;
        let compressed_data =
            compression::compress(payload).map_err(|source| Error::Compression {
                name: self.name().into_owned(),
                source,
            })?;
        if u32::try_from(compressed_data.len()).is_err() {
            return Err(Error::TooLarge {
                what: "compressed payload",
                len: compressed_data.len(),
            });
        }
        debug!(
            name = %self.name(),
            uncompressed_len,
            old_compressed_len = self.compressed_data.len(),
            new_compressed_len = compressed_data.len(),
            "Replaced entry payload"
        );
        self.uncompressed_len = uncompressed_len;
        self.compressed_data = compressed_data;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(binary::serialize(self)?)
    }
}

fn strip_extension(name: &str) -> &str {
    name.rfind('.').map(|dot| &name[..dot]).unwrap_or(name)
}

/// Short reads are reported as truncation of the entry at `offset`; anything else passes through.
pub(crate) fn entry_error(source: binary::Error, offset: usize) -> Error {
    match source.kind() {
        ErrorKind::UnexpectedEnd => Error::TruncatedEntry { offset, source },
        _ => Error::Binary(source),
    }
}

impl Deserialize for Entry {
    fn deserialize(deserializer: &mut Deserializer<impl Read>) -> Result<Self, binary::Error> {
        let name = deserializer
            .deserialize::<SavString>()
            .context("cannot read entry name")?;
        let uncompressed_len = deserializer
            .deserialize::<u32>()
            .with_context(|| format!("cannot read uncompressed length of entry {name}"))?;
        let compressed_len = deserializer
            .deserialize::<u32>()
            .with_context(|| format!("cannot read compressed length of entry {name}"))?;
        let compressed_data = deserializer
            .read_vec(compressed_len as usize)
            .with_context(|| format!("cannot read compressed data of entry {name}"))?;
        trace!(%name, uncompressed_len, compressed_len, "Read entry");
        Ok(Self {
            name,
            uncompressed_len,
            compressed_data,
        })
    }
}

impl Serialize for Entry {
    fn serialize(&self, serializer: &mut Serializer<impl Write>) -> Result<(), binary::Error> {
        self.name
            .serialize(serializer)
            .with_context(|| format!("cannot write name of entry {}", self.name))?;
        self.uncompressed_len.serialize(serializer)?;
        self.compressed_len().serialize(serializer)?;
        serializer
            .write_bytes(&self.compressed_data)
            .with_context(|| format!("cannot write compressed data of entry {}", self.name))
    }

    fn serialized_size_hint(&self) -> Option<usize> {
        Some(self.serialized_size())
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("uncompressed_len", &self.uncompressed_len)
            .field("compressed_len", &self.compressed_len())
            .finish()
    }
}

/// Reads one entry from a standalone buffer holding exactly that entry.
impl TryFrom<&[u8]> for Entry {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let (entry, consumed) = Self::parse(bytes, 0)?;
        if consumed != bytes.len() {
            return Err(Error::TrailingBytes {
                offset: consumed,
                trailing: bytes.len() - consumed,
            });
        }
        Ok(entry)
    }
}
