use std::{
    borrow::Cow,
    ffi::CString,
    fmt::{Debug, Display},
    io::{Read, Write},
    ops::Deref,
};

use thiserror::Error;

use crate::binary::{
    Deserialize, Deserializer, Error, ResultContextExt, Serialize, Serializer,
};

/// A string stored as a `u32` byte count followed by that many bytes, conventionally ending with a
/// NUL terminator.
///
/// The stored bytes are kept verbatim, terminator and any padding included, so serializing a
/// deserialized string reproduces the original field exactly.
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct SavString {
    bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SavStringError {
    #[error("string contains an interior NUL byte at position {0}")]
    InteriorNul(usize),
    #[error("string of {0} bytes does not fit in a u32 length field")]
    TooLong(usize),
}

impl SavString {
    /// Returns the string's byte representation up to (not including) the first NUL.
    pub fn to_bytes(&self) -> &[u8] {
        let end = self
            .bytes
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(self.bytes.len());
        &self.bytes[..end]
    }

    /// Returns the stored bytes, NUL terminator included.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the stored field, which is what gets written as the length prefix.
    pub fn field_len(&self) -> u32 {
        // Construction guarantees the length fits.
        self.bytes.len() as u32
    }

    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.to_bytes())
    }
}

impl Debug for SavString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Ok(utf8) = std::str::from_utf8(&self.bytes) {
            if let Some(nul_terminated) = utf8.strip_suffix('\0') {
                Debug::fmt(nul_terminated, f)?;
                f.write_str(" <NUL>")
            } else {
                Debug::fmt(utf8, f)
            }
        } else {
            f.write_str("<invalid UTF-8> ")?;
            Debug::fmt(&self.bytes, f)
        }
    }
}

impl Display for SavString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.to_str_lossy(), f)
    }
}

impl Deref for SavString {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl TryFrom<CString> for SavString {
    type Error = SavStringError;

    fn try_from(value: CString) -> Result<Self, Self::Error> {
        let bytes = value.into_bytes_with_nul();
        if u32::try_from(bytes.len()).is_err() {
            return Err(SavStringError::TooLong(bytes.len()));
        }
        Ok(Self { bytes })
    }
}

impl TryFrom<&str> for SavString {
    type Error = SavStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let cstring = CString::new(value)
            .map_err(|error| SavStringError::InteriorNul(error.nul_position()))?;
        Self::try_from(cstring)
    }
}

impl TryFrom<String> for SavString {
    type Error = SavStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl Deserialize for SavString {
    fn deserialize(deserializer: &mut Deserializer<impl Read>) -> Result<Self, Error> {
        let length = deserializer
            .deserialize::<u32>()
            .context("cannot read string length")?;
        let bytes = deserializer
            .read_vec(length as usize)
            .with_context(|| format!("cannot read string of length {length}"))?;
        Ok(Self { bytes })
    }
}

impl Serialize for SavString {
    fn serialize(&self, serializer: &mut Serializer<impl Write>) -> Result<(), Error> {
        self.field_len()
            .serialize(serializer)
            .context("cannot serialize string length")?;
        serializer.write_bytes(&self.bytes)
    }

    fn serialized_size_hint(&self) -> Option<usize> {
        Some(4 + self.bytes.len())
    }
}
