use std::{
    io::{Cursor, Read, Seek, SeekFrom},
    ops::Deref,
};

use crate::binary::{Error, ErrorKind, ResultContextExt, ResultMapToBinaryErrorExt};

#[derive(Debug, Clone, Copy)]
pub struct Deserializer<R> {
    stream_len: u64,
    stream_position: u64,
    stream: R,
}

impl<R> Deserializer<R> {
    pub fn stream_position(&self) -> u64 {
        self.stream_position
    }

    /// Number of bytes left between the current position and the end of the stream.
    pub fn remaining(&self) -> u64 {
        self.stream_len.saturating_sub(self.stream_position)
    }

    /// Fails with [`ErrorKind::UnexpectedEnd`] unless at least `len` more bytes can be read.
    pub fn ensure_remaining(&self, len: u64) -> Result<(), Error> {
        if self.remaining() < len {
            Err(ErrorKind::UnexpectedEnd.make(format!(
                "at stream position {:08x}: {len} bytes needed but only {} remain",
                self.stream_position,
                self.remaining()
            )))
        } else {
            Ok(())
        }
    }

    pub fn read_bytes(&mut self, out_bytes: &mut [u8]) -> Result<(), Error>
    where
        R: Read,
    {
        self.ensure_remaining(out_bytes.len() as u64)?;
        self.stream
            .read_exact(out_bytes)
            .map_err_to_binary_error(ErrorKind::Deserialize)
            .with_context(|| format!("at stream position {:08x}", self.stream_position))?;
        self.stream_position += out_bytes.len() as u64;
        Ok(())
    }

    /// Reads exactly `len` bytes into a fresh buffer. The length is checked against the remaining
    /// stream before anything is allocated.
    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, Error>
    where
        R: Read,
    {
        self.ensure_remaining(len as u64)?;
        let mut bytes = vec![0; len];
        self.read_bytes(&mut bytes)?;
        Ok(bytes)
    }

    pub fn seek(&mut self, whence: SeekFrom) -> Result<u64, Error>
    where
        R: Seek,
    {
        self.stream_position = self
            .stream
            .seek(whence)
            .map_err_to_binary_error(ErrorKind::Deserialize)?;
        Ok(self.stream_position)
    }
}

impl<T> Deserializer<Cursor<T>>
where
    T: Deref<Target = [u8]>,
{
    pub fn from_buffer(buffer: T) -> Self {
        Self::from(Cursor::new(buffer))
    }
}

impl<T> From<Cursor<T>> for Deserializer<Cursor<T>>
where
    T: Deref<Target = [u8]>,
{
    fn from(cursor: Cursor<T>) -> Self {
        Self {
            stream_len: cursor.get_ref().len() as u64,
            stream_position: cursor.position(),
            stream: cursor,
        }
    }
}
