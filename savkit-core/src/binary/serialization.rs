mod serializer;

pub use serializer::*;

use std::io::Write;

use crate::binary::Error;

pub trait Serialize {
    fn serialize(&self, serializer: &mut Serializer<impl Write>) -> Result<(), Error>;

    /// Exact number of bytes [`Serialize::serialize`] will write, if known up front.
    fn serialized_size_hint(&self) -> Option<usize> {
        None
    }
}

impl Serialize for u32 {
    fn serialize(&self, serializer: &mut Serializer<impl Write>) -> Result<(), Error> {
        serializer.write_bytes(&self.to_le_bytes())
    }

    fn serialized_size_hint(&self) -> Option<usize> {
        Some(4)
    }
}

pub fn serialize(value: &impl Serialize) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::with_capacity(value.serialized_size_hint().unwrap_or(0));
    value.serialize(&mut Serializer::new(&mut buffer))?;
    Ok(buffer)
}
