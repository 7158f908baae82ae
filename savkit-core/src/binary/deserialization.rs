mod deserializer;

pub use deserializer::*;

use std::io::Read;

use crate::binary::Error;

pub trait Deserialize: Sized {
    fn deserialize(deserializer: &mut Deserializer<impl Read>) -> Result<Self, Error>;
}

impl Deserialize for u32 {
    fn deserialize(deserializer: &mut Deserializer<impl Read>) -> Result<Self, Error> {
        let mut buf = [0; 4];
        deserializer.read_bytes(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl<R> Deserializer<R> {
    pub fn deserialize<T>(&mut self) -> Result<T, Error>
    where
        R: Read,
        T: Deserialize,
    {
        T::deserialize(self)
    }
}

pub fn deserialize<T>(buffer: &[u8]) -> Result<T, Error>
where
    T: Deserialize,
{
    T::deserialize(&mut Deserializer::from_buffer(buffer))
}
