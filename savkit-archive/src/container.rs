use std::io::{SeekFrom, Write};

use savkit_core::binary::{self, Deserialize, Deserializer, ResultContextExt, Serialize, Serializer};
use tracing::debug;

use crate::{
    entry::{entry_error, Entry},
    error::{Error, Result},
    records::RecordLayout,
};

/// Signature every container starts with.
pub const MAGIC: [u8; 8] = *b"SAV V1.0";

/// Smallest tail that can begin an entry: its name length field.
const MIN_ENTRY_PREFIX: usize = 4;

/// A save container: the signature followed by entries, back to back, until the end of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    entries: Vec<Entry>,
}

impl Container {
    /// An empty container with the standard signature.
    pub fn new() -> Self {
        Self { entries: vec![] }
    }

    /// Parses a whole container held in memory.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        match buffer.get(..MAGIC.len()) {
            Some(magic) if magic == MAGIC => (),
            found => {
                return Err(Error::InvalidMagic {
                    found: found.unwrap_or(buffer).to_vec(),
                })
            }
        }
        debug!(len = buffer.len(), "Parsing container");

        let mut deserializer = Deserializer::from_buffer(buffer);
        deserializer.seek(SeekFrom::Start(MAGIC.len() as u64))?;
        let mut entries = vec![];
        while deserializer.remaining() > 0 {
            let offset = deserializer.stream_position() as usize;
            let remaining = deserializer.remaining() as usize;
            if remaining < MIN_ENTRY_PREFIX {
                return Err(Error::TrailingBytes {
                    offset,
                    trailing: remaining,
                });
            }
            let entry = Entry::deserialize(&mut deserializer)
                .with_context(|| format!("cannot read entry {}", entries.len()))
                .map_err(|source| entry_error(source, offset))?;
            debug!(
                index = entries.len(),
                offset,
                name = %entry.name(),
                uncompressed_len = entry.uncompressed_len(),
                compressed_len = entry.compressed_len(),
                "Parsed entry"
            );
            entries.push(entry);
        }

        debug_assert_eq!(deserializer.stream_position() as usize, buffer.len());
        debug!(entries = entries.len(), "Parsed container");

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry after the existing ones.
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Index of the first entry called `name`. Later entries with the same name are shadowed.
    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.name_bytes() == name.as_bytes())
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Entry> {
        self.position_by_name(name).map(|index| &self.entries[index])
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut Entry> {
        let index = self.position_by_name(name)?;
        Some(&mut self.entries[index])
    }

    /// Offset of each entry within the serialized container.
    pub fn entry_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().scan(MAGIC.len(), |offset, entry| {
            let current = *offset;
            *offset += entry.serialized_size();
            Some(current)
        })
    }

    /// Size of the serialized container in bytes.
    pub fn serialized_size(&self) -> usize {
        MAGIC.len()
            + self
                .entries
                .iter()
                .map(Entry::serialized_size)
                .sum::<usize>()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = binary::serialize(self)?;
        debug_assert_eq!(bytes.len(), self.serialized_size());
        Ok(bytes)
    }

    /// Sorts the records of the first entry called `name`. Other entries are never touched, and
    /// the target entry is left as it was if sorting fails.
    pub fn sort_records(&mut self, name: &str, layout: &RecordLayout) -> Result<()> {
        let entry = self
            .find_by_name_mut(name)
            .ok_or_else(|| Error::EntryNotFound {
                name: name.to_owned(),
            })?;
        debug!(name, ?layout, "Sorting entry records");
        entry.sort_records(layout)
    }

    /// Decompresses every entry, failing on the first one that is corrupt.
    pub fn verify(&self) -> Result<()> {
        for (index, entry) in self.entries.iter().enumerate() {
            let payload = entry.decompress()?;
            debug!(index, name = %entry.name(), len = payload.len(), "Entry decompresses cleanly");
        }
        Ok(())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for Container {
    fn serialize(&self, serializer: &mut Serializer<impl Write>) -> Result<(), binary::Error> {
        serializer.write_bytes(&MAGIC)?;
        for (i, entry) in self.entries.iter().enumerate() {
            entry
                .serialize(serializer)
                .with_context(|| format!("cannot write entry {i}"))?;
        }
        Ok(())
    }

    fn serialized_size_hint(&self) -> Option<usize> {
        Some(self.serialized_size())
    }
}

#[cfg(test)]
mod tests {
    use crate::{entry::Entry, error::Error};

    use super::{Container, MAGIC};

    fn sample() -> Container {
        let mut container = Container::new();
        container.push(Entry::from_payload("BALDUR.gam", &[1; 300]).unwrap());
        container.push(Entry::from_payload("THBAG05.sto", b"STORV1.0 bag").unwrap());
        container.push(Entry::from_payload("AR0602.are", &[]).unwrap());
        container
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let bytes = sample().to_bytes().unwrap();
        let container = Container::parse(&bytes).unwrap();
        assert_eq!(container, sample());
        assert_eq!(container.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn entry_offsets_follow_the_size_law() {
        let container = sample();
        let bytes = container.to_bytes().unwrap();
        let offsets: Vec<_> = container.entry_offsets().collect();
        assert_eq!(offsets[0], 8);
        for (entry, offset) in container.entries().iter().zip(&offsets) {
            let (parsed, consumed) = Entry::parse(&bytes, *offset).unwrap();
            assert_eq!(&parsed, entry);
            assert_eq!(
                consumed,
                12 + entry.name_field_len() as usize + entry.compressed_len() as usize
            );
        }
        assert_eq!(container.serialized_size(), bytes.len());
    }

    #[test]
    fn empty_container_is_just_the_signature() {
        let container = Container::parse(b"SAV V1.0").unwrap();
        assert!(container.is_empty());
        assert_eq!(container.to_bytes().unwrap(), MAGIC);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[..8].copy_from_slice(b"BAD SIG!");
        assert!(matches!(
            Container::parse(&bytes),
            Err(Error::InvalidMagic { found }) if found == b"BAD SIG!"
        ));
        assert!(matches!(
            Container::parse(b"SAV"),
            Err(Error::InvalidMagic { .. })
        ));
    }

    #[test]
    fn truncated_entry_is_rejected() {
        let bytes = sample().to_bytes().unwrap();
        let second = sample().entry_offsets().nth(1).unwrap();
        assert!(matches!(
            Container::parse(&bytes[..second + 20]),
            Err(Error::TruncatedEntry { offset, .. }) if offset == second
        ));
        assert!(matches!(
            Container::parse(&bytes[..bytes.len() - 1]),
            Err(Error::TruncatedEntry { .. })
        ));
    }

    #[test]
    fn stray_tail_bytes_are_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        let end = bytes.len();
        bytes.extend_from_slice(&[0, 0, 0]);
        assert!(matches!(
            Container::parse(&bytes),
            Err(Error::TrailingBytes { offset, trailing: 3 }) if offset == end
        ));
    }

    #[test]
    fn first_match_wins() {
        let mut container = sample();
        container.push(Entry::from_payload("THBAG05.sto", b"shadowed").unwrap());
        let entry = container.find_by_name("THBAG05.sto").unwrap();
        assert_eq!(entry.decompress().unwrap(), b"STORV1.0 bag");
        assert_eq!(container.position_by_name("THBAG05.sto"), Some(1));
        assert!(container.find_by_name("THBAG05").is_none());
    }

    #[test]
    fn missing_entry_cannot_be_sorted() {
        let mut container = sample();
        assert!(matches!(
            container.sort_records("NOPE.sto", &Default::default()),
            Err(Error::EntryNotFound { name }) if name == "NOPE.sto"
        ));
    }

    #[test]
    fn failed_sort_leaves_every_entry_alone() {
        let mut container = sample();
        let before = container.clone();
        // 12 bytes cannot hold the store header and trailer.
        assert!(matches!(
            container.sort_records("THBAG05.sto", &Default::default()),
            Err(Error::InvalidWindow { name: Some(name), .. }) if name == "THBAG05.sto"
        ));
        assert_eq!(container, before);
    }

    #[test]
    fn verify_reports_corrupt_entries() {
        let mut bytes = sample().to_bytes().unwrap();
        assert!(Container::parse(&bytes).unwrap().verify().is_ok());
        // Flip a byte in the zlib header of the first entry.
        let data_start = 8 + 12 + "BALDUR.gam".len() + 1;
        bytes[data_start] ^= 0xff;
        let container = Container::parse(&bytes).unwrap();
        assert!(matches!(
            container.verify(),
            Err(Error::Compression { name, .. }) if name == "BALDUR.gam"
        ));
    }

    #[test]
    fn short_tail_after_the_last_entry_is_trailing_not_truncated() {
        let mut container = Container::new();
        container.push(Entry::from_payload("A.sto", b"x").unwrap());
        let mut bytes = container.to_bytes().unwrap();
        let end = bytes.len();
        bytes.extend_from_slice(&[0, 0]);
        assert!(matches!(
            Container::parse(&bytes),
            Err(Error::TrailingBytes { offset, trailing: 2 }) if offset == end
        ));

        // Four bytes are enough to start an entry, so they are read as a truncated one instead.
        bytes.extend_from_slice(&[0, 0]);
        assert!(matches!(
            Container::parse(&bytes),
            Err(Error::TruncatedEntry { offset, .. }) if offset == end
        ));
    }
}
