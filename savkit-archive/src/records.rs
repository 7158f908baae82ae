//! Reordering of fixed-size records inside a decompressed payload.
//!
//! Resources such as stores and containers keep their items as a run of fixed-size records between
//! a fixed header and a fixed trailer. [`sort_records`] stable-sorts such a run by each record's
//! leading bytes and leaves everything else in the payload alone.

use std::fmt;

use tracing::debug;

use crate::{
    entry::Entry,
    error::{Error, Result},
};

/// Number of leading bytes of a record compared when sorting.
pub const SORT_KEY_LEN: usize = 8;

/// Where the records live within a payload, relative to its start and end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// Bytes before the first record.
    pub header_len: usize,
    /// Bytes after the last record.
    pub trailer_len: usize,
    pub record_size: usize,
}

impl RecordLayout {
    /// Item records of a store resource (`.sto`), which includes bags.
    pub const STORE_ITEMS: Self = Self {
        header_len: 156,
        trailer_len: 148,
        record_size: 28,
    };

    /// Resolves the layout to absolute offsets for a payload of `payload_len` bytes.
    pub fn window(&self, payload_len: usize) -> Result<RecordWindow> {
        match payload_len.checked_sub(self.trailer_len) {
            Some(end) => Ok(RecordWindow::new(self.header_len, end, self.record_size)),
            None => Err(Error::InvalidWindow {
                name: None,
                window: RecordWindow::new(self.header_len, payload_len, self.record_size),
                payload_len,
                reason: "trailer is longer than the payload",
            }),
        }
    }
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self::STORE_ITEMS
    }
}

/// Absolute byte range `[start, end)` of a payload, split into `record_size`-byte records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordWindow {
    pub start: usize,
    pub end: usize,
    pub record_size: usize,
}

impl RecordWindow {
    pub fn new(start: usize, end: usize, record_size: usize) -> Self {
        Self {
            start,
            end,
            record_size,
        }
    }

    /// Checks the window against a payload, returning the number of records it holds.
    pub fn validate(&self, payload_len: usize) -> Result<usize> {
        let invalid = |reason| Error::InvalidWindow {
            name: None,
            window: *self,
            payload_len,
            reason,
        };
        if self.record_size == 0 {
            return Err(invalid("record size is zero"));
        }
        if self.start > payload_len || self.end > payload_len {
            return Err(invalid("window extends past the end of the payload"));
        }
        if self.end < self.start {
            return Err(invalid("window ends before it starts"));
        }
        let len = self.end - self.start;
        if len % self.record_size != 0 {
            return Err(invalid("window length is not a multiple of the record size"));
        }
        Ok(len / self.record_size)
    }
}

impl fmt::Display for RecordWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}) of {}-byte records",
            self.start, self.end, self.record_size
        )
    }
}

/// Key a record is ordered by.
pub fn sort_key(record: &[u8]) -> &[u8] {
    &record[..record.len().min(SORT_KEY_LEN)]
}

/// Returns a copy of `payload` with the records in `window` stable-sorted by [`sort_key`].
///
/// Records with equal keys keep their relative order, and every byte outside the window is copied
/// through unchanged.
pub fn sort_records(payload: &[u8], window: &RecordWindow) -> Result<Vec<u8>> {
    let count = window.validate(payload.len())?;
    debug!(%window, count, payload_len = payload.len(), "Validated record window");

    let region = &payload[window.start..window.end];
    let mut records: Vec<&[u8]> = region.chunks_exact(window.record_size).collect();
    // `sort_by` is stable.
    records.sort_by(|a, b| sort_key(a).cmp(sort_key(b)));

    let mut sorted = payload.to_vec();
    for (slot, record) in sorted[window.start..window.end]
        .chunks_exact_mut(window.record_size)
        .zip(&records)
    {
        slot.copy_from_slice(record);
    }

    let moved = region
        .chunks_exact(window.record_size)
        .zip(&records)
        .filter(|(before, after)| before != *after)
        .count();
    debug!(count, moved, "Sorted records");
    Ok(sorted)
}

impl Entry {
    /// Sorts the records of this entry's payload according to `layout` and recompresses it.
    ///
    /// On error the entry keeps its previous contents.
    pub fn sort_records(&mut self, layout: &RecordLayout) -> Result<()> {
        let payload = self.decompress()?;
        let sorted = layout
            .window(payload.len())
            .and_then(|window| sort_records(&payload, &window))
            .map_err(|error| error.for_entry(&self.name()))?;
        self.set_payload(&sorted)
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    use crate::error::Error;

    use super::{sort_key, sort_records, RecordLayout, RecordWindow};

    /// A record whose key starts with `key` and whose tail is tagged with `tag`.
    fn record(key: u8, tag: u8) -> Vec<u8> {
        let mut record = vec![0; 28];
        record[0] = key;
        record[8..].fill(tag);
        record
    }

    fn keys_and_tags(payload: &[u8], window: &RecordWindow) -> Vec<(u8, u8)> {
        payload[window.start..window.end]
            .chunks_exact(window.record_size)
            .map(|record| (record[0], record[8]))
            .collect()
    }

    #[test]
    fn sorts_by_key_and_keeps_ties_in_order() {
        let window = RecordWindow::new(4, 4 + 5 * 28, 28);
        let mut payload = vec![0xee; 4];
        for (key, tag) in [(b'C', 1), (b'A', 2), (b'B', 3), (b'A', 4), (b'C', 5)] {
            payload.extend(record(key, tag));
        }
        payload.extend_from_slice(&[0xdd; 3]);

        let sorted = sort_records(&payload, &window).unwrap();
        assert_eq!(
            keys_and_tags(&sorted, &window),
            [(b'A', 2), (b'A', 4), (b'B', 3), (b'C', 1), (b'C', 5)]
        );
        assert_eq!(sorted[..4], payload[..4]);
        assert_eq!(sorted[window.end..], payload[window.end..]);
    }

    #[test]
    fn keys_compare_as_unsigned_bytes() {
        let mut high = vec![0; 8];
        high[0] = 0x80;
        let mut low = vec![0; 8];
        low[7] = 0xff;
        let payload = [high.clone(), low.clone()].concat();
        let sorted = sort_records(&payload, &RecordWindow::new(0, 16, 8)).unwrap();
        assert_eq!(sorted, [low, high].concat());
    }

    #[test]
    fn only_the_first_eight_bytes_matter() {
        let mut first = record(b'A', 9);
        let second = record(b'A', 1);
        first[27] = 0xff;
        let payload = [first.clone(), second.clone()].concat();
        let sorted = sort_records(&payload, &RecordWindow::new(0, 56, 28)).unwrap();
        assert_eq!(sorted, payload);
        assert_eq!(sort_key(&first), sort_key(&second));
    }

    #[test]
    fn windows_that_do_not_divide_evenly_are_rejected() {
        let payload = vec![0; 200];
        assert!(matches!(
            sort_records(&payload, &RecordWindow::new(10, 40, 28)),
            Err(Error::InvalidWindow { name: None, payload_len: 200, .. })
        ));
    }

    #[test]
    fn windows_outside_the_payload_are_rejected() {
        let payload = vec![0; 100];
        for window in [
            RecordWindow::new(0, 112, 28),
            RecordWindow::new(128, 156, 28),
            RecordWindow::new(56, 28, 28),
            RecordWindow::new(0, 0, 0),
        ] {
            assert!(
                matches!(
                    sort_records(&payload, &window),
                    Err(Error::InvalidWindow { .. })
                ),
                "{window} should be rejected"
            );
        }
    }

    #[test]
    fn empty_window_is_a_no_op() {
        let payload: Vec<u8> = (0..50).collect();
        let sorted = sort_records(&payload, &RecordWindow::new(20, 20, 28)).unwrap();
        assert_eq!(sorted, payload);
    }

    #[test]
    fn store_layout_resolves_relative_to_the_end() {
        let window = RecordLayout::STORE_ITEMS.window(500).unwrap();
        assert_eq!(window, RecordWindow::new(156, 352, 28));
        assert_eq!(window.validate(500).unwrap(), 7);
        assert!(matches!(
            RecordLayout::STORE_ITEMS.window(100),
            Err(Error::InvalidWindow { .. })
        ));
        // A trailer that fits but overlaps the header still yields a bad window.
        let window = RecordLayout::STORE_ITEMS.window(200).unwrap();
        assert!(window.validate(200).is_err());
    }

    fn payload_with_records(keys: &[u8], header: usize, trailer: usize) -> (Vec<u8>, RecordWindow) {
        let mut payload = vec![0x11; header];
        for (i, &key) in keys.iter().enumerate() {
            payload.extend(record(key % 4, i as u8));
        }
        let end = payload.len();
        payload.extend(std::iter::repeat(0x22).take(trailer));
        (payload, RecordWindow::new(header, end, 28))
    }

    #[quickcheck]
    fn sorting_is_idempotent(keys: Vec<u8>, header: u8, trailer: u8) -> bool {
        let (payload, window) = payload_with_records(&keys, header as usize, trailer as usize);
        let once = sort_records(&payload, &window).unwrap();
        let twice = sort_records(&once, &window).unwrap();
        once == twice
    }

    #[quickcheck]
    fn sorting_leaves_the_outside_alone(keys: Vec<u8>, header: u8, trailer: u8) -> bool {
        let (payload, window) = payload_with_records(&keys, header as usize, trailer as usize);
        let sorted = sort_records(&payload, &window).unwrap();
        sorted.len() == payload.len()
            && sorted[..window.start] == payload[..window.start]
            && sorted[window.end..] == payload[window.end..]
    }

    #[quickcheck]
    fn sorting_is_stable(keys: Vec<u8>) -> TestResult {
        if keys.len() > 255 {
            return TestResult::discard();
        }
        let (payload, window) = payload_with_records(&keys, 0, 0);
        let sorted = sort_records(&payload, &window).unwrap();
        let pairs = keys_and_tags(&sorted, &window);
        // Tags are the original indices, so ties must appear with increasing tags.
        TestResult::from_bool(pairs.windows(2).all(|pair| pair[0] <= pair[1]))
    }
}
