//! Reading and writing `SAV V1.0` save containers: a signature followed by named, zlib-compressed
//! resources.
//!
//! ```
//! use savkit_archive::{Container, Entry, RecordLayout};
//!
//! let mut container = Container::new();
//! container.push(Entry::from_payload("BALDUR.gam", b"GAMEV2.0")?);
//! let bytes = container.to_bytes()?;
//!
//! let container = Container::parse(&bytes)?;
//! let entry = container.find_by_name("BALDUR.gam").expect("entry was just written");
//! assert_eq!(entry.decompress()?, b"GAMEV2.0");
//! assert_eq!(RecordLayout::default(), RecordLayout::STORE_ITEMS);
//! # Ok::<(), savkit_archive::Error>(())
//! ```

pub mod compression;
pub mod container;
pub mod entry;
pub mod error;
pub mod records;

pub use container::Container;
pub use entry::Entry;
pub use error::{Error, Result};
pub use records::{RecordLayout, RecordWindow};
