//! # emx-bundle
//!
//! A plain-text bundle format that packs many text files into one stream.
//!
//! ## Format
//!
//! The first line of a bundle is the separator. Every later line equal to it
//! ends a section:
//!
//! ```text
//! ========= BOUNDARY ==========
//! Description: free text, ignored by the decoder
//! ========= BOUNDARY ==========
//! Filename: src/main.rs
//! Checksum: SHA256:536e506bb90914c243a12b397b9a998f85ae2cbd9ba02dfd03a9e155ca5ca0f4
//! fn main() {}
//! ========= BOUNDARY ==========
//! ```
//!
//! Text between a separator and the next `Filename: ` line is a comment.
//! The optional `Checksum: ` line must directly follow the filename; every
//! other line up to the next separator is content. End of input also ends
//! the final entry.
//!
//! ## Verification
//!
//! Whether an entry is written depends on four inputs: a hasher is
//! available, the entry carries a checksum, the checksum matches, and
//! verification is on. See [`policy`] for the table. With verification on,
//! an entry without a matching checksum is rejected and the run stops.
//!
//! ## Example
//!
//! ```
//! use emx_bundle::{Archive, Decoder, Encoder, Entry};
//!
//! let mut archive = Archive::new();
//! archive.add_entry(Entry::new("hello.txt", "Hello, world!\n"));
//!
//! let text = Encoder::default().encode(&archive).unwrap();
//! let decoded = Decoder::new().decode(&text).unwrap();
//! assert_eq!(decoded.entries[0].data, b"Hello, world!\n");
//! ```

pub mod archive;
pub mod checksum;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod observer;
pub mod parser;
pub mod policy;
pub mod sink;

pub use archive::{Archive, Entry, Separator, DEFAULT_SEPARATOR};
pub use checksum::{ContentHasher, Sha256Hasher};
pub use decoder::{DecodeOptions, Decoder, Summary};
pub use encoder::Encoder;
pub use error::{ChecksumError, Error, FormatError, Result};
pub use observer::{NoopObserver, ParseObserver, TracingObserver, Transition};
pub use parser::{Action, BundleParser, CommittedEntry, Input, State};
pub use policy::{CommitPolicy, Verification};
pub use sink::{DirectorySink, EntrySink, MemorySink};
