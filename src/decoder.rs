//! Bundle decoder

use crate::archive::Archive;
use crate::checksum::{ContentHasher, Sha256Hasher};
use crate::error::{Error, FormatError, Result};
use crate::observer::{NoopObserver, ParseObserver, TracingObserver};
use crate::parser::{BundleParser, CommittedEntry, Input};
use crate::policy::CommitPolicy;
use crate::sink::{DirectorySink, EntrySink, MemorySink};
use std::io::BufRead;
use std::path::Path;
use tracing::info;

/// Decoding options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Refuse entries whose checksum is missing or wrong
    pub verify: bool,
    /// Evaluate checksums but never write to the destination
    pub trial_run: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            verify: true,
            trial_run: false,
        }
    }
}

/// What a decode run committed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Accepted entries, in archive order
    pub entries: Vec<CommittedEntry>,
    /// Header description, without the `Description: ` marker
    pub description: String,
    /// Whether destination writes were skipped
    pub trial_run: bool,
    /// Physical lines read
    pub lines: usize,
}

/// Decodes a bundle
pub struct Decoder {
    options: DecodeOptions,
    hasher: Option<Box<dyn ContentHasher>>,
}

impl Decoder {
    /// Create a new decoder: SHA-256 hasher, verification on
    pub fn new() -> Self {
        Self {
            options: DecodeOptions::default(),
            hasher: Some(Box::new(Sha256Hasher)),
        }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.options.verify = verify;
        self
    }

    pub fn with_trial_run(mut self, trial_run: bool) -> Self {
        self.options.trial_run = trial_run;
        self
    }

    /// Replace the hasher
    pub fn with_hasher(mut self, hasher: impl ContentHasher + 'static) -> Self {
        self.hasher = Some(Box::new(hasher));
        self
    }

    /// Drop the hasher. Decoding then only works with verification off.
    pub fn without_hasher(mut self) -> Self {
        self.hasher = None;
        self
    }

    /// Drive the parser over `reader`, committing into `sink`.
    ///
    /// The separator comes from the first line. The first error stops the
    /// run; entries committed before it stay committed.
    pub fn decode_with<R, S, O>(&self, reader: R, sink: S, observer: O) -> Result<Summary>
    where
        R: BufRead,
        S: EntrySink,
        O: ParseObserver,
    {
        self.run(reader, sink, observer, self.options)
            .map(|(summary, _)| summary)
    }

    fn run<R, S, O>(&self, reader: R, sink: S, observer: O, options: DecodeOptions) -> Result<(Summary, S)>
    where
        R: BufRead,
        S: EntrySink,
        O: ParseObserver,
    {
        let DecodeOptions { verify, trial_run } = options;
        let policy = CommitPolicy::new(self.hasher.as_deref(), verify);
        let mut parser = BundleParser::with_observer(policy, sink, observer).with_trial_run(trial_run);

        let mut done = false;
        for line in reader.lines() {
            let line = line?;
            done = parser.parse(Input::Line(&line))?;
            if done {
                break;
            }
        }
        if !done {
            done = parser.parse(Input::EndOfInput)?;
        }
        if !done {
            // Only a separator line, nothing after it
            return Err(Error::format(parser.line(), FormatError::UnexpectedEnd));
        }

        let description = parser.description();
        let lines = parser.line();
        let (sink, entries) = parser.into_parts();

        info!(entries = entries.len(), lines, trial_run, "bundle decoded");
        Ok((
            Summary {
                entries,
                description,
                trial_run,
                lines,
            },
            sink,
        ))
    }

    /// Extract a bundle into `root`
    pub fn decode_to_dir<R: BufRead>(&self, reader: R, root: &Path) -> Result<Summary> {
        info!(root = %root.display(), verify = self.options.verify, "extracting bundle");
        self.decode_with(reader, DirectorySink::new(root), TracingObserver)
    }

    /// Extract a bundle file into `root`
    pub fn decode_file(&self, path: &Path, root: &Path) -> Result<Summary> {
        let file = std::fs::File::open(path)?;
        self.decode_to_dir(std::io::BufReader::new(file), root)
    }

    /// Check every entry without writing anything. Verification is always
    /// on, whatever the options say.
    pub fn verify_only<R: BufRead>(&self, reader: R) -> Result<Summary> {
        let options = DecodeOptions {
            verify: true,
            trial_run: true,
        };
        self.run(reader, MemorySink::new(), TracingObserver, options)
            .map(|(summary, _)| summary)
    }

    /// Decode a bundle held in memory. Entries are always collected, the
    /// trial-run option only applies to real destinations.
    pub fn decode(&self, input: &str) -> Result<Archive> {
        let options = DecodeOptions {
            trial_run: false,
            ..self.options
        };
        let (summary, sink) = self.run(input.as_bytes(), MemorySink::new(), NoopObserver, options)?;
        let mut archive = sink.into_archive();
        archive.description = summary.description;
        Ok(archive)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
