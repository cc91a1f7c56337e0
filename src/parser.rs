//! Streaming bundle parser
//!
//! [`BundleParser`] is a line-driven state machine. The caller feeds one
//! [`Input::Line`] per physical line of the archive, then a final
//! [`Input::EndOfInput`] to flush the last entry:
//!
//! ```text
//! ReadSeparator -> ExpectFilenameOrComment -+-> ExpectChecksumOrContent -> InContent -+
//!                                           |                                         |
//!                                           +-> InComment <-> ExpectFilename <--------+
//! ```
//!
//! Each input is classified once (separator? filename? checksum? end?), then
//! a pure transition function picks the action and the next state. Every state has a
//! default row, so there is always exactly one transition.

use crate::archive::{is_safe_relative_path, Separator, CHECKSUM_PREFIX, DESCRIPTION_PREFIX, FILENAME_PREFIX};
use crate::checksum::parse_checksum_value;
use crate::error::{Error, FormatError, Result};
use crate::observer::{ParseObserver, TracingObserver, Transition};
use crate::policy::{CommitPolicy, Verification};
use crate::sink::EntrySink;
use tracing::warn;

/// Parser states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for the first line, which defines the separator
    ReadSeparator,
    /// Right after the leading separator: either an entry or a header comment
    ExpectFilenameOrComment,
    /// Skipping free text until the next separator
    InComment,
    /// A filename was read; a checksum line may follow
    ExpectChecksumOrContent,
    /// Accumulating content lines
    InContent,
    /// After a separator that closed an entry or a comment
    ExpectFilename,
    /// Terminal
    Done,
}

/// What the machine does on a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RememberSeparator,
    RememberFilename,
    RememberChecksum,
    RememberContentLine,
    CommitEntry,
    Skip,
    Finish,
    /// Input arriving after [`State::Done`]
    Ignore,
    ErrorEmptyStream,
    ErrorMissingFilename,
    ErrorUnexpectedEnd,
}

/// One token of parser input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    /// A physical line, without its line terminator
    Line(&'a str),
    /// No more lines will follow
    EndOfInput,
}

impl<'a> Input<'a> {
    pub fn as_line(&self) -> Option<&'a str> {
        match *self {
            Input::Line(line) => Some(line),
            Input::EndOfInput => None,
        }
    }
}

/// Guards evaluated once per input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Classification {
    pub end_of_input: bool,
    pub separator: bool,
    pub filename: bool,
    pub checksum: bool,
}

pub(crate) fn classify(input: Input<'_>, separator: Option<&Separator>) -> Classification {
    match input {
        Input::EndOfInput => Classification {
            end_of_input: true,
            ..Default::default()
        },
        Input::Line(line) => Classification {
            end_of_input: false,
            separator: separator.map_or(false, |sep| sep.matches(line)),
            filename: line.starts_with(FILENAME_PREFIX),
            checksum: line.starts_with(CHECKSUM_PREFIX),
        },
    }
}

/// The transition table. Guards are checked in priority order within each
/// state; the first match wins.
pub(crate) fn transition(state: State, c: Classification) -> (Action, State) {
    use Action as A;
    use State as S;

    match state {
        S::ReadSeparator => {
            if c.end_of_input {
                (A::ErrorEmptyStream, S::Done)
            } else {
                (A::RememberSeparator, S::ExpectFilenameOrComment)
            }
        }
        S::ExpectFilenameOrComment => {
            if c.filename {
                (A::RememberFilename, S::ExpectChecksumOrContent)
            } else if c.checksum {
                (A::ErrorMissingFilename, S::Done)
            } else {
                (A::Skip, S::InComment)
            }
        }
        S::InComment => {
            if c.separator {
                (A::Skip, S::ExpectFilename)
            } else if c.end_of_input {
                (A::Finish, S::Done)
            } else {
                (A::Skip, S::InComment)
            }
        }
        S::ExpectChecksumOrContent => {
            if c.checksum {
                (A::RememberChecksum, S::InContent)
            } else if c.separator {
                (A::CommitEntry, S::ExpectFilename)
            } else if c.end_of_input {
                (A::ErrorUnexpectedEnd, S::Done)
            } else {
                (A::RememberContentLine, S::InContent)
            }
        }
        S::InContent => {
            if c.separator {
                (A::CommitEntry, S::ExpectFilename)
            } else if c.end_of_input {
                (A::CommitEntry, S::Done)
            } else {
                (A::RememberContentLine, S::InContent)
            }
        }
        S::ExpectFilename => {
            if c.filename {
                (A::RememberFilename, S::ExpectChecksumOrContent)
            } else if c.end_of_input {
                (A::Finish, S::Done)
            } else {
                (A::Skip, S::InComment)
            }
        }
        S::Done => (A::Ignore, S::Done),
    }
}

/// An entry that passed the commit policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEntry {
    pub name: String,
    /// Content length in bytes
    pub size: usize,
    pub verification: Verification,
}

/// Parse session for one archive.
///
/// Not reusable: once [`State::Done`] is reached, further input is ignored.
/// After a checksum rejection the pending filename, checksum and content are
/// left in place for inspection.
pub struct BundleParser<'h, S, O = TracingObserver> {
    state: State,
    line: usize,
    separator: Option<Separator>,
    filename: String,
    checksum: Option<String>,
    content: String,
    header: Vec<String>,
    seen_filename: bool,
    policy: CommitPolicy<'h>,
    trial_run: bool,
    sink: S,
    observer: O,
    committed: Vec<CommittedEntry>,
}

impl<'h, S: EntrySink> BundleParser<'h, S, TracingObserver> {
    /// Create a parser committing into `sink`
    pub fn new(policy: CommitPolicy<'h>, sink: S) -> Self {
        Self::with_observer(policy, sink, TracingObserver)
    }
}

impl<'h, S: EntrySink, O: ParseObserver> BundleParser<'h, S, O> {
    /// Create a parser with a custom observer
    pub fn with_observer(policy: CommitPolicy<'h>, sink: S, observer: O) -> Self {
        Self {
            state: State::ReadSeparator,
            line: 0,
            separator: None,
            filename: String::new(),
            checksum: None,
            content: String::new(),
            header: Vec::new(),
            seen_filename: false,
            policy,
            trial_run: false,
            sink,
            observer,
            committed: Vec::new(),
        }
    }

    /// Evaluate checksums without writing to the sink
    pub fn with_trial_run(mut self, trial_run: bool) -> Self {
        self.trial_run = trial_run;
        self
    }

    /// Feed one input. Returns whether the machine has reached
    /// [`State::Done`].
    ///
    /// The first error moves the parser to [`State::Done`] and is returned;
    /// nothing is retried.
    pub fn parse(&mut self, input: Input<'_>) -> Result<bool> {
        if input.as_line().is_some() {
            self.line += 1;
        }

        let from = self.state;
        let class = classify(input, self.separator.as_ref());
        let (action, to) = transition(from, class);

        self.observer.on_transition(&Transition {
            line: self.line,
            input: input.as_line(),
            from,
            action,
            to,
        });

        match self.apply(action, input, class) {
            Ok(()) => {
                self.state = to;
                Ok(self.state == State::Done)
            }
            Err(err) => {
                self.state = State::Done;
                self.observer.on_error(self.line, &err);
                Err(err)
            }
        }
    }

    fn apply(&mut self, action: Action, input: Input<'_>, class: Classification) -> Result<()> {
        use Action as A;

        match (action, input) {
            (A::RememberSeparator, Input::Line(line)) => {
                let separator = Separator::detect(line)
                    .map_err(|_| Error::format(self.line, FormatError::InvalidSeparator))?;
                self.separator = Some(separator);
            }
            (A::RememberFilename, Input::Line(line)) => {
                self.filename = line[FILENAME_PREFIX.len()..].trim().to_string();
                self.seen_filename = true;
            }
            (A::RememberChecksum, Input::Line(line)) => {
                let checksum = parse_checksum_value(&line[CHECKSUM_PREFIX.len()..])
                    .map_err(|kind| Error::format(self.line, kind))?;
                if checksum.is_none() {
                    warn!(line = self.line, filename = %self.filename, "empty checksum, treating as absent");
                }
                self.checksum = checksum;
            }
            (A::RememberContentLine, Input::Line(line)) => {
                self.content.push_str(line);
                self.content.push('\n');
            }
            (A::Skip, Input::Line(line)) => {
                // Header text is everything before the first entry, minus separators
                if !self.seen_filename && !class.separator {
                    self.header.push(line.to_string());
                }
            }
            (A::CommitEntry, _) => self.commit()?,
            (A::Skip | A::Finish | A::Ignore, _) => {}
            (A::ErrorEmptyStream, _) => return Err(Error::format(self.line, FormatError::EmptyStream)),
            (A::ErrorMissingFilename, _) => {
                return Err(Error::format(self.line, FormatError::MissingFilename))
            }
            (A::ErrorUnexpectedEnd, _) => return Err(Error::format(self.line, FormatError::UnexpectedEnd)),
            (action, Input::EndOfInput) => {
                unreachable!("{action:?} is never chosen for end of input")
            }
        }

        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.filename.is_empty() {
            return Err(Error::format(self.line, FormatError::EmptyFilename));
        }
        if !is_safe_relative_path(&self.filename) {
            return Err(Error::format(
                self.line,
                FormatError::UnsafeFilename {
                    name: self.filename.clone(),
                },
            ));
        }

        let verification = self
            .policy
            .evaluate(&self.filename, self.checksum.as_deref(), self.content.as_bytes())?;

        if !self.trial_run {
            self.sink
                .write_entry(&self.filename, self.checksum.as_deref(), self.content.as_bytes())?;
        }
        self.observer.on_commit(&self.filename, verification, !self.trial_run);

        self.committed.push(CommittedEntry {
            name: std::mem::take(&mut self.filename),
            size: self.content.len(),
            verification,
        });
        self.checksum = None;
        self.content.clear();
        Ok(())
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Number of lines consumed so far
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn separator(&self) -> Option<&Separator> {
        self.separator.as_ref()
    }

    pub fn pending_filename(&self) -> &str {
        &self.filename
    }

    pub fn pending_checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn pending_content(&self) -> &str {
        &self.content
    }

    /// Free text found before the first entry, with the `Description: `
    /// marker removed.
    pub fn description(&self) -> String {
        let mut description = self.header.join("\n");
        if let Some(rest) = description.strip_prefix(DESCRIPTION_PREFIX) {
            description = rest.to_string();
        }
        description
    }

    pub fn committed(&self) -> &[CommittedEntry] {
        &self.committed
    }

    /// Consume the parser, returning the sink and the committed entries
    pub fn into_parts(self) -> (S, Vec<CommittedEntry>) {
        (self.sink, self.committed)
    }
}
