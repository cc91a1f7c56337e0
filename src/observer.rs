//! Hooks for watching the parser work

use crate::parser::{Action, State};
use crate::policy::Verification;
use tracing::{debug, trace};

/// One step of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<'a> {
    /// 1-based number of the line that drove the step; end of input reports
    /// the last line read
    pub line: usize,
    /// The raw line, `None` for end of input
    pub input: Option<&'a str>,
    pub from: State,
    pub action: Action,
    pub to: State,
}

/// Receives every transition the parser takes.
///
/// All methods default to doing nothing.
pub trait ParseObserver {
    fn on_transition(&mut self, _transition: &Transition<'_>) {}

    /// An entry passed the commit policy. `written` is false in trial runs.
    fn on_commit(&mut self, _name: &str, _verification: Verification, _written: bool) {}

    /// Parsing stopped with an error.
    fn on_error(&mut self, _line: usize, _error: &crate::Error) {}
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ParseObserver for NoopObserver {}

/// Forwards parser activity to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ParseObserver for TracingObserver {
    fn on_transition(&mut self, t: &Transition<'_>) {
        trace!(
            line = t.line,
            input = t.input.unwrap_or("<EOF>"),
            "{:?} | {:?} -> {:?}",
            t.from,
            t.action,
            t.to
        );
    }

    fn on_commit(&mut self, name: &str, verification: Verification, written: bool) {
        debug!(name, %verification, written, "committed entry");
    }

    fn on_error(&mut self, line: usize, error: &crate::Error) {
        debug!(line, %error, "parse failed");
    }
}

impl<O: ParseObserver + ?Sized> ParseObserver for &mut O {
    fn on_transition(&mut self, transition: &Transition<'_>) {
        (**self).on_transition(transition)
    }

    fn on_commit(&mut self, name: &str, verification: Verification, written: bool) {
        (**self).on_commit(name, verification, written)
    }

    fn on_error(&mut self, line: usize, error: &crate::Error) {
        (**self).on_error(line, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        transitions: usize,
        commits: Vec<(String, bool)>,
    }

    impl ParseObserver for Counter {
        fn on_transition(&mut self, _transition: &Transition<'_>) {
            self.transitions += 1;
        }

        fn on_commit(&mut self, name: &str, _verification: Verification, written: bool) {
            self.commits.push((name.to_string(), written));
        }
    }

    fn drive<O: ParseObserver>(mut observer: O) {
        let t = Transition {
            line: 1,
            input: Some("SEP"),
            from: State::ReadSeparator,
            action: Action::RememberSeparator,
            to: State::ExpectFilenameOrComment,
        };
        observer.on_transition(&t);
        observer.on_commit("a.txt", Verification::Verified, false);
        // Default method, no-op
        observer.on_error(1, &crate::Error::Configuration("x".to_string()));
    }

    #[test]
    fn test_mut_ref_forwards() {
        let mut counter = Counter::default();
        drive(&mut counter);

        assert_eq!(counter.transitions, 1);
        assert_eq!(counter.commits, vec![("a.txt".to_string(), false)]);
    }
}
