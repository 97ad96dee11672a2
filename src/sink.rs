//! Result delivery — the consumer side of the walker's merge-join (spec §6).

use std::fmt;

/// The classification of a detected row-level difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Insert => write!(f, "insert"),
            ChangeType::Update => write!(f, "update"),
            ChangeType::Delete => write!(f, "delete"),
        }
    }
}

/// Receives one `(ChangeType, key)` pair per detected difference, invoked
/// inline on the walker's task — a slow sink throttles the whole walk
/// (spec §5). The Rust expression of "callback passed through recursive
/// descent" (spec §9 REDESIGN FLAGS).
pub trait EventSink {
    fn on_event(&mut self, change: ChangeType, key: &str);
}

/// Default sink for "no callback supplied" (spec §6): prints `"<type>
/// <key>"` lines to standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn on_event(&mut self, change: ChangeType, key: &str) {
        println!("{change} {key}");
    }
}

/// An in-memory sink, used by tests and by callers who want the full event
/// list rather than a streaming callback.
#[derive(Debug, Default)]
pub struct VecSink {
    pub events: Vec<(ChangeType, String)>,
}

impl VecSink {
    pub fn new() -> Self {
        VecSink::default()
    }
}

impl EventSink for VecSink {
    fn on_event(&mut self, change: ChangeType, key: &str) {
        self.events.push((change, key.to_string()));
    }
}
