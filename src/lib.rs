//! tablediff — a remote table comparator.
//!
//! Detects row-level differences between two SQL tables, possibly on
//! separate database servers, with minimum network traffic. The core is a
//! hierarchical checksum/summary cascade: build a per-row checksum table on
//! each side, fold it upward into successively smaller summary tables, then
//! descend both cascades together with a merge-join, emitting only the
//! keys that actually differ.
//!
//! ```ignore
//! use tablediff::{Comparator, CompareOptions, Side, VecSink};
//!
//! let left = Side::new("left", left_conn, "students").with_cols(vec!["name".into()]);
//! let right = Side::new("right", right_conn, "students").with_cols(vec!["name".into()]);
//! let mut comparator = Comparator::new(left, right, CompareOptions::default())?;
//! let mut sink = VecSink::new();
//! comparator.process(&mut sink).await?;
//! ```
//!
//! # Higher-layer integration (illustrative, not implemented here)
//!
//! A caller that wants column-level detail on an `Update` can run this
//! comparator between a table and a rotated snapshot of itself, then, for
//! each `(Update, key)` emitted, issue its own follow-up `SELECT`s against
//! both to diff the actual column values. This crate deliberately stops at
//! `(ChangeType, key)` — see spec §1's Non-goals.

pub mod client;
pub mod comparator;
pub mod concurrency;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod observability;
pub mod options;
pub mod sink;
pub mod walk;

pub use client::{SqlConnection, TokioPostgresConnection};
pub use comparator::{Comparator, ProcessOutcome};
pub use dialect::Dialect;
pub use error::{CompareError, CompareErrorKind};
pub use observability::{PhaseTimings, Statistics};
pub use options::{CompareOptions, CompareOptionsBuilder, Side};
pub use sink::{ChangeType, EventSink, StdoutSink, VecSink};
