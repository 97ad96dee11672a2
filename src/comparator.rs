//! The public entry point: [`Comparator`] ties the dialect, engine, walker,
//! and bulk resolver together into the single `process` call spec §6
//! describes.

use std::time::Instant;

use tracing::instrument;

use crate::dialect::Dialect;
use crate::engine::summary::{build_summaries, masks};
use crate::engine::{level_zero::build_level_zero, table_name, CreatedTables};
use crate::error::CompareError;
use crate::observability::{PhaseTimings, Statistics};
use crate::options::{CompareOptions, Side};
use crate::sink::EventSink;
use crate::walk::{bulk, walk};

/// `process`'s result, distinguishing "nothing to compare" (spec §7's
/// `EmptyDomain`, not a failure) from a completed comparison, so callers
/// aren't forced to match on an error variant for a non-error condition.
#[derive(Debug)]
pub enum ProcessOutcome {
    Done(Statistics),
    NothingToDo,
}

/// A single table comparison: two sides, resolved options, and (after
/// `process` runs at least once) the set of intermediate tables created on
/// each side, kept around for inspection when `cleanup = false`.
pub struct Comparator {
    left: Side,
    right: Side,
    opts: CompareOptions,
    dialect: Dialect,
    left_tables: CreatedTables,
    right_tables: CreatedTables,
}

impl Comparator {
    /// Validate both sides and the options, resolving derived defaults
    /// (`cleanup` from `temporary`, `factor` clamped) exactly once. Missing
    /// keys/cols/table on either side is `CompareError::InvalidInput`,
    /// raised synchronously before any SQL is issued (spec §7).
    pub fn new(left: Side, right: Side, opts: CompareOptions) -> Result<Self, CompareError> {
        left.validate()?;
        right.validate()?;
        let opts = opts.normalize();
        opts.validate()?;
        let dialect = Dialect::from_options(&opts)?;

        Ok(Comparator {
            left,
            right,
            opts,
            dialect,
            left_tables: CreatedTables::new(),
            right_tables: CreatedTables::new(),
        })
    }

    /// Names of every intermediate table created by the most recent
    /// `process` call, `<prefix>_1_<k>` then `<prefix>_2_<k>` (spec §6).
    /// Only meaningful when `cleanup = false`; otherwise the tables named
    /// here have already been dropped.
    pub fn table_names(&self) -> (&[String], &[String]) {
        (self.left_tables.names(), self.right_tables.names())
    }

    /// Run one full comparison, streaming every detected difference to
    /// `sink`. Returns [`ProcessOutcome::NothingToDo`] rather than an error
    /// when both sides are empty (spec §7).
    #[instrument(skip(self, sink), fields(left = %self.left.table, right = %self.right.table))]
    pub async fn process(&mut self, sink: &mut dyn EventSink) -> Result<ProcessOutcome, CompareError> {
        match self.process_inner(sink).await {
            Ok(stats) => Ok(ProcessOutcome::Done(stats)),
            Err(CompareError::EmptyDomain) => Ok(ProcessOutcome::NothingToDo),
            Err(e) => Err(e),
        }
    }

    async fn process_inner(&mut self, sink: &mut dyn EventSink) -> Result<Statistics, CompareError> {
        let mut timings = PhaseTimings::default();

        let checksum_start = Instant::now();
        let build = crate::concurrency::join_two(
            self.opts.parallel,
            build_level_zero(&self.left, 1, &self.dialect, &self.opts, &mut self.left_tables),
            build_level_zero(&self.right, 2, &self.dialect, &self.opts, &mut self.right_tables),
        )
        .await;
        let build = match build {
            Ok(b) => b,
            Err(e) => {
                self.cleanup_best_effort().await;
                return Err(e);
            }
        };
        timings.checksum = checksum_start.elapsed();
        let (left_zero, right_zero) = build;

        let size = left_zero.row_count.max(right_zero.row_count);
        if size == 0 {
            self.cleanup_best_effort().await;
            return Err(CompareError::EmptyDomain);
        }

        let mask_vec = masks(size, self.opts.factor, self.opts.max_levels);
        tracing::info!(levels = mask_vec.len(), factor = self.opts.factor, size, "computed mask cascade");

        let summary_start = Instant::now();
        let summaries = crate::concurrency::join_two(
            self.opts.parallel,
            build_summaries(
                self.left.conn.as_ref(),
                1,
                &left_zero.name,
                &self.dialect,
                &self.opts,
                &mask_vec,
                &mut self.left_tables,
            ),
            build_summaries(
                self.right.conn.as_ref(),
                2,
                &right_zero.name,
                &self.dialect,
                &self.opts,
                &mask_vec,
                &mut self.right_tables,
            ),
        )
        .await;
        if let Err(e) = summaries {
            self.cleanup_best_effort().await;
            return Err(e);
        }
        timings.summary = summary_start.elapsed();

        let merge_start = Instant::now();
        let walk_result = walk(&self.left, &self.right, &mask_vec, &self.opts, sink).await;
        let walk_result = match walk_result {
            Ok(r) => r,
            Err(e) => {
                self.cleanup_best_effort().await;
                return Err(e);
            }
        };
        timings.merge = merge_start.elapsed();

        let bulk_start = Instant::now();
        let left_leaf = table_name(&self.opts.prefix, 1, 0);
        let right_leaf = table_name(&self.opts.prefix, 2, 0);
        let bulk_result = bulk::resolve(
            self.left.conn.as_ref(),
            &left_leaf,
            self.right.conn.as_ref(),
            &right_leaf,
            &walk_result.mask_insert,
            &walk_result.mask_delete,
            &self.opts,
            sink,
        )
        .await;
        let (bulk_inserts, bulk_deletes) = match bulk_result {
            Ok(r) => r,
            Err(e) => {
                self.cleanup_best_effort().await;
                return Err(e);
            }
        };
        timings.bulk = bulk_start.elapsed();

        if self.opts.cleanup {
            self.cleanup_best_effort().await;
        }

        Ok(Statistics {
            left_count: left_zero.row_count,
            right_count: right_zero.row_count,
            factor: self.opts.factor,
            levels: mask_vec.len(),
            updates: walk_result.updates,
            inserts: walk_result.inserts + bulk_inserts,
            deletes: walk_result.deletes + bulk_deletes,
            timings,
        })
    }

    async fn cleanup_best_effort(&self) {
        self.left_tables.drop_all(self.left.conn.as_ref()).await;
        self.right_tables.drop_all(self.right.conn.as_ref()).await;
    }
}
