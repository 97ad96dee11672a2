//! Difference walker (spec §4.4) — descends the two cascades from the root,
//! merge-joining paired ordered selects at each level.
//!
//! [`merge_join`] is the pure, connection-free core: given one level's rows
//! from each side (already sorted by `(idc, cks)`), it classifies every
//! `idc` as matching, a value mismatch, or one-sided, with no I/O at all.
//! This is what the property tests in `tests/property_tests.rs` exercise
//! directly, the way the teacher's own `tests/property_tests.rs` drives its
//! pure LSN-ordering logic without a database.
//!
//! [`walk`] is the thin shell around it that issues the paired `SELECT`s
//! and feeds [`crate::sink::EventSink`].
//!
//! Checksum collisions — multiple rows sharing an `idc` on the same side —
//! are out of scope for exact handling (spec §1 Non-goals: "guaranteeing
//! exact results in the face of checksum collisions"); `merge_join` pairs
//! same-`idc` rows positionally rather than attempting a full cross-match.

pub mod bulk;

use std::cmp::Ordering;

use tracing::instrument;

use crate::client::{Row, SqlConnection};
use crate::engine::table_name;
use crate::error::CompareError;
use crate::options::{CompareOptions, Side};
use crate::sink::{ChangeType, EventSink};

/// One level's row, decoded positionally per spec §9's Open Question:
/// `idc, cks[, id]` in that fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRow {
    pub idc: u32,
    pub cks: u32,
    pub id: Option<String>,
}

impl LevelRow {
    fn from_row(row: &Row, is_leaf: bool) -> Option<Self> {
        let idc = row.get_u32(0)?;
        let cks = row.get_u32(1)?;
        let id = if is_leaf {
            Some(row.get_text(2)?.to_string())
        } else {
            None
        };
        Some(LevelRow { idc, cks, id })
    }
}

/// The outcome of merge-joining one level's two row sets.
#[derive(Debug, Default)]
pub struct MergeResult {
    /// `idc`s to examine at the next (shallower) level — populated only
    /// when not at the leaf.
    pub next_investigate: Vec<u32>,
    /// Deferred whole-subtree inserts: `(idc, level_mask)`.
    pub mask_insert: Vec<(u32, u32)>,
    /// Deferred whole-subtree deletes: `(idc, level_mask)`.
    pub mask_delete: Vec<(u32, u32)>,
    /// Leaf-level differences, in the single merge-ordered pass that
    /// produced them (ascending `idc`, then `cks`) — spec §5's ordering
    /// guarantee applies to this sequence, not to any grouping by type.
    pub leaf_events: Vec<(ChangeType, String)>,
}

/// Merge-join one level's two (already `(idc, cks)`-sorted) row sets,
/// exactly per spec §4.4 step 3. `level_mask` is this level's own mask,
/// recorded alongside deferred bulk chunks so the resolver can later build
/// the disjunction predicate.
pub fn merge_join(left: &[LevelRow], right: &[LevelRow], is_leaf: bool, level_mask: u32) -> MergeResult {
    let mut result = MergeResult::default();
    let (mut i, mut j) = (0usize, 0usize);

    while i < left.len() && j < right.len() {
        let l = &left[i];
        let r = &right[j];
        match l.idc.cmp(&r.idc) {
            Ordering::Equal => {
                if l.cks != r.cks {
                    if is_leaf {
                        result
                            .leaf_events
                            .push((ChangeType::Update, l.id.clone().unwrap_or_default()));
                    } else {
                        result.next_investigate.push(l.idc);
                    }
                }
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                left_only(l, is_leaf, level_mask, &mut result);
                i += 1;
            }
            Ordering::Greater => {
                right_only(r, is_leaf, level_mask, &mut result);
                j += 1;
            }
        }
    }
    while i < left.len() {
        left_only(&left[i], is_leaf, level_mask, &mut result);
        i += 1;
    }
    while j < right.len() {
        right_only(&right[j], is_leaf, level_mask, &mut result);
        j += 1;
    }

    result
}

fn left_only(row: &LevelRow, is_leaf: bool, level_mask: u32, result: &mut MergeResult) {
    if is_leaf {
        result
            .leaf_events
            .push((ChangeType::Insert, row.id.clone().unwrap_or_default()));
    } else {
        result.mask_insert.push((row.idc, level_mask));
    }
}

fn right_only(row: &LevelRow, is_leaf: bool, level_mask: u32, result: &mut MergeResult) {
    if is_leaf {
        result
            .leaf_events
            .push((ChangeType::Delete, row.id.clone().unwrap_or_default()));
    } else {
        result.mask_delete.push((row.idc, level_mask));
    }
}

/// Totals accumulated while walking, plus the deferred bulk chunks handed
/// to [`bulk::resolve`].
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub updates: u64,
    pub inserts: u64,
    pub deletes: u64,
    pub mask_insert: Vec<(u32, u32)>,
    pub mask_delete: Vec<(u32, u32)>,
}

/// Build the ordered `SELECT` for one side's level, honoring the
/// leaf-only `id` column and the `investigate` predicate (omitted when
/// `investigate` is empty — "examine everything" at the root, spec §4.4).
fn select_sql(name: &str, is_leaf: bool, parent_mask: u32, investigate: &[u32]) -> String {
    let cols = if is_leaf { "idc, cks, id" } else { "idc, cks" };
    let mut sql = format!("SELECT {cols} FROM {name}");
    if !investigate.is_empty() {
        let list = investigate
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        sql.push_str(&format!(" WHERE idc & {parent_mask} IN ({list})"));
    }
    sql.push_str(" ORDER BY idc, cks");
    sql
}

async fn fetch_level(
    conn: &dyn SqlConnection,
    name: &str,
    is_leaf: bool,
    parent_mask: u32,
    investigate: &[u32],
) -> Result<Vec<LevelRow>, CompareError> {
    let sql = select_sql(name, is_leaf, parent_mask, investigate);
    let rows = conn.query(&sql).await?;
    Ok(rows
        .iter()
        .filter_map(|r| LevelRow::from_row(r, is_leaf))
        .collect())
}

/// Descend the two cascades from the root (the highest-indexed, most
/// aggregated summary level) down to the leaf checksum table, streaming
/// every detected difference to `sink`. `masks[level]` is level `level`'s
/// own mask (see [`crate::engine::summary`] for the indexing rationale);
/// the root is `masks.len() - 1`, whose own mask is always `0`.
#[instrument(skip(left, right, masks, opts, sink), fields(levels = masks.len()))]
pub async fn walk(
    left: &Side,
    right: &Side,
    masks: &[u32],
    opts: &CompareOptions,
    sink: &mut dyn EventSink,
) -> Result<WalkOutcome, CompareError> {
    let mut investigate: Vec<u32> = Vec::new();
    let mut parent_mask: u32 = 0;
    let mut outcome = WalkOutcome::default();
    let root = masks.len() - 1;

    for level in (0..=root).rev() {
        if opts.max_report > 0 && investigate.len() > opts.max_report as usize {
            return Err(CompareError::EffortExceeded {
                level,
                investigate_size: investigate.len(),
                max_report: opts.max_report as usize,
            });
        }

        let is_leaf = level == 0;
        let left_name = table_name(&opts.prefix, 1, level);
        let right_name = table_name(&opts.prefix, 2, level);

        let (left_rows, right_rows) = crate::concurrency::join_two(
            opts.parallel,
            fetch_level(left.conn.as_ref(), &left_name, is_leaf, parent_mask, &investigate),
            fetch_level(right.conn.as_ref(), &right_name, is_leaf, parent_mask, &investigate),
        )
        .await?;

        tracing::debug!(level, left_rows = left_rows.len(), right_rows = right_rows.len(), "walked level");

        let merged = merge_join(&left_rows, &right_rows, is_leaf, masks[level]);

        for (change, id) in &merged.leaf_events {
            sink.on_event(*change, id);
            match change {
                ChangeType::Update => outcome.updates += 1,
                ChangeType::Insert => outcome.inserts += 1,
                ChangeType::Delete => outcome.deletes += 1,
            }
        }
        outcome.mask_insert.extend(merged.mask_insert);
        outcome.mask_delete.extend(merged.mask_delete);

        if merged.next_investigate.is_empty() {
            break;
        }
        parent_mask = masks[level];
        investigate = merged.next_investigate;
    }

    Ok(outcome)
}
