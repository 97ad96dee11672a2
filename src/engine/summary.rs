//! Summary cascade builder (spec §4.3).
//!
//! # Mask vector orientation
//!
//! Spec §3 describes the mask vector in prose as "stored top-down (...) so
//! position 0 corresponds to the root summary and position L to the leaf
//! checksum table", but its own construction (§4.3: `for k = 1..len(masks)-1
//! emit ... GROUP BY idc & mask_k`, described as using "leaf-first"
//! numbering for `k`) only works out to the intended "each level reduces
//! row count by `2^factor`" behavior if level `k`'s own mask is `masks[k]`
//! directly — which makes `masks[last] == 0` the *root* (a single group)
//! and `masks[0]` (the largest value, ~ `size` distinct buckets) the
//! resolution bound of the *leaf*, the opposite of that prose sentence.
//! This module implements the construction literally (ascending generation,
//! then reversed) and the indexing that actually produces a correctly
//! shrinking cascade — `masks[k]` is level `k`'s own mask, in ascending
//! (leaf-first) level order, with `masks[masks.len() - 1] == 0` at the
//! root. See DESIGN.md for the full resolution.

use tracing::instrument;

use crate::client::{Row, SqlConnection};
use crate::dialect::Dialect;
use crate::engine::{create_and_track, table_name, CreatedTables};
use crate::error::CompareError;
use crate::options::CompareOptions;

/// Construct the mask vector for a cascade over `size` rows.
///
/// Pushes `mask_i = (1 << (i * factor)) - 1` for `i = 0, 1, 2, ...` while
/// the previously pushed value was still less than `size`, stopping once a
/// pushed value is `>= size`. The resulting ascending vector is then
/// reversed (matching spec §4.3's literal construction) and truncated to
/// `max_levels` entries when `max_levels > 0 && max_levels < len`.
pub fn masks(size: u64, factor: u8, max_levels: u32) -> Vec<u32> {
    let factor = factor as u32;
    let mut ascending = Vec::new();
    let mut i: u32 = 0;
    loop {
        let shift = i.saturating_mul(factor);
        let value = if shift >= 32 { u32::MAX } else { (1u32 << shift) - 1 };
        ascending.push(value);
        if (value as u64) >= size || shift >= 32 {
            break;
        }
        i += 1;
    }
    ascending.reverse();
    if max_levels > 0 && (max_levels as usize) < ascending.len() {
        ascending.truncate(max_levels as usize);
    }
    ascending
}

/// The table name and row-building mask for one summary level.
pub struct SummaryLevel {
    pub name: String,
    pub mask: u32,
}

/// Emit `CREATE TABLE <name>_k ... GROUP BY idc & mask_k` for each summary
/// level `k = 1 ..= masks.len() - 1`, each built from the previous level's
/// table. Returns the built levels in ascending (leaf-first) order; the
/// last entry is the root.
#[instrument(skip(conn, dialect, opts, masks, created), fields(levels = masks.len()))]
pub async fn build_summaries(
    conn: &dyn SqlConnection,
    side_index: u8,
    leaf_name: &str,
    dialect: &Dialect,
    opts: &CompareOptions,
    masks: &[u32],
    created: &mut CreatedTables,
) -> Result<Vec<SummaryLevel>, CompareError> {
    let temp = Dialect::temporary_keyword(opts.temporary);
    let mut levels = Vec::with_capacity(masks.len().saturating_sub(1));
    let mut previous_name = leaf_name.to_string();

    for (k, mask) in masks.iter().enumerate().skip(1) {
        let name = table_name(&opts.prefix, side_index, k);
        let sql = format!(
            "CREATE {temp} TABLE {name} (idc BIGINT NOT NULL, \
             cks BIGINT NOT NULL) \
             AS SELECT idc & {mask} AS idc, {agg} AS cks FROM {previous} \
             GROUP BY idc & {mask}",
            temp = temp,
            name = name,
            mask = mask,
            agg = dialect.aggregate("cks"),
            previous = previous_name,
        );
        create_and_track(conn, created, &name, &sql).await?;
        tracing::debug!(table = %name, mask, "built summary level");
        previous_name = name.clone();
        levels.push(SummaryLevel { name, mask: *mask });
    }

    Ok(levels)
}

/// Read every `(idc, cks)` row of a summary level, ordered for merge-join.
pub async fn select_level(conn: &dyn SqlConnection, name: &str) -> Result<Vec<Row>, CompareError> {
    let sql = format!("SELECT idc, cks FROM {name} ORDER BY idc, cks");
    conn.query(&sql).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_end_in_zero() {
        let m = masks(1_000_000, 7, 0);
        assert_eq!(*m.last().unwrap(), 0);
    }

    #[test]
    fn test_masks_monotonically_shrink_by_factor() {
        let m = masks(1_000_000, 7, 0);
        for w in m.windows(2) {
            assert_eq!(w[1], w[0] >> 7);
        }
    }

    #[test]
    fn test_masks_count_matches_formula() {
        let size = 1_000_000u64;
        let factor = 7u8;
        let m = masks(size, factor, 0);
        // `mask_i = (1 << (i*factor)) - 1` is pushed through the first `i`
        // whose mask is `>= size`, so the boundary-crossing entry counts
        // too: the smallest such `i` satisfies `2^(i*factor) >= size + 1`.
        let expected = (((size + 1) as f64).log2() / factor as f64).ceil() as usize + 1;
        assert_eq!(m.len(), expected);
    }

    #[test]
    fn test_masks_single_row_table() {
        let m = masks(1, 7, 0);
        assert_eq!(m, vec![127, 0]);
    }

    #[test]
    fn test_masks_truncated_to_max_levels() {
        let full = masks(1_000_000, 7, 0);
        let truncated = masks(1_000_000, 7, 2);
        assert_eq!(truncated.len(), 2);
        assert_eq!(truncated.as_slice(), &full[..2]);
    }

    #[test]
    fn test_masks_max_levels_noop_when_not_smaller() {
        let full = masks(1_000_000, 7, 0);
        let same = masks(1_000_000, 7, full.len() as u32 + 10);
        assert_eq!(same, full);
    }
}
