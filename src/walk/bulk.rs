//! Bulk-chunk resolver (spec §4.5) — turns deferred whole-subtree
//! `(idc, mask)` pairs into concrete keys with one disjunctive scan of the
//! level-0 table per side.

use tracing::instrument;

use crate::client::SqlConnection;
use crate::concurrency::join_two;
use crate::error::CompareError;
use crate::options::CompareOptions;
use crate::sink::{ChangeType, EventSink};

/// Build the `WHERE (idc & mask_0 = idc_0) OR ...` disjunction over the
/// deferred chunks. Empty input is never passed in by [`resolve`] — callers
/// check `chunks.is_empty()` first.
fn disjunction_sql(leaf_table: &str, chunks: &[(u32, u32)]) -> String {
    let predicate = chunks
        .iter()
        .map(|(idc, mask)| format!("(idc & {mask} = {idc})"))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("SELECT id FROM {leaf_table} WHERE {predicate} ORDER BY id")
}

async fn resolve_side(
    conn: &dyn SqlConnection,
    leaf_table: &str,
    chunks: &[(u32, u32)],
) -> Result<Vec<String>, CompareError> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }
    let sql = disjunction_sql(leaf_table, chunks);
    let rows = conn.query(&sql).await?;
    Ok(rows.iter().filter_map(|r| r.get_text(0).map(str::to_string)).collect())
}

/// Resolve both sides' deferred bulk chunks, emitting one `Insert` event
/// per left-only key and one `Delete` event per right-only key. Runs the
/// two scans concurrently via [`crate::concurrency::join_two`] when both
/// lists are nonempty and `opts.parallel` is set, per spec §4.5.
#[instrument(skip(left_conn, right_conn, mask_insert, mask_delete, opts, sink))]
pub async fn resolve(
    left_conn: &dyn SqlConnection,
    left_leaf: &str,
    right_conn: &dyn SqlConnection,
    right_leaf: &str,
    mask_insert: &[(u32, u32)],
    mask_delete: &[(u32, u32)],
    opts: &CompareOptions,
    sink: &mut dyn EventSink,
) -> Result<(u64, u64), CompareError> {
    let run_concurrently = opts.parallel && !mask_insert.is_empty() && !mask_delete.is_empty();

    let (inserts, deletes) = join_two(
        run_concurrently,
        resolve_side(left_conn, left_leaf, mask_insert),
        resolve_side(right_conn, right_leaf, mask_delete),
    )
    .await?;

    for id in &inserts {
        sink.on_event(ChangeType::Insert, id);
    }
    for id in &deletes {
        sink.on_event(ChangeType::Delete, id);
    }

    tracing::debug!(inserts = inserts.len(), deletes = deletes.len(), "resolved bulk chunks");

    Ok((inserts.len() as u64, deletes.len() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjunction_sql_ors_every_chunk() {
        let sql = disjunction_sql("cmp_1_0", &[(5, 127), (9, 127)]);
        assert_eq!(
            sql,
            "SELECT id FROM cmp_1_0 WHERE (idc & 127 = 5) OR (idc & 127 = 9) ORDER BY id"
        );
    }

    #[test]
    fn test_disjunction_sql_single_chunk() {
        let sql = disjunction_sql("cmp_2_0", &[(3, 0)]);
        assert_eq!(sql, "SELECT id FROM cmp_2_0 WHERE (idc & 0 = 3) ORDER BY id");
    }
}
