//! Level-0 checksum table builder (spec §4.2).
//!
//! `idc`/`cks` are stored as `BIGINT` rather than spec.md's literal
//! `INTEGER UNSIGNED` — Postgres has no unsigned integer type, and a
//! 4-byte signed `INTEGER` cannot hold the upper half of an unsigned
//! 32-bit checksum's range. `BIGINT` holds the full range losslessly;
//! the engine still treats every value as a `u32` once fetched (see
//! `client::pg_row_to_row`).

use tracing::instrument;

use crate::dialect::Dialect;
use crate::engine::{create_and_track, table_name, CreatedTables};
use crate::error::CompareError;
use crate::options::{CompareOptions, Side};

/// Result of building one side's level-0 table.
pub struct LevelZero {
    /// `<prefix>_<side>_0`.
    pub name: String,
    /// Row count, either probed via `COUNT(*)` or taken from
    /// `CompareOptions::num_records`.
    pub row_count: u64,
}

/// Emit `CREATE [TEMPORARY] TABLE <name>_0 ... AS SELECT ...` for `side`,
/// then count its rows. Tracks the created table in `created` so an abort
/// later in the cascade can still drop it.
#[instrument(skip(side, dialect, opts, created), fields(side = %side.label, table = %side.table))]
pub async fn build_level_zero(
    side: &Side,
    side_index: u8,
    dialect: &Dialect,
    opts: &CompareOptions,
    created: &mut CreatedTables,
) -> Result<LevelZero, CompareError> {
    let name = table_name(&opts.prefix, side_index, 0);
    let temp = Dialect::temporary_keyword(opts.temporary);
    let key_expr = dialect.concat_key(&side.keys);
    let all_expr = dialect.concat_all(&side.keys, &side.cols);
    let where_clause = opts
        .where_clause
        .as_deref()
        .map(|w| format!(" WHERE {w}"))
        .unwrap_or_default();

    let sql = format!(
        "CREATE {temp} TABLE {name} (id VARCHAR({keylen}) NOT NULL, \
         idc BIGINT NOT NULL, cks BIGINT NOT NULL) \
         AS SELECT {key_expr} AS id, {idc} AS idc, {cks} AS cks FROM {table}{where_clause}",
        temp = temp,
        name = name,
        keylen = side.keylen,
        idc = dialect.checksum(&key_expr),
        cks = dialect.checksum(&all_expr),
        table = side.table,
        where_clause = where_clause,
    );

    create_and_track(side.conn.as_ref(), created, &name, &sql).await?;

    let row_count = match opts.num_records {
        Some(n) => n,
        None => count_rows(side.conn.as_ref(), &name).await?,
    };

    tracing::debug!(table = %name, row_count, "built level-0 checksum table");

    Ok(LevelZero { name, row_count })
}

async fn count_rows(
    conn: &dyn crate::client::SqlConnection,
    table: &str,
) -> Result<u64, CompareError> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    let rows = conn.query(&sql).await?;
    let count = rows
        .first()
        .and_then(|r| r.get_u32(0))
        .ok_or_else(|| CompareError::Internal(format!("COUNT(*) on {table} returned no rows")))?;
    Ok(count as u64)
}
