//! Database connection abstraction.
//!
//! The hierarchical diff engine never constructs or owns a connection
//! itself — callers pass in an already-connected [`SqlConnection`] per
//! side, exactly as the specification requires ("Database connections are
//! owned by the caller", spec §3). This indirection also makes the merge
//! join and table-building logic testable without a live database: see
//! [`FakeConnection`] in this module's test helpers and the property
//! tests in `tests/`.
//!
//! The production implementation, [`TokioPostgresConnection`], wraps
//! `tokio_postgres::Client` — the driver this crate's teacher uses in its
//! own client-side binaries rather than its `pgrx`-embedded extension
//! core, since this crate is a library that dials out to Postgres rather
//! than code that runs inside it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::CompareError;

/// A single column value as fetched from a result row. Only the variants
/// the diff engine actually needs are represented: the engine only ever
/// reads `idc`/`cks` (unsigned 32-bit integers) and, at the leaf level,
/// `id` (text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    UInt32(u32),
    Null,
}

impl Value {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// One row of a result set, with columns in the order they were selected.
/// The engine relies on *positional* access matching the `SELECT` column
/// order (spec §9 Open Questions) rather than named lookup.
#[derive(Debug, Clone, Default)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }

    pub fn get_u32(&self, idx: usize) -> Option<u32> {
        self.get(idx).and_then(Value::as_u32)
    }

    pub fn get_text(&self, idx: usize) -> Option<&str> {
        self.get(idx).and_then(Value::as_text)
    }
}

/// A database session capable of executing arbitrary statements and
/// ordered queries. Implementors own exactly one side of a comparison —
/// the engine never shares a `SqlConnection` across sides, even in
/// `parallel` mode (spec §5).
#[async_trait]
pub trait SqlConnection: Send + Sync {
    /// Execute a statement that returns no rows (`CREATE TABLE ... AS
    /// SELECT`, `DROP TABLE`, ...). Returns the number of rows affected,
    /// where meaningful.
    async fn execute(&self, sql: &str) -> Result<u64, CompareError>;

    /// Execute a query and collect every returned row, in server order.
    /// The engine only ever issues queries with an explicit `ORDER BY`, so
    /// "server order" is a total order over the columns requested.
    async fn query(&self, sql: &str) -> Result<Vec<Row>, CompareError>;
}

/// [`SqlConnection`] backed by a live `tokio_postgres::Client`.
pub struct TokioPostgresConnection {
    client: tokio_postgres::Client,
}

impl TokioPostgresConnection {
    pub fn new(client: tokio_postgres::Client) -> Self {
        TokioPostgresConnection { client }
    }

    /// Wrap this connection in the `Arc<dyn SqlConnection>` a [`crate::options::Side`]
    /// expects.
    pub fn into_side_conn(self) -> Arc<dyn SqlConnection> {
        Arc::new(self)
    }
}

#[async_trait]
impl SqlConnection for TokioPostgresConnection {
    async fn execute(&self, sql: &str) -> Result<u64, CompareError> {
        self.client
            .execute(sql, &[])
            .await
            .map_err(|e| CompareError::sql(sql, e))
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, CompareError> {
        let rows = self
            .client
            .query(sql, &[])
            .await
            .map_err(|e| CompareError::sql(sql, e))?;

        rows.iter().map(pg_row_to_row).collect()
    }
}

/// Convert a `tokio_postgres::Row` into the engine's dialect-agnostic
/// [`Row`], reading the engine's `idc`/`cks` columns (stored `BIGINT`,
/// since Postgres has no native unsigned integer type that could hold the
/// full range of an unsigned 32-bit checksum) and text columns
/// positionally.
fn pg_row_to_row(row: &tokio_postgres::Row) -> Result<Row, CompareError> {
    let mut values = Vec::with_capacity(row.len());
    for idx in 0..row.len() {
        let column_type = row.columns()[idx].type_();
        let value = match *column_type {
            tokio_postgres::types::Type::TEXT | tokio_postgres::types::Type::VARCHAR => {
                match row.try_get::<_, Option<String>>(idx) {
                    Ok(Some(s)) => Value::Text(s),
                    Ok(None) => Value::Null,
                    Err(e) => return Err(CompareError::sql("<row decode>", e)),
                }
            }
            tokio_postgres::types::Type::INT8 => match row.try_get::<_, Option<i64>>(idx) {
                Ok(Some(v)) => Value::UInt32(v as u32),
                Ok(None) => Value::Null,
                Err(e) => return Err(CompareError::sql("<row decode>", e)),
            },
            _ => match row.try_get::<_, Option<i32>>(idx) {
                Ok(Some(v)) => Value::UInt32(v as u32),
                Ok(None) => Value::Null,
                Err(e) => return Err(CompareError::sql("<row decode>", e)),
            },
        };
        values.push(value);
    }
    Ok(Row(values))
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    //! An in-memory [`SqlConnection`] used by unit and property tests that
    //! don't need a live Postgres instance. It understands just enough of
    //! the SQL this crate itself generates to execute it — `DROP TABLE`,
    //! the summary builder's `GROUP BY idc & mask` shape, the walker's
    //! ordered `SELECT`s, and the bulk resolver's disjunctive scan — so the
    //! engine above [`crate::engine::level_zero`] can be exercised end to
    //! end without a live Postgres instance. Level-0 construction itself
    //! evaluates dialect expressions (`CRC32(CONCAT_WS(...))`) this fake
    //! does not interpret; callers seed level-0 contents directly via
    //! [`FakeConnection::seed_level_zero`] instead, and use
    //! [`FakeConnection::executed_statements`] to assert on the SQL shape
    //! `build_level_zero` emits.
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// A named in-memory table: level-0 rows carry `(id, idc, cks)`;
    /// summary levels carry `(None, idc, cks)`.
    #[derive(Debug, Clone, Default)]
    pub struct FakeTable {
        pub rows: Vec<(Option<String>, u32, u32)>,
    }

    #[derive(Default)]
    pub struct FakeConnection {
        tables: Mutex<BTreeMap<String, FakeTable>>,
        counts: Mutex<BTreeMap<String, u32>>,
        executed: Mutex<Vec<String>>,
    }

    impl FakeConnection {
        pub fn new() -> Self {
            FakeConnection::default()
        }

        /// Seed a level-0 table's contents directly, bypassing the
        /// `CREATE TABLE ... AS SELECT` this fake can't evaluate.
        pub fn seed_level_zero(&self, name: &str, rows: Vec<(String, u32, u32)>) {
            let count = rows.len() as u32;
            let mut tables = self.tables.lock().unwrap();
            tables.insert(
                name.to_string(),
                FakeTable {
                    rows: rows.into_iter().map(|(id, idc, cks)| (Some(id), idc, cks)).collect(),
                },
            );
            self.counts.lock().unwrap().insert(name.to_string(), count);
        }

        pub fn table(&self, name: &str) -> Option<FakeTable> {
            self.tables.lock().unwrap().get(name).cloned()
        }

        /// Every statement passed to [`SqlConnection::execute`], in order —
        /// used to assert on SQL shape without fully interpreting it.
        pub fn executed_statements(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    /// Extract the substring strictly between two anchors, assuming both
    /// occur exactly once — this fake only ever parses SQL this crate
    /// itself generated, in its own fixed format.
    fn between<'a>(sql: &'a str, start: &str, end: &str) -> Option<&'a str> {
        let after_start = &sql[sql.find(start)? + start.len()..];
        let end_idx = after_start.find(end)?;
        Some(&after_start[..end_idx])
    }

    fn group_by_mask(rows: &[(Option<String>, u32, u32)], mask: u32) -> Vec<(Option<String>, u32, u32)> {
        let mut groups: BTreeMap<u32, u32> = BTreeMap::new();
        for (_, idc, cks) in rows {
            groups.entry(idc & mask).and_modify(|acc| *acc ^= cks).or_insert(*cks);
        }
        groups.into_iter().map(|(idc, cks)| (None, idc, cks)).collect()
    }

    #[async_trait]
    impl SqlConnection for FakeConnection {
        async fn execute(&self, sql: &str) -> Result<u64, CompareError> {
            self.executed.lock().unwrap().push(sql.to_string());
            let sql_upper = sql.trim_start().to_uppercase();

            if sql_upper.starts_with("DROP TABLE") {
                let name = sql
                    .split_whitespace()
                    .nth(if sql_upper.contains("IF EXISTS") { 4 } else { 2 })
                    .unwrap_or_default()
                    .trim_end_matches(';');
                self.tables.lock().unwrap().remove(name);
                self.counts.lock().unwrap().remove(name);
                return Ok(0);
            }

            if sql_upper.contains("GROUP BY") {
                let name = between(sql, "TABLE ", " (").unwrap_or_default().to_string();
                let mask: u32 = between(sql, "SELECT idc & ", " AS idc")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(0);
                let source = between(sql, "FROM ", " GROUP BY").unwrap_or_default().to_string();
                let source_rows = self.tables.lock().unwrap().get(&source).cloned().unwrap_or_default();
                let grouped = group_by_mask(&source_rows.rows, mask);
                let count = grouped.len() as u32;
                self.tables.lock().unwrap().insert(name.clone(), FakeTable { rows: grouped });
                self.counts.lock().unwrap().insert(name, count);
            }

            Ok(0)
        }

        async fn query(&self, sql: &str) -> Result<Vec<Row>, CompareError> {
            let sql_upper = sql.trim_start().to_uppercase();

            if sql_upper.starts_with("SELECT COUNT(*)") {
                let name = sql.rsplit("FROM ").next().unwrap_or_default().trim_end_matches(';');
                let count = *self.counts.lock().unwrap().get(name).unwrap_or(&0);
                return Ok(vec![Row(vec![Value::UInt32(count)])]);
            }

            if sql_upper.starts_with("SELECT ID FROM") && sql.contains("(idc &") {
                return Ok(self.query_bulk(sql));
            }

            Ok(self.query_level(sql))
        }
    }

    impl FakeConnection {
        fn query_level(&self, sql: &str) -> Vec<Row> {
            let is_leaf = sql.starts_with("SELECT idc, cks, id");
            let name = between(sql, "FROM ", " WHERE")
                .or_else(|| between(sql, "FROM ", " ORDER BY"))
                .unwrap_or_default();
            let table = self.tables.lock().unwrap().get(name).cloned().unwrap_or_default();

            let allowed: Option<(u32, Vec<u32>)> = between(sql, "WHERE idc & ", " IN (").and_then(|mask_str| {
                let mask: u32 = mask_str.trim().parse().ok()?;
                let list = between(sql, "IN (", ")")?;
                let values: Vec<u32> = list.split(',').filter_map(|v| v.trim().parse().ok()).collect();
                Some((mask, values))
            });

            let mut rows: Vec<_> = table
                .rows
                .iter()
                .filter(|(_, idc, _)| match &allowed {
                    Some((mask, values)) => values.contains(&(idc & mask)),
                    None => true,
                })
                .cloned()
                .collect();
            rows.sort_by_key(|(_, idc, cks)| (*idc, *cks));

            rows.into_iter()
                .map(|(id, idc, cks)| {
                    let mut values = vec![Value::UInt32(idc), Value::UInt32(cks)];
                    if is_leaf {
                        values.push(id.map(Value::Text).unwrap_or(Value::Null));
                    }
                    Row(values)
                })
                .collect()
        }

        fn query_bulk(&self, sql: &str) -> Vec<Row> {
            let name = between(sql, "FROM ", " WHERE").unwrap_or_default();
            let table = self.tables.lock().unwrap().get(name).cloned().unwrap_or_default();
            let predicate = between(sql, "WHERE ", " ORDER BY").unwrap_or_default();

            let clauses: Vec<(u32, u32)> = predicate
                .split(" OR ")
                .filter_map(|clause| {
                    let mask: u32 = between(clause, "idc & ", " =")?.trim().parse().ok()?;
                    let value: u32 = clause
                        .rsplit('=')
                        .next()?
                        .trim_end_matches(')')
                        .trim()
                        .parse()
                        .ok()?;
                    Some((mask, value))
                })
                .collect();

            let mut ids: Vec<String> = table
                .rows
                .iter()
                .filter(|(_, idc, _)| clauses.iter().any(|(mask, value)| idc & mask == *value))
                .filter_map(|(id, _, _)| id.clone())
                .collect();
            ids.sort();
            ids.into_iter().map(|id| Row(vec![Value::Text(id)])).collect()
        }
    }
}
