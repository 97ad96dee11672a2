//! Checksum and summary table construction — the part of the cascade that
//! runs once per side before the walker ever issues a `SELECT`.
//!
//! Table naming follows the boundary convention from spec §6: `<prefix>_<side>_<level>`,
//! where `side` is `1` for the left side and `2` for the right, and `level`
//! runs from `0` (the raw per-row checksum table) up to the root summary.
//! [`CreatedTables`] tracks what's been created so an abort mid-cascade can
//! still drop everything already built, mirroring the teacher's
//! transactional bookkeeping in its refresh path.

pub mod level_zero;
pub mod summary;

use crate::client::SqlConnection;
use crate::error::CompareError;

/// Name of the level-`level` table for `side` (`1` or `2`) under `prefix`.
pub fn table_name(prefix: &str, side: u8, level: usize) -> String {
    format!("{prefix}_{side}_{level}")
}

/// Tracks tables created for one side during a single `process` call, so
/// they can be dropped either at normal cleanup time or on an abort path.
/// Grounded in the teacher's pattern of recording created objects before
/// attempting a multi-statement operation that might fail partway through.
#[derive(Debug, Default)]
pub struct CreatedTables {
    names: Vec<String>,
}

impl CreatedTables {
    pub fn new() -> Self {
        CreatedTables::default()
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Best-effort drop of every tracked table, in reverse creation order
    /// (summaries before the leaf they were built from). Errors are
    /// collected but never stop the sweep — cleanup must not itself fail
    /// partway and strand the rest.
    pub async fn drop_all(&self, conn: &dyn SqlConnection) {
        for name in self.names.iter().rev() {
            let sql = format!("DROP TABLE IF EXISTS {name}");
            if let Err(e) = conn.execute(&sql).await {
                tracing::warn!(table = %name, error = %e, "failed to drop intermediate table during cleanup");
            }
        }
    }
}

/// Issue a single statement and record the table it created, so an abort
/// later in the cascade can still find it during cleanup.
pub async fn create_and_track(
    conn: &dyn SqlConnection,
    created: &mut CreatedTables,
    name: &str,
    sql: &str,
) -> Result<(), CompareError> {
    conn.execute(sql).await.map_err(|e| {
        tracing::error!(table = %name, error = %e, "failed to create intermediate table");
        e
    })?;
    created.push(name);
    Ok(())
}
