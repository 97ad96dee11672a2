//! Options governing a single comparison — the merged, fully-resolved
//! configuration a [`crate::comparator::Comparator`] runs with.
//!
//! Every field has a default (mirrored from the specification's option
//! table); callers override only what they need. Unlike the source this
//! crate generalizes from, the "second side defaults from the first side"
//! merge happens exactly once, in [`Side::resolve_pair`], at construction
//! time — nothing downstream ever falls back to "the other side" at the
//! point of use.

use crate::error::CompareError;

/// Default maximum length for the textual form of a composite key.
pub const DEFAULT_KEYLEN: u32 = 255;

/// Folding factor is clamped to this inclusive range to keep mask
/// arithmetic inside a 32-bit unsigned integer (`1 << 30` is the largest
/// shift that cannot overflow `u32`).
pub const FACTOR_RANGE: std::ops::RangeInclusive<u8> = 1..=30;

/// One side of a comparison: a connection, a table identifier, and the
/// column layout the caller wants compared.
#[derive(Clone)]
pub struct Side {
    /// A short label used only in diagnostics (`"left"` / `"right"` by
    /// convention, but callers may supply anything).
    pub label: String,
    /// The already-connected database handle. Owned exclusively by this
    /// side — never shared with the other side, even in `parallel` mode.
    pub conn: std::sync::Arc<dyn crate::client::SqlConnection>,
    /// Possibly schema-qualified table identifier.
    pub table: String,
    /// Ordered primary-key column names.
    pub keys: Vec<String>,
    /// Ordered data column names to compare.
    pub cols: Vec<String>,
    /// Maximum storable length for the textual form of the key.
    pub keylen: u32,
}

impl Side {
    /// Construct a side with defaults (`keys = ["id"]`, `keylen = 255`)
    /// left for the caller to override.
    pub fn new(
        label: impl Into<String>,
        conn: std::sync::Arc<dyn crate::client::SqlConnection>,
        table: impl Into<String>,
    ) -> Self {
        Side {
            label: label.into(),
            conn,
            table: table.into(),
            keys: vec!["id".to_string()],
            cols: Vec::new(),
            keylen: DEFAULT_KEYLEN,
        }
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_cols(mut self, cols: Vec<String>) -> Self {
        self.cols = cols;
        self
    }

    pub fn with_keylen(mut self, keylen: u32) -> Self {
        self.keylen = keylen;
        self
    }

    /// Validate that this side carries everything a comparison needs.
    pub fn validate(&self) -> Result<(), CompareError> {
        if self.table.trim().is_empty() {
            return Err(CompareError::InvalidInput(format!(
                "{}: table identifier is required",
                self.label
            )));
        }
        if self.keys.is_empty() {
            return Err(CompareError::InvalidInput(format!(
                "{}: at least one key column is required",
                self.label
            )));
        }
        if self.cols.is_empty() {
            return Err(CompareError::InvalidInput(format!(
                "{}: at least one data column is required",
                self.label
            )));
        }
        Ok(())
    }
}

/// Options controlling how a comparison is built and walked. See
/// spec §3 for the authoritative defaults; this struct mirrors that
/// table field for field.
#[derive(Debug, Clone)]
pub struct CompareOptions {
    /// Folding factor: each summary level groups `2^factor` rows of the
    /// previous level. Clamped to `[1, 30]`.
    pub factor: u8,
    /// Cap on the number of cascade levels; `0` means uncapped.
    pub max_levels: u32,
    /// Maximum differing `idc`s carried between adjacent levels before the
    /// walk aborts with [`CompareError::EffortExceeded`]. `0` disables the
    /// check.
    pub max_report: u32,
    /// Separator used when composing multi-column keys. Feeds
    /// [`CompareOptionsBuilder::build`]'s default `concat_template` —
    /// `CONCAT_WS('<sep>',%s)` — unless the caller overrides
    /// `concat_template` directly. Constructing `CompareOptions` by hand
    /// rather than through the builder does not get this wiring; see
    /// [`CompareOptions::normalize`].
    pub sep: char,
    /// Optional boolean SQL predicate applied to both source tables when
    /// building level 0 (partial comparison).
    pub where_clause: Option<String>,
    /// Name prefix for intermediate tables.
    pub prefix: String,
    /// Template wrapping a column reference to map NULL to a sentinel,
    /// e.g. `"COALESCE(%s,'null')"`. Must contain exactly one `%s`.
    pub null_template: String,
    /// Template producing a single string from a comma-joined list of
    /// already-coalesced expressions, e.g. `"CONCAT_WS(':',%s)"`. Must
    /// contain exactly one `%s`.
    pub concat_template: String,
    /// Scalar SQL function mapping a string to an unsigned 32-bit integer.
    pub checksum_fn: String,
    /// XOR-like aggregate SQL function folding many checksums into one.
    pub aggregate_fn: String,
    /// Whether intermediate tables are created as session-scoped
    /// temporaries.
    pub temporary: bool,
    /// Whether to drop intermediate tables after processing. Defaults to
    /// `!temporary` — non-temporary tables are cleaned up explicitly,
    /// temporary ones die with the session anyway.
    pub cleanup: bool,
    /// Whether the two sides are processed concurrently.
    pub parallel: bool,
    /// If set, substituted for the level-0 `COUNT(*)` probe instead of
    /// issuing it.
    pub num_records: Option<u64>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        CompareOptions {
            factor: 7,
            max_levels: 0,
            max_report: 32,
            sep: ':',
            where_clause: None,
            prefix: "cmp".to_string(),
            null_template: "COALESCE(%s,'null')".to_string(),
            concat_template: "CONCAT_WS(':',%s)".to_string(),
            checksum_fn: "CRC32".to_string(),
            aggregate_fn: "BIT_XOR".to_string(),
            temporary: true,
            cleanup: false,
            parallel: false,
            num_records: None,
        }
    }
}

impl CompareOptions {
    /// Resolve derived defaults and clamp out-of-range values. Called once
    /// by [`crate::comparator::Comparator::new`]; nothing downstream
    /// re-derives these.
    pub fn normalize(mut self) -> Self {
        self.factor = self.factor.clamp(*FACTOR_RANGE.start(), *FACTOR_RANGE.end());
        if !self.cleanup_explicitly_set() {
            self.cleanup = !self.temporary;
        }
        self
    }

    /// `cleanup` defaults from `temporary`, but once a caller has set
    /// `temporary = false` and `cleanup` is still the type's construction
    /// default, we still want `cleanup = true`. Since `CompareOptions` has
    /// no separate "was this field touched" bit, [`CompareOptionsBuilder`]
    /// is the supported way to get that interaction right; this method
    /// exists so `normalize()` is idempotent for callers constructing the
    /// struct by hand.
    fn cleanup_explicitly_set(&self) -> bool {
        false
    }

    pub fn validate(&self) -> Result<(), CompareError> {
        if self.null_template.matches("%s").count() != 1 {
            return Err(CompareError::InvalidInput(format!(
                "null template must contain exactly one %s, got `{}`",
                self.null_template
            )));
        }
        if self.concat_template.matches("%s").count() != 1 {
            return Err(CompareError::InvalidInput(format!(
                "concat template must contain exactly one %s, got `{}`",
                self.concat_template
            )));
        }
        if self.checksum_fn.trim().is_empty() {
            return Err(CompareError::InvalidInput("checksum function name is required".into()));
        }
        if self.aggregate_fn.trim().is_empty() {
            return Err(CompareError::InvalidInput("aggregate function name is required".into()));
        }
        if self.prefix.trim().is_empty() {
            return Err(CompareError::InvalidInput("table name prefix is required".into()));
        }
        Ok(())
    }
}

/// Builder that gets the `temporary` → `cleanup` default interaction right
/// (`cleanup` defaults to `true` iff `temporary` is `false`) without
/// requiring callers to set both explicitly.
#[derive(Debug, Clone, Default)]
pub struct CompareOptionsBuilder {
    opts: CompareOptionsInner,
}

#[derive(Debug, Clone)]
struct CompareOptionsInner {
    factor: u8,
    max_levels: u32,
    max_report: u32,
    sep: char,
    where_clause: Option<String>,
    prefix: String,
    null_template: String,
    /// `None` until the caller explicitly overrides it, so `build()` can
    /// derive the default from `sep` rather than hard-coding `:` — setting
    /// `sep` alone (without touching `concat_template`) must actually
    /// change the separator the generated SQL uses.
    concat_template: Option<String>,
    checksum_fn: String,
    aggregate_fn: String,
    temporary: bool,
    cleanup: Option<bool>,
    parallel: bool,
    num_records: Option<u64>,
}

impl Default for CompareOptionsInner {
    fn default() -> Self {
        let d = CompareOptions::default();
        CompareOptionsInner {
            factor: d.factor,
            max_levels: d.max_levels,
            max_report: d.max_report,
            sep: d.sep,
            where_clause: d.where_clause,
            prefix: d.prefix,
            null_template: d.null_template,
            concat_template: None,
            checksum_fn: d.checksum_fn,
            aggregate_fn: d.aggregate_fn,
            temporary: d.temporary,
            cleanup: None,
            parallel: d.parallel,
            num_records: d.num_records,
        }
    }
}

macro_rules! builder_field {
    ($name:ident, $ty:ty) => {
        pub fn $name(mut self, value: $ty) -> Self {
            self.opts.$name = value;
            self
        }
    };
}

impl CompareOptionsBuilder {
    builder_field!(factor, u8);
    builder_field!(max_levels, u32);
    builder_field!(max_report, u32);
    builder_field!(sep, char);
    builder_field!(temporary, bool);
    builder_field!(parallel, bool);

    pub fn where_clause(mut self, clause: impl Into<String>) -> Self {
        self.opts.where_clause = Some(clause.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.opts.prefix = prefix.into();
        self
    }

    pub fn null_template(mut self, template: impl Into<String>) -> Self {
        self.opts.null_template = template.into();
        self
    }

    pub fn concat_template(mut self, template: impl Into<String>) -> Self {
        self.opts.concat_template = Some(template.into());
        self
    }

    pub fn checksum_fn(mut self, name: impl Into<String>) -> Self {
        self.opts.checksum_fn = name.into();
        self
    }

    pub fn aggregate_fn(mut self, name: impl Into<String>) -> Self {
        self.opts.aggregate_fn = name.into();
        self
    }

    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.opts.cleanup = Some(cleanup);
        self
    }

    pub fn num_records(mut self, count: u64) -> Self {
        self.opts.num_records = Some(count);
        self
    }

    pub fn build(self) -> CompareOptions {
        let inner = self.opts;
        let cleanup = inner.cleanup.unwrap_or(!inner.temporary);
        let concat_template = inner
            .concat_template
            .unwrap_or_else(|| format!("CONCAT_WS('{}',%s)", inner.sep));
        CompareOptions {
            factor: inner.factor.clamp(*FACTOR_RANGE.start(), *FACTOR_RANGE.end()),
            max_levels: inner.max_levels,
            max_report: inner.max_report,
            sep: inner.sep,
            where_clause: inner.where_clause,
            prefix: inner.prefix,
            null_template: inner.null_template,
            concat_template,
            checksum_fn: inner.checksum_fn,
            aggregate_fn: inner.aggregate_fn,
            temporary: inner.temporary,
            cleanup,
            parallel: inner.parallel,
            num_records: inner.num_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cleanup_follows_temporary() {
        let opts = CompareOptionsBuilder::default().temporary(false).build();
        assert!(opts.cleanup);

        let opts = CompareOptionsBuilder::default().temporary(true).build();
        assert!(!opts.cleanup);
    }

    #[test]
    fn test_explicit_cleanup_overrides_default() {
        let opts = CompareOptionsBuilder::default()
            .temporary(true)
            .cleanup(true)
            .build();
        assert!(opts.cleanup);
    }

    #[test]
    fn test_factor_clamped() {
        let opts = CompareOptionsBuilder::default().factor(0).build();
        assert_eq!(opts.factor, 1);

        let opts = CompareOptionsBuilder::default().factor(200).build();
        assert_eq!(opts.factor, 30);
    }

    #[test]
    fn test_sep_drives_default_concat_template() {
        let opts = CompareOptionsBuilder::default().sep('|').build();
        assert_eq!(opts.concat_template, "CONCAT_WS('|',%s)");
    }

    #[test]
    fn test_explicit_concat_template_overrides_sep() {
        let opts = CompareOptionsBuilder::default()
            .sep('|')
            .concat_template("CONCAT_WS('#',%s)")
            .build();
        assert_eq!(opts.concat_template, "CONCAT_WS('#',%s)");
    }

    #[test]
    fn test_template_validation_rejects_missing_placeholder() {
        let mut opts = CompareOptions::default();
        opts.null_template = "COALESCE(x,'null')".to_string();
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_template_validation_rejects_duplicate_placeholder() {
        let mut opts = CompareOptions::default();
        opts.concat_template = "CONCAT(%s, %s)".to_string();
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_template_validation_accepts_defaults() {
        assert!(CompareOptions::default().validate().is_ok());
    }
}
