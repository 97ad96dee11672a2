//! SQL dialect adapter.
//!
//! Parameterizes every piece of SQL this crate emits: how a single column
//! reference is coalesced past NULL, how a list of coalesced expressions is
//! concatenated into one string, which scalar function computes a checksum,
//! and which aggregate folds many checksums into one (required to be
//! XOR-like: associative, commutative, and self-cancelling on removal).
//!
//! Substitution is purely lexical — a [`Template`] is checked once, at
//! construction, to contain exactly one `%s`, and is only ever applied to
//! operator-controlled configuration strings, never to caller row data.
//! Injection risk from the *table/column identifiers* supplied in
//! [`crate::options::Side`] remains the caller's responsibility, same as in
//! the specification this adapter implements.

use crate::error::CompareError;

/// A printf-style template containing exactly one `%s` substitution point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template(String);

impl Template {
    /// Validate and wrap a template string. Rejects anything that doesn't
    /// have exactly one `%s`, so a malformed operator-supplied template
    /// fails fast at construction rather than producing broken SQL later.
    pub fn new(template: impl Into<String>) -> Result<Self, CompareError> {
        let template = template.into();
        if template.matches("%s").count() != 1 {
            return Err(CompareError::InvalidInput(format!(
                "template must contain exactly one %s, got `{template}`"
            )));
        }
        Ok(Template(template))
    }

    /// Render the template with `value` substituted for `%s`.
    pub fn render(&self, value: &str) -> String {
        self.0.replacen("%s", value, 1)
    }
}

/// The SQL dialect in effect for one comparison: NULL-coalescing and
/// concatenation templates, plus the checksum/aggregate function names.
/// Both sides of a comparison must use an identical dialect — see spec §3
/// invariants — otherwise their summary cascades are not comparable.
#[derive(Debug, Clone)]
pub struct Dialect {
    null_template: Template,
    concat_template: Template,
    checksum_fn: String,
    aggregate_fn: String,
}

impl Dialect {
    pub fn new(
        null_template: &str,
        concat_template: &str,
        checksum_fn: impl Into<String>,
        aggregate_fn: impl Into<String>,
    ) -> Result<Self, CompareError> {
        Ok(Dialect {
            null_template: Template::new(null_template)?,
            concat_template: Template::new(concat_template)?,
            checksum_fn: checksum_fn.into(),
            aggregate_fn: aggregate_fn.into(),
        })
    }

    pub fn from_options(opts: &crate::options::CompareOptions) -> Result<Self, CompareError> {
        Dialect::new(
            &opts.null_template,
            &opts.concat_template,
            opts.checksum_fn.clone(),
            opts.aggregate_fn.clone(),
        )
    }

    /// Wrap a single column reference so NULL maps to a sentinel string,
    /// e.g. `coalesced("name")` → `COALESCE(name,'null')`.
    pub fn coalesced(&self, col: &str) -> String {
        self.null_template.render(col)
    }

    /// Produce a single SQL expression that concatenates the coalesced
    /// form of every listed column, in order.
    pub fn concat(&self, cols: &[String]) -> String {
        let joined = cols
            .iter()
            .map(|c| self.coalesced(c))
            .collect::<Vec<_>>()
            .join(",");
        self.concat_template.render(&joined)
    }

    /// The textual key expression: `concat(keys)`.
    pub fn concat_key(&self, keys: &[String]) -> String {
        self.concat(keys)
    }

    /// The textual key-and-data expression: `concat(keys ++ cols)`. Folding
    /// the key into the row checksum is mandatory (spec §3) — otherwise
    /// swapping two rows' non-key values between two keys would not be
    /// detected.
    pub fn concat_all(&self, keys: &[String], cols: &[String]) -> String {
        let mut all = Vec::with_capacity(keys.len() + cols.len());
        all.extend(keys.iter().cloned());
        all.extend(cols.iter().cloned());
        self.concat(&all)
    }

    /// Wrap an expression in the configured scalar checksum function.
    pub fn checksum(&self, expr: &str) -> String {
        format!("{}({})", self.checksum_fn, expr)
    }

    /// Wrap a column name in the configured XOR-like aggregate function.
    pub fn aggregate(&self, expr: &str) -> String {
        format!("{}({})", self.aggregate_fn, expr)
    }

    /// `TEMPORARY` or the empty string, depending on the option.
    pub fn temporary_keyword(temporary: bool) -> &'static str {
        if temporary { "TEMPORARY" } else { "" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_rejects_missing_placeholder() {
        assert!(Template::new("no placeholder here").is_err());
    }

    #[test]
    fn test_template_rejects_duplicate_placeholder() {
        assert!(Template::new("%s and %s").is_err());
    }

    #[test]
    fn test_template_renders_single_substitution() {
        let t = Template::new("COALESCE(%s,'null')").unwrap();
        assert_eq!(t.render("name"), "COALESCE(name,'null')");
    }

    fn default_dialect() -> Dialect {
        Dialect::new("COALESCE(%s,'null')", "CONCAT_WS(':',%s)", "CRC32", "BIT_XOR").unwrap()
    }

    #[test]
    fn test_coalesced() {
        let d = default_dialect();
        assert_eq!(d.coalesced("name"), "COALESCE(name,'null')");
    }

    #[test]
    fn test_concat_key_multi_column() {
        let d = default_dialect();
        let keys = vec!["schoolid".to_string(), "student_id".to_string()];
        assert_eq!(
            d.concat_key(&keys),
            "CONCAT_WS(':',COALESCE(schoolid,'null'),COALESCE(student_id,'null'))"
        );
    }

    #[test]
    fn test_concat_all_includes_keys_before_cols() {
        let d = default_dialect();
        let keys = vec!["id".to_string()];
        let cols = vec!["name".to_string(), "age".to_string()];
        let expr = d.concat_all(&keys, &cols);
        assert_eq!(
            expr,
            "CONCAT_WS(':',COALESCE(id,'null'),COALESCE(name,'null'),COALESCE(age,'null'))"
        );
    }

    #[test]
    fn test_checksum_and_aggregate_wrap_function_names() {
        let d = default_dialect();
        assert_eq!(d.checksum("x"), "CRC32(x)");
        assert_eq!(d.aggregate("cks"), "BIT_XOR(cks)");
    }

    #[test]
    fn test_temporary_keyword() {
        assert_eq!(Dialect::temporary_keyword(true), "TEMPORARY");
        assert_eq!(Dialect::temporary_keyword(false), "");
    }
}
