//! Sample-to-row conversion contract
//!
//! A [`SampleSchema`] maps generic telemetry samples onto a concrete table
//! layout: it owns the table DDL, the positional INSERT statement, and the
//! per-sample conversion. Schemas are looked up by name in an explicit
//! [`SchemaRegistry`] built at startup; there is no global registration
//! state.
//!
//! Two implementations ship with the crate:
//! - [`TagMapSchema`] ("default") keeps the whole tag set in one map column.
//! - [`WideTagSchema`] ("wide") lifts well-known harness tags into typed
//!   columns and keeps the remainder in a residual map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::pool::RowPool;
use crate::sample::Sample;
use crate::store::StoreConnection;

/// A sample's tag set, pooled and reused across conversions
pub type TagMap = HashMap<String, String>;

/// One positional column value in a store row
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
    /// UTF-8 text
    Text(String),
    /// 64-bit float
    Double(f64),
    /// Unsigned integer
    UInt(u64),
    /// String-to-string map column
    Tags(TagMap),
}

/// A store-specific positional tuple produced from one sample
pub type Row = Vec<ColumnValue>;

/// Maximum accepted length for database and table identifiers
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Validate a database or table identifier
///
/// Identifiers are restricted to `[A-Za-z_][A-Za-z0-9_]*` with a bounded
/// length. Anything else is rejected outright rather than escaped, since
/// these names end up inside DDL and INSERT text.
pub fn validate_identifier(name: &str) -> Result<(), SinkError> {
    if name.is_empty() {
        return Err(SinkError::Config("identifier must not be empty".into()));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(SinkError::Config(format!(
            "identifier {name:?} exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('\0');
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(SinkError::Config(format!(
            "identifier {name:?} must start with a letter or underscore"
        )));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(SinkError::Config(format!(
            "identifier {name:?} contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

/// Conversion and table contract between the sink and a concrete layout
#[async_trait]
pub trait SampleSchema: Send + Sync {
    /// Registry name for this schema
    fn name(&self) -> &str;

    /// Create the target table if it does not exist
    ///
    /// Must be idempotent; the sink calls this on every start unless schema
    /// creation is disabled in config.
    async fn create_schema(
        &self,
        conn: &dyn StoreConnection,
        database: &str,
        table: &str,
    ) -> Result<(), SinkError>;

    /// Positional INSERT statement for the target table
    fn insert_statement(&self, database: &str, table: &str) -> String;

    /// Number of columns each converted row carries
    fn column_count(&self) -> usize;

    /// Convert one sample into a pooled row
    ///
    /// Conversion failures are deterministic: the same sample will never
    /// convert differently on a retry, so the caller skips it instead of
    /// retrying. On success the returned row is owned by the caller and
    /// must be released back to the pool exactly once after the write
    /// outcome is known.
    fn convert(&self, sample: &Sample, pool: &RowPool) -> Result<Row, SinkError>;
}

impl std::fmt::Debug for dyn SampleSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleSchema")
            .field("name", &self.name())
            .finish()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Explicit, ordered schema registry built at startup
pub struct SchemaRegistry {
    entries: Vec<(String, Arc<dyn SampleSchema>)>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Create a registry with the built-in schemas registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TagMapSchema));
        registry.register(Arc::new(WideTagSchema));
        registry
    }

    /// Register a schema under its own name, replacing any previous entry
    pub fn register(&mut self, schema: Arc<dyn SampleSchema>) {
        let name = schema.name().to_string();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = schema;
        } else {
            self.entries.push((name, schema));
        }
    }

    /// Resolve a schema by name
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn SampleSchema>, SinkError> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| Arc::clone(s))
            .ok_or_else(|| SinkError::UnknownSchema {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// Registered schema names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no schemas are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// =============================================================================
// Built-in schemas
// =============================================================================

/// Default schema: all tags in one map column
///
/// Columns: ts, metric, kind, value, tags.
pub struct TagMapSchema;

#[async_trait]
impl SampleSchema for TagMapSchema {
    fn name(&self) -> &str {
        "default"
    }

    async fn create_schema(
        &self,
        conn: &dyn StoreConnection,
        database: &str,
        table: &str,
    ) -> Result<(), SinkError> {
        validate_identifier(database)?;
        validate_identifier(table)?;
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {database}.{table} (\
             ts DateTime64(3), \
             metric LowCardinality(String), \
             kind LowCardinality(String), \
             value Float64, \
             tags Map(String, String)\
             ) ENGINE = MergeTree() ORDER BY (metric, ts)"
        );
        conn.execute(&ddl).await?;
        Ok(())
    }

    fn insert_statement(&self, database: &str, table: &str) -> String {
        format!(
            "INSERT INTO {database}.{table} (ts, metric, kind, value, tags) \
             VALUES (?, ?, ?, ?, ?)"
        )
    }

    fn column_count(&self) -> usize {
        5
    }

    fn convert(&self, sample: &Sample, pool: &RowPool) -> Result<Row, SinkError> {
        if !sample.value.is_finite() {
            return Err(SinkError::Conversion(format!(
                "metric {:?} has non-finite value {}",
                sample.metric, sample.value
            )));
        }

        let mut tags = pool.get_tags();
        tags.extend(sample.tags.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut row = pool.get_row();
        row.push(ColumnValue::Timestamp(sample.timestamp_ms));
        row.push(ColumnValue::Text(sample.metric.clone()));
        row.push(ColumnValue::Text(sample.kind.as_str().to_string()));
        row.push(ColumnValue::Double(sample.value));
        row.push(ColumnValue::Tags(tags));
        Ok(row)
    }
}

/// Tags lifted into typed columns by [`WideTagSchema`]
const WIDE_KNOWN_TAGS: &[&str] = &["scenario", "group", "url", "method", "check"];

/// Wide schema: well-known harness tags as typed columns
///
/// Columns: ts, metric, kind, value, scenario, group, url, method, check,
/// status (numeric), extra_tags. The `status` tag must parse as an unsigned
/// integer; a non-numeric value is a conversion failure.
pub struct WideTagSchema;

#[async_trait]
impl SampleSchema for WideTagSchema {
    fn name(&self) -> &str {
        "wide"
    }

    async fn create_schema(
        &self,
        conn: &dyn StoreConnection,
        database: &str,
        table: &str,
    ) -> Result<(), SinkError> {
        validate_identifier(database)?;
        validate_identifier(table)?;
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {database}.{table} (\
             ts DateTime64(3), \
             metric LowCardinality(String), \
             kind LowCardinality(String), \
             value Float64, \
             scenario LowCardinality(String), \
             group String, \
             url String, \
             method LowCardinality(String), \
             check String, \
             status UInt64, \
             extra_tags Map(String, String)\
             ) ENGINE = MergeTree() ORDER BY (metric, ts)"
        );
        conn.execute(&ddl).await?;
        Ok(())
    }

    fn insert_statement(&self, database: &str, table: &str) -> String {
        format!(
            "INSERT INTO {database}.{table} \
             (ts, metric, kind, value, scenario, group, url, method, check, status, extra_tags) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
    }

    fn column_count(&self) -> usize {
        11
    }

    fn convert(&self, sample: &Sample, pool: &RowPool) -> Result<Row, SinkError> {
        if !sample.value.is_finite() {
            return Err(SinkError::Conversion(format!(
                "metric {:?} has non-finite value {}",
                sample.metric, sample.value
            )));
        }

        // Fallible work first, so no pooled storage is held on the error path.
        let status = match sample.tags.get("status") {
            None => 0,
            Some(s) => s.parse::<u64>().map_err(|_| {
                SinkError::Conversion(format!(
                    "tag \"status\" is not numeric: {s:?} (metric {:?})",
                    sample.metric
                ))
            })?,
        };

        let mut extra = pool.get_tags();
        for (k, v) in &sample.tags {
            if k != "status" && !WIDE_KNOWN_TAGS.contains(&k.as_str()) {
                extra.insert(k.clone(), v.clone());
            }
        }

        let tag = |key: &str| sample.tags.get(key).cloned().unwrap_or_default();

        let mut row = pool.get_row();
        row.push(ColumnValue::Timestamp(sample.timestamp_ms));
        row.push(ColumnValue::Text(sample.metric.clone()));
        row.push(ColumnValue::Text(sample.kind.as_str().to_string()));
        row.push(ColumnValue::Double(sample.value));
        for key in WIDE_KNOWN_TAGS {
            row.push(ColumnValue::Text(tag(key)));
        }
        row.push(ColumnValue::UInt(status));
        row.push(ColumnValue::Tags(extra));
        Ok(row)
    }
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod schema_test;
