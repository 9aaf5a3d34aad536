pub mod input;
pub mod plan;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::load::input::{line_of, DataFile};
use crate::store::{ColumnDef, ColumnType, Database, ValueError};

pub use plan::LoadPlan;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed opening data file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed data file {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
    #[error("column {column:?} not found in data file header")]
    MissingColumn { column: String },
    #[error("columns {found:?} do not match {expected:?} for table {table}")]
    SchemaMismatch {
        table: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("line {line}, column {column:?}: {source}")]
    InvalidValue {
        line: u64,
        column: String,
        source: ValueError,
    },
    #[error("stored latest value in {table} is unusable: {source}")]
    StoredValue { table: String, source: ValueError },
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub schema: String,
    pub table: String,
    pub data_file: PathBuf,
    pub date_column: String,
    /// Declared table shape. Empty means every header column is text.
    pub columns: Vec<ColumnDef>,
    pub force_full: bool,
}

impl LoadRequest {
    pub fn new(schema: &str, table: &str, data_file: impl Into<PathBuf>) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            data_file: data_file.into(),
            date_column: "date".to_string(),
            columns: Vec::new(),
            force_full: false,
        }
    }

    pub fn with_date_column(mut self, column: &str) -> Self {
        self.date_column = column.to_string();
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnDef>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_force_full(mut self, force_full: bool) -> Self {
        self.force_full = force_full;
        self
    }

    fn column_type(&self, name: &str) -> ColumnType {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
            .unwrap_or_default()
    }

    fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadOutcome {
    pub schema: String,
    pub table: String,
    pub plan: LoadPlan,
    pub rows_read: usize,
    pub rows_inserted: usize,
    pub total_rows: u64,
}

pub struct TableLoader<'a> {
    db: &'a mut Database,
}

impl<'a> TableLoader<'a> {
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    pub fn load(&mut self, request: &LoadRequest) -> Result<LoadOutcome, LoadError> {
        let schema = request.schema.as_str();
        let table = request.table.as_str();
        info!(schema, table, file = %request.data_file.display(), "reading data file");
        let data = DataFile::read(&request.data_file)?;

        let exists = self.db.table_exists(schema, table)?;
        info!(schema, table, exists, "checked table");
        let plan = LoadPlan::decide(request.force_full, exists, || {
            self.db.max_value(schema, table, &request.date_column)
        })?;

        let rows_inserted = match &plan {
            LoadPlan::Replace | LoadPlan::Create => {
                info!(schema, table, %plan, "initializing full load");
                let columns = table_shape(request, &data)?;
                let rows = data.typed_rows(&data.records, &header_types(request, &data))?;
                self.db.replace_table(schema, table, &columns, &rows)?
            }
            LoadPlan::Fill => {
                info!(schema, table, "table is empty, loading every row");
                self.ensure_header_matches_table(request, &data)?;
                let rows = data.typed_rows(&data.records, &header_types(request, &data))?;
                self.db
                    .append_rows(schema, table, &data.header_refs(), &rows)?
            }
            LoadPlan::Append { after } => {
                info!(schema, table, after = %after, "initializing incremental load");
                let fresh = newer_records(request, &data, after)?;
                self.ensure_header_matches_table(request, &data)?;
                info!(schema, table, rows = fresh.len(), "appending new rows");
                let rows = data.typed_rows(fresh, &header_types(request, &data))?;
                self.db
                    .append_rows(schema, table, &data.header_refs(), &rows)?
            }
        };

        let total_rows = self.db.row_count(schema, table)?;
        if plan.is_full() {
            info!(schema, table, rows = total_rows, "loaded table fully");
        } else {
            info!(schema, table, appended = rows_inserted, "done appending");
        }

        Ok(LoadOutcome {
            schema: request.schema.clone(),
            table: request.table.clone(),
            plan,
            rows_read: data.records.len(),
            rows_inserted,
            total_rows,
        })
    }

    fn ensure_header_matches_table(
        &self,
        request: &LoadRequest,
        data: &DataFile,
    ) -> Result<(), LoadError> {
        let existing = self.db.table_columns(&request.schema, &request.table)?;
        ensure_same_columns(&request.qualified_name(), existing, &data.header)
    }
}

/// Shape used when the table is (re)created: the declared columns, or text
/// columns named after the header.
fn table_shape(request: &LoadRequest, data: &DataFile) -> Result<Vec<ColumnDef>, LoadError> {
    if request.columns.is_empty() {
        return Ok(data.header.iter().map(ColumnDef::text).collect());
    }
    let declared = request.columns.iter().map(|c| c.name.clone()).collect();
    ensure_same_columns(&request.qualified_name(), declared, &data.header)?;
    Ok(request.columns.clone())
}

fn header_types(request: &LoadRequest, data: &DataFile) -> Vec<ColumnType> {
    data.header
        .iter()
        .map(|name| request.column_type(name))
        .collect()
}

fn ensure_same_columns(
    table: &str,
    expected: Vec<String>,
    found: &[String],
) -> Result<(), LoadError> {
    let expected_set: BTreeSet<&str> = expected.iter().map(String::as_str).collect();
    let found_set: BTreeSet<&str> = found.iter().map(String::as_str).collect();
    if expected_set == found_set && expected.len() == found.len() {
        return Ok(());
    }
    Err(LoadError::SchemaMismatch {
        table: table.to_string(),
        expected,
        found: found.to_vec(),
    })
}

fn newer_records<'d>(
    request: &LoadRequest,
    data: &'d DataFile,
    after: &str,
) -> Result<Vec<&'d csv::StringRecord>, LoadError> {
    let idx = data
        .column_index(&request.date_column)
        .ok_or_else(|| LoadError::MissingColumn {
            column: request.date_column.clone(),
        })?;
    let date_type = request.column_type(&request.date_column);
    date_type
        .parse_value(after)
        .map_err(|source| LoadError::StoredValue {
            table: request.qualified_name(),
            source,
        })?;

    let mut fresh = Vec::new();
    for record in &data.records {
        let value = record.get(idx).unwrap_or_default();
        // blank dates load as NULL, which max() never returns, so they are never newer
        if value.is_empty() {
            continue;
        }
        let ordering = plan::compare_to_cutoff(value, after, date_type).map_err(|source| {
            LoadError::InvalidValue {
                line: line_of(record),
                column: request.date_column.clone(),
                source,
            }
        })?;
        if ordering == Ordering::Greater {
            fresh.push(record);
        }
    }
    Ok(fresh)
}
