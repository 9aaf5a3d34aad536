use std::fs;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::config::{Config, SourceConfig};
use crate::derived::{rebuild_derived_tables, DerivedOutcome};
use crate::load::{LoadOutcome, LoadRequest, TableLoader};
use crate::store::Database;
use crate::sync::{SourceSync, SyncOutcome, Vcs};

/// Opens the main database and attaches one file per configured source schema.
pub fn open_database(config: &Config) -> Result<Database> {
    let db_path = config.resolved_db_path();
    info!(path = %db_path.display(), "opening database");
    let db = Database::open(&db_path)?;
    for schema in config.sources.keys() {
        let schema_path = config.schema_db_path(schema);
        if let Some(parent) = schema_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating schema directory: {}", parent.display())
            })?;
        }
        db.attach_schema(schema, Some(&schema_path))
            .with_context(|| format!("failed attaching schema {schema}"))?;
    }
    Ok(db)
}

pub fn sync_source<V: Vcs>(
    sync: &SourceSync<V>,
    schema: &str,
    source: &SourceConfig,
) -> Result<SyncOutcome> {
    info!(schema, url = %source.git_url, "syncing source");
    let outcome = sync.sync(&source.resolved_local_path(), &source.git_url)?;
    outcome
        .ensure_success()
        .with_context(|| format!("source {schema} could not be synced"))?;
    Ok(outcome)
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceLoadReport {
    pub schema: String,
    pub loads: Vec<LoadOutcome>,
    pub derived: Vec<DerivedOutcome>,
}

pub fn load_source(
    db: &mut Database,
    schema: &str,
    source: &SourceConfig,
    only_table: Option<&str>,
    force_full: bool,
) -> Result<SourceLoadReport> {
    let datasets = match only_table {
        Some(table) => vec![source.dataset(table)?],
        None => source.datasets.iter().collect(),
    };

    let mut loads = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        let request = LoadRequest::new(schema, &dataset.table, source.data_file(dataset))
            .with_date_column(&dataset.date_column)
            .with_columns(dataset.columns.clone())
            .with_force_full(force_full);
        let outcome = TableLoader::new(db)
            .load(&request)
            .with_context(|| format!("failed loading {schema}.{}", dataset.table))?;
        loads.push(outcome);
    }

    let derived = rebuild_derived_tables(db, schema, &source.derived)?;
    Ok(SourceLoadReport {
        schema: schema.to_string(),
        loads,
        derived,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatus {
    pub schema: String,
    pub table: String,
    pub exists: bool,
    pub rows: u64,
    pub latest: Option<String>,
}

pub fn dataset_status(
    db: &Database,
    schema: &str,
    source: &SourceConfig,
) -> Result<Vec<DatasetStatus>> {
    let mut out = Vec::with_capacity(source.datasets.len());
    for dataset in &source.datasets {
        let exists = db.table_exists(schema, &dataset.table)?;
        let (rows, latest) = if exists {
            (
                db.row_count(schema, &dataset.table)?,
                db.max_value(schema, &dataset.table, &dataset.date_column)?,
            )
        } else {
            (0, None)
        };
        out.push(DatasetStatus {
            schema: schema.to_string(),
            table: dataset.table.clone(),
            exists,
            rows,
            latest,
        });
    }
    Ok(out)
}
