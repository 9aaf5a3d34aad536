use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::config::DerivedTableConfig;
use crate::store::Database;

#[derive(Debug, Clone, Serialize)]
pub struct DerivedOutcome {
    pub schema: String,
    pub table: String,
    pub total_rows: u64,
}

pub fn rebuild_derived_tables(
    db: &mut Database,
    schema: &str,
    derived: &[DerivedTableConfig],
) -> Result<Vec<DerivedOutcome>> {
    let mut outcomes = Vec::with_capacity(derived.len());
    for definition in derived {
        let table = definition.table.as_str();
        info!(schema, table, "rebuilding derived table");
        db.rebuild_table_as(schema, table, definition.sql.trim())
            .with_context(|| format!("failed rebuilding derived table {schema}.{table}"))?;
        let total_rows = db.row_count(schema, table)?;
        info!(schema, table, rows = total_rows, "derived table rebuilt");
        outcomes.push(DerivedOutcome {
            schema: schema.to_string(),
            table: table.to_string(),
            total_rows,
        });
    }
    Ok(outcomes)
}
