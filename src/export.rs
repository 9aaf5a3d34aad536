use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::output::csv::write_query_result;
use crate::reports::{QueryRegistry, Report};
use crate::store::Database;

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub report: Report,
    pub as_of: NaiveDate,
    pub path: PathBuf,
    pub rows: usize,
}

/// Runs registry reports and writes them under `{file_root}/output`.
pub struct FlatFileExporter<'a> {
    db: &'a Database,
    registry: &'a QueryRegistry,
    output_dir: PathBuf,
}

impl<'a> FlatFileExporter<'a> {
    pub fn new(db: &'a Database, registry: &'a QueryRegistry, file_root: &Path) -> Self {
        Self {
            db,
            registry,
            output_dir: file_root.join("output"),
        }
    }

    pub fn output_path(&self, output_filename: &str) -> PathBuf {
        self.output_dir.join(output_filename)
    }

    pub fn export(&self, report_key: &str, output_filename: &str) -> Result<ExportSummary> {
        let (report, sql) = self.registry.resolve_report(report_key)?;
        info!(%report, "running report query");
        info!(sql = %sql, "using sql");
        let result = self
            .db
            .query(&sql)
            .with_context(|| format!("report query {report} failed"))?;

        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("failed creating output directory: {}", self.output_dir.display())
        })?;
        let path = self.output_path(output_filename);
        info!(path = %path.display(), rows = result.rows.len(), "writing flat file");
        let file = File::create(&path)
            .with_context(|| format!("failed creating flat file: {}", path.display()))?;
        let rows = write_query_result(&result, BufWriter::new(file))
            .with_context(|| format!("failed writing flat file: {}", path.display()))?;
        info!(path = %path.display(), "done writing file");

        Ok(ExportSummary {
            report,
            as_of: self.registry.as_of(),
            path,
            rows,
        })
    }
}
