pub mod queries;

use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;

pub use queries::{Report, UnknownReport};

/// Reports query data this many days old, which the source has stopped revising.
pub const AS_OF_LAG_DAYS: i64 = 2;

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub key: &'static str,
    pub default_output: String,
    pub filtered_to_as_of: bool,
    pub sql: String,
}

/// Resolves report keys to SQL with the as-of date fixed at construction.
#[derive(Debug, Clone)]
pub struct QueryRegistry {
    as_of: NaiveDate,
}

impl QueryRegistry {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    pub fn for_today(today: NaiveDate) -> Self {
        Self::new(today - Duration::days(AS_OF_LAG_DAYS))
    }

    pub fn from_local_clock() -> Self {
        Self::for_today(Local::now().date_naive())
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn resolve(&self, report_key: &str) -> Result<String, UnknownReport> {
        self.resolve_report(report_key).map(|(_, sql)| sql)
    }

    pub fn resolve_report(&self, report_key: &str) -> Result<(Report, String), UnknownReport> {
        let report: Report = report_key.parse()?;
        Ok((report, self.sql(report)))
    }

    pub fn sql(&self, report: Report) -> String {
        report.sql(self.as_of)
    }

    pub fn entries(&self) -> Vec<ReportEntry> {
        Report::ALL
            .iter()
            .map(|report| ReportEntry {
                key: report.key(),
                default_output: report.default_output_file(),
                filtered_to_as_of: report.filters_by_as_of(),
                sql: self.sql(*report),
            })
            .collect()
    }
}
