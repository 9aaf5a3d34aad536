use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::schema::DATE_FORMAT;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Report {
    TotalCasesByState,
    TotalDeathsByState,
    TotalsByState,
    /// Returns the whole daily table; the as-of date does not apply.
    DailyByState,
}

impl Report {
    pub const ALL: [Report; 4] = [
        Report::TotalCasesByState,
        Report::TotalDeathsByState,
        Report::TotalsByState,
        Report::DailyByState,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::TotalCasesByState => "total_cases_by_state",
            Self::TotalDeathsByState => "total_deaths_by_state",
            Self::TotalsByState => "totals_by_state",
            Self::DailyByState => "daily_by_state",
        }
    }

    pub fn default_output_file(&self) -> String {
        format!("{}.csv", self.key())
    }

    pub fn filters_by_as_of(&self) -> bool {
        !matches!(self, Self::DailyByState)
    }

    pub fn sql(&self, as_of: NaiveDate) -> String {
        let as_of = as_of.format(DATE_FORMAT);
        match self {
            Self::TotalCasesByState => format!(
                r#"SELECT date, state, cases,
       ROW_NUMBER() OVER (PARTITION BY date ORDER BY cases DESC) AS rank
FROM nytimes.total_cases_by_state
WHERE date = '{as_of}'
ORDER BY rank"#
            ),
            Self::TotalDeathsByState => format!(
                r#"SELECT date, state, deaths,
       ROW_NUMBER() OVER (PARTITION BY date ORDER BY deaths DESC) AS rank
FROM nytimes.total_cases_by_state
WHERE date = '{as_of}'
ORDER BY rank"#
            ),
            Self::TotalsByState => format!(
                r#"SELECT date, state, deaths, cases,
       ROW_NUMBER() OVER (PARTITION BY date ORDER BY cases DESC) AS rank
FROM nytimes.total_cases_by_state
WHERE date = '{as_of}'
ORDER BY rank"#
            ),
            Self::DailyByState => r#"SELECT date, state, new_deaths, new_cases
FROM nytimes.daily_by_state
ORDER BY date, state"#
                .to_string(),
        }
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown report: {0}")]
pub struct UnknownReport(pub String);

impl FromStr for Report {
    type Err = UnknownReport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|report| report.key() == s)
            .ok_or_else(|| UnknownReport(s.to_string()))
    }
}
