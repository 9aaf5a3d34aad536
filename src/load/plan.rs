use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::store::schema::{parse_date, ColumnType, ValueError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadPlan {
    Replace,
    Create,
    /// The table exists but holds no dated rows: load every row into it.
    Fill,
    Append { after: String },
}

impl LoadPlan {
    /// `latest` is only consulted when the table exists and no reload is forced.
    pub fn decide<E>(
        force_full: bool,
        table_exists: bool,
        latest: impl FnOnce() -> Result<Option<String>, E>,
    ) -> Result<Self, E> {
        if force_full {
            return Ok(Self::Replace);
        }
        if !table_exists {
            return Ok(Self::Create);
        }
        Ok(match latest()? {
            None => Self::Fill,
            Some(after) => Self::Append { after },
        })
    }

    pub fn is_full(&self) -> bool {
        !matches!(self, Self::Append { .. })
    }

    pub fn recreates_table(&self) -> bool {
        matches!(self, Self::Replace | Self::Create)
    }
}

impl Display for LoadPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replace => write!(f, "replace"),
            Self::Create => write!(f, "create"),
            Self::Fill => write!(f, "fill"),
            Self::Append { after } => write!(f, "append after {after}"),
        }
    }
}

/// Compares a row's date against the stored cutoff in the column's own order:
/// calendar, numeric, or lexical for text.
pub fn compare_to_cutoff(
    value: &str,
    cutoff: &str,
    column_type: ColumnType,
) -> Result<Ordering, ValueError> {
    match column_type {
        ColumnType::Date => Ok(parse_date(value.trim())?.cmp(&parse_date(cutoff.trim())?)),
        ColumnType::Integer => Ok(parse_integer(value)?.cmp(&parse_integer(cutoff)?)),
        ColumnType::Real => {
            let (a, b) = (parse_real(value)?, parse_real(cutoff)?);
            a.partial_cmp(&b)
                .ok_or_else(|| ValueError::new(ColumnType::Real, value))
        }
        ColumnType::Text => Ok(value.cmp(cutoff)),
    }
}

fn parse_integer(raw: &str) -> Result<i64, ValueError> {
    raw.trim()
        .parse()
        .map_err(|_| ValueError::new(ColumnType::Integer, raw))
}

fn parse_real(raw: &str) -> Result<f64, ValueError> {
    raw.trim()
        .parse()
        .map_err(|_| ValueError::new(ColumnType::Real, raw))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::cmp::Ordering;
    use std::convert::Infallible;

    use super::{compare_to_cutoff, LoadPlan};
    use crate::store::ColumnType;

    fn latest(value: Option<&str>) -> impl FnOnce() -> Result<Option<String>, Infallible> + '_ {
        move || Ok(value.map(str::to_string))
    }

    #[test]
    fn forced_reload_wins_over_every_table_state() {
        assert_eq!(
            LoadPlan::decide(true, true, latest(Some("2021-01-01"))).unwrap(),
            LoadPlan::Replace
        );
        assert_eq!(LoadPlan::decide(true, false, latest(None)).unwrap(), LoadPlan::Replace);
    }

    #[test]
    fn missing_table_is_created_without_reading_latest_date() {
        let called = Cell::new(false);
        let plan = LoadPlan::decide(false, false, || {
            called.set(true);
            Ok::<_, Infallible>(None)
        })
        .unwrap();
        assert_eq!(plan, LoadPlan::Create);
        assert!(!called.get());
    }

    #[test]
    fn existing_table_appends_after_latest_or_fills_when_empty() {
        assert_eq!(LoadPlan::decide(false, true, latest(None)).unwrap(), LoadPlan::Fill);
        assert_eq!(
            LoadPlan::decide(false, true, latest(Some("2021-01-01"))).unwrap(),
            LoadPlan::Append {
                after: "2021-01-01".to_string()
            }
        );
    }

    #[test]
    fn only_append_is_incremental() {
        assert!(LoadPlan::Replace.is_full());
        assert!(LoadPlan::Fill.is_full());
        assert!(!LoadPlan::Fill.recreates_table());
        assert!(!LoadPlan::Append { after: "x".into() }.is_full());
    }

    #[test]
    fn dates_compare_as_dates() {
        assert_eq!(
            compare_to_cutoff("2021-01-02", "2021-01-01", ColumnType::Date).unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            compare_to_cutoff("2021-01-10", "2021-01-09", ColumnType::Date).unwrap(),
            Ordering::Greater
        );
        assert!(compare_to_cutoff("yesterday", "2021-01-01", ColumnType::Date).is_err());
        assert_eq!(
            compare_to_cutoff("2021-01-01", "2021-01-01", ColumnType::Text).unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn numeric_columns_compare_as_numbers() {
        assert_eq!(
            compare_to_cutoff("9", "10", ColumnType::Integer).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare_to_cutoff("11", "10", ColumnType::Integer).unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            compare_to_cutoff("9.5", "10.0", ColumnType::Real).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare_to_cutoff("2", "1.5", ColumnType::Real).unwrap(),
            Ordering::Greater
        );
        assert!(compare_to_cutoff("nine", "10", ColumnType::Integer).is_err());
        assert_eq!(
            compare_to_cutoff("9", "10", ColumnType::Text).unwrap(),
            Ordering::Greater
        );
    }
}
