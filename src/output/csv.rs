use std::io::Write;

use anyhow::Result;

use crate::load::LoadOutcome;
use crate::store::QueryResult;

pub fn write_query_result<W: Write>(result: &QueryResult, out: W) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or_default()))?;
    }
    writer.flush()?;
    Ok(result.rows.len())
}

pub fn load_outcomes_to_csv(outcomes: &[LoadOutcome]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "schema",
        "table",
        "plan",
        "rows_read",
        "rows_inserted",
        "total_rows",
    ])?;
    for outcome in outcomes {
        writer.write_record([
            outcome.schema.clone(),
            outcome.table.clone(),
            outcome.plan.to_string(),
            outcome.rows_read.to_string(),
            outcome.rows_inserted.to_string(),
            outcome.total_rows.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

#[cfg(test)]
mod tests {
    use super::write_query_result;
    use crate::store::QueryResult;

    #[test]
    fn writes_header_even_without_rows() {
        let result = QueryResult {
            columns: vec!["date".into(), "state".into()],
            rows: vec![],
        };
        let mut buf = Vec::new();
        assert_eq!(write_query_result(&result, &mut buf).unwrap(), 0);
        assert_eq!(String::from_utf8(buf).unwrap(), "date,state\n");
    }

    #[test]
    fn quotes_fields_and_blanks_nulls() {
        let result = QueryResult {
            columns: vec!["state".into(), "cases".into()],
            rows: vec![vec![Some("Washington, D.C.".into()), None]],
        };
        let mut buf = Vec::new();
        write_query_result(&result, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "state,cases\n\"Washington, D.C.\",\n"
        );
    }
}
