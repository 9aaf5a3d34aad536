use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use crate::export::ExportSummary;
use crate::pipeline::{DatasetStatus, SourceLoadReport};
use crate::reports::ReportEntry;
use crate::sync::SyncOutcome;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

pub fn render_sync_table(outcomes: &[(String, SyncOutcome)]) -> String {
    let mut table = new_table(vec!["Source", "Action", "Path", "Result"]);
    for (schema, outcome) in outcomes {
        let result = if outcome.success {
            Cell::new("OK").fg(Color::Green)
        } else {
            Cell::new("FAILED").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(schema),
            Cell::new(outcome.action.to_string()),
            Cell::new(outcome.local_path.display().to_string()),
            result,
        ]);
    }
    table.to_string()
}

pub fn render_load_table(reports: &[SourceLoadReport]) -> String {
    let mut table = new_table(vec!["Table", "Plan", "Read", "Inserted", "Total Rows"]);
    for report in reports {
        for load in &report.loads {
            table.add_row(vec![
                format!("{}.{}", load.schema, load.table),
                load.plan.to_string(),
                load.rows_read.to_string(),
                load.rows_inserted.to_string(),
                load.total_rows.to_string(),
            ]);
        }
        for derived in &report.derived {
            table.add_row(vec![
                format!("{}.{}", derived.schema, derived.table),
                "derived".to_string(),
                "-".to_string(),
                "-".to_string(),
                derived.total_rows.to_string(),
            ]);
        }
    }
    table.to_string()
}

pub fn render_status_table(statuses: &[DatasetStatus]) -> String {
    let mut table = new_table(vec!["Table", "Exists", "Rows", "Latest"]);
    for status in statuses {
        let exists = if status.exists {
            Cell::new("YES").fg(Color::Green)
        } else {
            Cell::new("NO").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(format!("{}.{}", status.schema, status.table)),
            exists,
            Cell::new(status.rows),
            Cell::new(status.latest.as_deref().unwrap_or("-")),
        ]);
    }
    table.to_string()
}

pub fn render_reports_table(entries: &[ReportEntry]) -> String {
    let mut table = new_table(vec!["Report", "Default Output", "Uses As-Of Date"]);
    for entry in entries {
        table.add_row(vec![
            entry.key.to_string(),
            entry.default_output.clone(),
            if entry.filtered_to_as_of { "yes" } else { "no" }.to_string(),
        ]);
    }
    table.to_string()
}

pub fn render_export_table(summary: &ExportSummary) -> String {
    let mut table = new_table(vec!["Report", "As Of", "Rows", "Path"]);
    table.add_row(vec![
        summary.report.to_string(),
        summary.as_of.to_string(),
        summary.rows.to_string(),
        summary.path.display().to_string(),
    ]);
    table.to_string()
}
