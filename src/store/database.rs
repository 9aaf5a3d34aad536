use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Transaction};
use serde::Serialize;
use tracing::debug;

use crate::store::schema::{qualified, quote_ident, value_to_string, ColumnDef};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A single SQLite connection with one attached database per source schema.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating database directory: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed opening database: {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Attaches `schema` backed by the file at `path`, or by a private
    /// in-memory database when `path` is `None`. Already attached schemas
    /// are left alone.
    pub fn attach_schema(&self, schema: &str, path: Option<&Path>) -> rusqlite::Result<()> {
        if self.attached_schemas()?.iter().any(|name| name == schema) {
            return Ok(());
        }
        let location = path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ":memory:".to_string());
        debug!(schema, location = %location, "attaching schema");
        self.conn.execute(
            &format!("ATTACH DATABASE ?1 AS {}", quote_ident(schema)),
            params![location],
        )?;
        Ok(())
    }

    pub fn attached_schemas(&self) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self.conn.prepare("PRAGMA database_list")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub fn table_exists(&self, schema: &str, table: &str) -> rusqlite::Result<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {}.sqlite_master WHERE type = 'table' AND name = ?1)",
            quote_ident(schema)
        );
        self.conn.query_row(&sql, params![table], |row| row.get(0))
    }

    pub fn table_columns(&self, schema: &str, table: &str) -> rusqlite::Result<Vec<String>> {
        let sql = format!(
            "PRAGMA {}.table_info({})",
            quote_ident(schema),
            quote_ident(table)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    pub fn max_value(
        &self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> rusqlite::Result<Option<String>> {
        let sql = format!(
            "SELECT max({}) FROM {}",
            quote_ident(column),
            qualified(schema, table)
        );
        self.conn
            .query_row(&sql, [], |row| Ok(value_to_string(row.get_ref(0)?)))
    }

    pub fn row_count(&self, schema: &str, table: &str) -> rusqlite::Result<u64> {
        let sql = format!("SELECT count(*) FROM {}", qualified(schema, table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Drops any table named `table`, recreates it from `columns` and inserts
    /// `rows`, all in one transaction.
    pub fn replace_table(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[ColumnDef],
        rows: &[Vec<Value>],
    ) -> rusqlite::Result<usize> {
        let tx = self.conn.transaction()?;
        let target = qualified(schema, table);
        tx.execute(&format!("DROP TABLE IF EXISTS {target}"), [])?;
        let column_sql = columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");
        tx.execute(&format!("CREATE TABLE {target} ({column_sql})"), [])?;
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let inserted = insert_rows(&tx, &target, &names, rows)?;
        tx.commit()?;
        Ok(inserted)
    }

    pub fn append_rows(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[&str],
        rows: &[Vec<Value>],
    ) -> rusqlite::Result<usize> {
        let tx = self.conn.transaction()?;
        let inserted = insert_rows(&tx, &qualified(schema, table), columns, rows)?;
        tx.commit()?;
        Ok(inserted)
    }

    pub fn rebuild_table_as(
        &mut self,
        schema: &str,
        table: &str,
        select_sql: &str,
    ) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        let target = qualified(schema, table);
        tx.execute(&format!("DROP TABLE IF EXISTS {target}"), [])?;
        tx.execute(&format!("CREATE TABLE {target} AS {select_sql}"), [])?;
        tx.commit()
    }

    pub fn query(&self, sql: &str) -> rusqlite::Result<QueryResult> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(value_to_string(row.get_ref(idx)?));
            }
            rows.push(values);
        }
        Ok(QueryResult { columns, rows })
    }

    pub fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(sql)
    }
}

fn insert_rows(
    tx: &Transaction<'_>,
    target: &str,
    columns: &[&str],
    rows: &[Vec<Value>],
) -> rusqlite::Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = tx.prepare(&format!(
        "INSERT INTO {target} ({column_list}) VALUES ({placeholders})"
    ))?;
    let mut inserted = 0usize;
    for row in rows {
        inserted += stmt.execute(params_from_iter(row.iter()))?;
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use rusqlite::types::Value;

    use super::Database;
    use crate::store::schema::{ColumnDef, ColumnType};

    fn db() -> Database {
        let db = Database::open_in_memory().expect("open in-memory db");
        db.attach_schema("nytimes", None).expect("attach schema");
        db
    }

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("date", ColumnType::Date),
            ColumnDef::text("state"),
            ColumnDef::new("cases", ColumnType::Integer),
        ]
    }

    fn row(date: &str, state: &str, cases: i64) -> Vec<Value> {
        vec![
            Value::Text(date.to_string()),
            Value::Text(state.to_string()),
            Value::Integer(cases),
        ]
    }

    #[test]
    fn attaching_twice_is_a_no_op() {
        let db = db();
        db.attach_schema("nytimes", None).expect("second attach");
        let schemas = db.attached_schemas().expect("list schemas");
        assert_eq!(schemas.iter().filter(|s| *s == "nytimes").count(), 1);
    }

    #[test]
    fn replace_table_creates_and_reports_shape() {
        let mut db = db();
        assert!(!db.table_exists("nytimes", "cases").unwrap());
        let inserted = db
            .replace_table("nytimes", "cases", &columns(), &[row("2021-01-01", "CA", 100)])
            .expect("replace table");
        assert_eq!(inserted, 1);
        assert!(db.table_exists("nytimes", "cases").unwrap());
        assert_eq!(
            db.table_columns("nytimes", "cases").unwrap(),
            vec!["date", "state", "cases"]
        );
        assert_eq!(
            db.max_value("nytimes", "cases", "date").unwrap().as_deref(),
            Some("2021-01-01")
        );
    }

    #[test]
    fn max_value_is_none_for_empty_table() {
        let mut db = db();
        db.replace_table("nytimes", "cases", &columns(), &[]).unwrap();
        assert_eq!(db.row_count("nytimes", "cases").unwrap(), 0);
        assert_eq!(db.max_value("nytimes", "cases", "date").unwrap(), None);
    }

    #[test]
    fn failed_append_rolls_back() {
        let mut db = db();
        db.replace_table("nytimes", "cases", &columns(), &[row("2021-01-01", "CA", 100)])
            .unwrap();
        let bad = vec![row("2021-01-02", "CA", 5), vec![Value::Null]];
        let err = db.append_rows("nytimes", "cases", &["date", "state", "cases"], &bad);
        assert!(err.is_err());
        assert_eq!(db.row_count("nytimes", "cases").unwrap(), 1);
    }

    #[test]
    fn query_preserves_order_and_nulls() {
        let mut db = db();
        db.replace_table(
            "nytimes",
            "cases",
            &columns(),
            &[
                row("2021-01-01", "CA", 100),
                vec![Value::Text("2021-01-01".into()), Value::Text("NY".into()), Value::Null],
            ],
        )
        .unwrap();
        let result = db
            .query("SELECT state, cases FROM nytimes.cases ORDER BY state DESC")
            .unwrap();
        assert_eq!(result.columns, vec!["state", "cases"]);
        assert_eq!(
            result.rows,
            vec![
                vec![Some("NY".to_string()), None],
                vec![Some("CA".to_string()), Some("100".to_string())],
            ]
        );
    }
}
