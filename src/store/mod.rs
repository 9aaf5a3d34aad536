pub mod database;
pub mod schema;

pub use database::{Database, QueryResult};
pub use schema::{ColumnDef, ColumnType, ValueError};
