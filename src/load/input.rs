use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use rusqlite::types::Value;

use crate::load::LoadError;
use crate::store::ColumnType;

#[derive(Debug, Clone)]
pub struct DataFile {
    pub path: PathBuf,
    pub header: Vec<String>,
    pub records: Vec<StringRecord>,
}

impl DataFile {
    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let csv_err = |source: csv::Error| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::Headers)
            .from_reader(BufReader::new(file));
        let header = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_string)
            .collect();
        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(csv_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            header,
            records,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn header_refs(&self) -> Vec<&str> {
        self.header.iter().map(String::as_str).collect()
    }

    pub fn typed_rows<'a>(
        &self,
        records: impl IntoIterator<Item = &'a StringRecord>,
        types: &[ColumnType],
    ) -> Result<Vec<Vec<Value>>, LoadError> {
        records
            .into_iter()
            .map(|record| {
                record
                    .iter()
                    .zip(types)
                    .enumerate()
                    .map(|(idx, (raw, ty))| {
                        ty.parse_value(raw).map_err(|source| LoadError::InvalidValue {
                            line: line_of(record),
                            column: self.header[idx].clone(),
                            source,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect()
    }
}

pub fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or_default()
}
