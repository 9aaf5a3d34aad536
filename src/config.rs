use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::{ColumnDef, ColumnType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_sources")]
    pub sources: BTreeMap<String, SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Each source schema lives in `{schema_dir}/{schema}.sqlite`.
    #[serde(default = "default_schema_dir")]
    pub schema_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_file_root")]
    pub file_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub git_url: String,
    pub local_path: String,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
    #[serde(default)]
    pub derived: Vec<DerivedTableConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub table: String,
    /// Path of the data file relative to the source checkout.
    pub file: String,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedTableConfig {
    pub table: String,
    pub sql: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub file_root: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/covid-sync/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::from_toml(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
        if let Some(file_root) = overrides.file_root {
            self.paths.file_root = file_root;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn schema_db_path(&self, schema: &str) -> PathBuf {
        expand_tilde(&self.storage.schema_dir).join(format!("{schema}.sqlite"))
    }

    pub fn resolved_file_root(&self) -> PathBuf {
        expand_tilde(&self.paths.file_root)
    }

    pub fn source(&self, schema: &str) -> Result<&SourceConfig> {
        self.sources
            .get(schema)
            .ok_or_else(|| anyhow!("no source configured for schema {schema}"))
    }

    pub fn selected_sources<'a>(
        &'a self,
        only: Option<&'a str>,
    ) -> Result<Vec<(&'a str, &'a SourceConfig)>> {
        match only {
            Some(schema) => Ok(vec![(schema, self.source(schema)?)]),
            None => Ok(self
                .sources
                .iter()
                .map(|(name, source)| (name.as_str(), source))
                .collect()),
        }
    }

    pub fn default_template() -> String {
        let template = r#"[storage]
db_path = "~/.local/share/covid-sync/covid.sqlite"
schema_dir = "~/.local/share/covid-sync/schemas"

[paths]
file_root = "~/covid-sync"

[logging]
level = "info"

[sources.nytimes]
git_url = "https://github.com/nytimes/covid-19-data.git"
local_path = "~/covid-sync/covid-19-data"

[[sources.nytimes.datasets]]
table = "total_cases_by_state"
file = "us-states.csv"
date_column = "date"
columns = [
    { name = "date", type = "date" },
    { name = "state", type = "text" },
    { name = "fips", type = "text" },
    { name = "cases", type = "integer" },
    { name = "deaths", type = "integer" },
]

[[sources.nytimes.datasets]]
table = "total_cases_by_county"
file = "us-counties.csv"
date_column = "date"
columns = [
    { name = "date", type = "date" },
    { name = "county", type = "text" },
    { name = "state", type = "text" },
    { name = "fips", type = "text" },
    { name = "cases", type = "integer" },
    { name = "deaths", type = "integer" },
]

[[sources.nytimes.derived]]
table = "daily_by_state"
sql = """
SELECT date, state,
       cases - COALESCE(LAG(cases) OVER (PARTITION BY state ORDER BY date), 0) AS new_cases,
       deaths - COALESCE(LAG(deaths) OVER (PARTITION BY state ORDER BY date), 0) AS new_deaths
FROM nytimes.total_cases_by_state
"""
"#;
        template.to_string()
    }
}

impl SourceConfig {
    pub fn resolved_local_path(&self) -> PathBuf {
        expand_tilde(&self.local_path)
    }

    pub fn data_file(&self, dataset: &DatasetConfig) -> PathBuf {
        self.resolved_local_path().join(&dataset.file)
    }

    pub fn dataset(&self, table: &str) -> Result<&DatasetConfig> {
        self.datasets
            .iter()
            .find(|d| d.table == table)
            .ok_or_else(|| anyhow!("no dataset configured for table {table}"))
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            paths: PathsConfig::default(),
            logging: LoggingConfig::default(),
            sources: default_sources(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            schema_dir: default_schema_dir(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            file_root: default_file_root(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_db_path() -> String {
    "~/.local/share/covid-sync/covid.sqlite".to_string()
}

fn default_schema_dir() -> String {
    "~/.local/share/covid-sync/schemas".to_string()
}

fn default_file_root() -> String {
    "~/covid-sync".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_date_column() -> String {
    "date".to_string()
}

fn default_sources() -> BTreeMap<String, SourceConfig> {
    let state_columns = vec![
        ColumnDef::new("date", ColumnType::Date),
        ColumnDef::text("state"),
        ColumnDef::text("fips"),
        ColumnDef::new("cases", ColumnType::Integer),
        ColumnDef::new("deaths", ColumnType::Integer),
    ];
    let county_columns = vec![
        ColumnDef::new("date", ColumnType::Date),
        ColumnDef::text("county"),
        ColumnDef::text("state"),
        ColumnDef::text("fips"),
        ColumnDef::new("cases", ColumnType::Integer),
        ColumnDef::new("deaths", ColumnType::Integer),
    ];
    let nytimes = SourceConfig {
        git_url: "https://github.com/nytimes/covid-19-data.git".to_string(),
        local_path: "~/covid-sync/covid-19-data".to_string(),
        datasets: vec![
            DatasetConfig {
                table: "total_cases_by_state".to_string(),
                file: "us-states.csv".to_string(),
                date_column: default_date_column(),
                columns: state_columns,
            },
            DatasetConfig {
                table: "total_cases_by_county".to_string(),
                file: "us-counties.csv".to_string(),
                date_column: default_date_column(),
                columns: county_columns,
            },
        ],
        derived: vec![DerivedTableConfig {
            table: "daily_by_state".to_string(),
            sql: DAILY_BY_STATE_SQL.to_string(),
        }],
    };
    BTreeMap::from([("nytimes".to_string(), nytimes)])
}

const DAILY_BY_STATE_SQL: &str = "
SELECT date, state,
       cases - COALESCE(LAG(cases) OVER (PARTITION BY state ORDER BY date), 0) AS new_cases,
       deaths - COALESCE(LAG(deaths) OVER (PARTITION BY state ORDER BY date), 0) AS new_deaths
FROM nytimes.total_cases_by_state
";

#[cfg(test)]
mod tests {
    use super::{expand_tilde, Config, ConfigOverrides};
    use crate::store::ColumnType;

    #[test]
    fn template_parses_to_the_defaults() {
        let parsed = Config::from_toml(&Config::default_template()).expect("parse template");
        let defaults = Config::default();
        assert_eq!(parsed.storage.db_path, defaults.storage.db_path);
        assert_eq!(parsed.paths.file_root, defaults.paths.file_root);
        let source = parsed.source("nytimes").unwrap();
        let default_source = defaults.source("nytimes").unwrap();
        assert_eq!(source.git_url, default_source.git_url);
        assert_eq!(source.datasets.len(), default_source.datasets.len());
        assert_eq!(
            source.dataset("total_cases_by_state").unwrap().columns,
            default_source.dataset("total_cases_by_state").unwrap().columns
        );
        assert_eq!(source.derived[0].table, "daily_by_state");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed = Config::from_toml(
            r#"
[paths]
file_root = "/srv/covid"

[sources.jhu]
git_url = "https://example.com/jhu.git"
local_path = "/srv/jhu"

[[sources.jhu.datasets]]
table = "global"
file = "global.csv"
columns = [{ name = "date", type = "date" }, { name = "cases" }]
"#,
        )
        .unwrap();
        assert_eq!(parsed.resolved_file_root().to_str(), Some("/srv/covid"));
        assert_eq!(parsed.logging.level, "info");
        let jhu = parsed.source("jhu").unwrap();
        let global = jhu.dataset("global").unwrap();
        assert_eq!(global.date_column, "date");
        assert_eq!(global.columns[1].column_type, ColumnType::Text);
        assert_eq!(jhu.data_file(global).to_str(), Some("/srv/jhu/global.csv"));
        assert!(parsed.source("nytimes").is_err());
    }

    #[test]
    fn selects_one_or_all_sources() {
        let config = Config::default();
        assert_eq!(config.selected_sources(None).unwrap().len(), 1);
        assert_eq!(config.selected_sources(Some("nytimes")).unwrap()[0].0, "nytimes");
        assert!(config.selected_sources(Some("cdc")).is_err());
    }

    #[test]
    fn selected_source_name_may_be_borrowed_from_the_caller() {
        let config = Config::default();
        let requested = String::from("nytimes");
        let selected = config.selected_sources(Some(requested.as_str())).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, "nytimes");
        assert_eq!(selected[0].1.datasets.len(), 2);
    }

    #[test]
    fn overrides_and_schema_paths() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            db_path: Some("/tmp/covid.sqlite".to_string()),
            file_root: None,
        });
        config.storage.schema_dir = "/tmp/schemas".to_string();
        assert_eq!(config.resolved_db_path().to_str(), Some("/tmp/covid.sqlite"));
        assert_eq!(
            config.schema_db_path("nytimes").to_str(),
            Some("/tmp/schemas/nytimes.sqlite")
        );
        assert_eq!(expand_tilde("relative/path").to_str(), Some("relative/path"));
    }
}
