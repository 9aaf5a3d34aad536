use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use covid_sync::config::{Config, ConfigOverrides};
use covid_sync::export::FlatFileExporter;
use covid_sync::output::csv::load_outcomes_to_csv;
use covid_sync::output::render_json;
use covid_sync::output::table::{
    render_export_table, render_load_table, render_reports_table, render_status_table,
    render_sync_table,
};
use covid_sync::pipeline::{dataset_status, load_source, open_database, sync_source};
use covid_sync::reports::{QueryRegistry, Report};
use covid_sync::sync::{GitCli, SourceSync};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_REPORT: Report = Report::TotalDeathsByState;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "covid-sync",
    about = "Sync COVID-19 datasets into SQLite and export report flat files"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Main database file, overriding `[storage].db_path`.
    #[arg(long)]
    db: Option<String>,
    /// Directory exports are written under, overriding `[paths].file_root`.
    #[arg(long = "file-root")]
    file_root: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Clone or pull each source repository.
    Sync {
        #[arg(long)]
        source: Option<String>,
    },
    /// Sync, then load each dataset and rebuild derived tables.
    Load {
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        table: Option<String>,
        /// Drop and reload tables instead of appending new dates.
        #[arg(long)]
        full: bool,
        #[arg(long = "skip-sync")]
        skip_sync: bool,
    },
    /// Run a report and write it as CSV under `{file_root}/output`.
    Export {
        #[arg(short, long)]
        report: Option<String>,
        #[arg(long = "file")]
        output_file: Option<String>,
    },
    Reports,
    Status {
        #[arg(long)]
        source: Option<String>,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.clone(),
        file_root: cli.file_root.clone(),
    });
    init_logging(&config);

    // computed once so every report in this run shares one as-of date
    let registry = QueryRegistry::from_local_clock();

    match &cli.command {
        Commands::Config { init, show } => {
            handle_config_command(*init, *show, &config, &config_path)?;
        }
        Commands::Reports => {
            let entries = registry.entries();
            match cli.output {
                OutputFormat::Json => println!("{}", render_json(&entries)?),
                _ => {
                    println!("{}", render_reports_table(&entries));
                    println!("As-of date: {}", registry.as_of());
                }
            }
        }
        Commands::Sync { source } => {
            let sync = SourceSync::new(GitCli);
            let mut outcomes = Vec::new();
            for (schema, source) in config.selected_sources(source.as_deref())? {
                outcomes.push((schema.to_string(), sync_source(&sync, schema, source)?));
            }
            match cli.output {
                OutputFormat::Json => println!("{}", render_json(&outcomes)?),
                _ => println!("{}", render_sync_table(&outcomes)),
            }
        }
        Commands::Load {
            source,
            table,
            full,
            skip_sync,
        } => {
            let sync = SourceSync::new(GitCli);
            let mut db = open_database(&config)?;
            let mut reports = Vec::new();
            for (schema, source) in config.selected_sources(source.as_deref())? {
                if *skip_sync {
                    info!(schema, "skipping sync");
                } else {
                    sync_source(&sync, schema, source)?;
                }
                reports.push(load_source(&mut db, schema, source, table.as_deref(), *full)?);
            }
            match cli.output {
                OutputFormat::Table => println!("{}", render_load_table(&reports)),
                OutputFormat::Json => println!("{}", render_json(&reports)?),
                OutputFormat::Csv => {
                    let loads: Vec<_> = reports.into_iter().flat_map(|r| r.loads).collect();
                    println!("{}", load_outcomes_to_csv(&loads)?);
                }
            }
        }
        Commands::Export {
            report,
            output_file,
        } => {
            let (report_key, output_file) = export_target(report.as_deref(), output_file.as_deref());
            let db = open_database(&config)?;
            let file_root = config.resolved_file_root();
            let exporter = FlatFileExporter::new(&db, &registry, &file_root);
            let summary = exporter.export(&report_key, &output_file)?;
            match cli.output {
                OutputFormat::Json => println!("{}", render_json(&summary)?),
                _ => println!("{}", render_export_table(&summary)),
            }
        }
        Commands::Status { source } => {
            let db = open_database(&config)?;
            let mut statuses = Vec::new();
            for (schema, source) in config.selected_sources(source.as_deref())? {
                statuses.extend(dataset_status(&db, schema, source)?);
            }
            match cli.output {
                OutputFormat::Json => println!("{}", render_json(&statuses)?),
                _ => println!("{}", render_status_table(&statuses)),
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

/// Report key and output file name, defaulting whichever was not given.
fn export_target(report: Option<&str>, output_file: Option<&str>) -> (String, String) {
    let report_key = report
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_REPORT.key().to_string());
    let output_file = output_file.map(str::to_string).unwrap_or_else(|| {
        report_key
            .parse::<Report>()
            .map(|r| r.default_output_file())
            .unwrap_or_else(|_| format!("{report_key}.csv"))
    });
    (report_key, output_file)
}
