mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use health_monitor_core::{
    Database, FsImageStore, PatientRecord, RecordExporter, VisitOutcome, VisitWorkflow,
};
use health_monitor_llm::{GeminiOracle, TextOracle, UnconfiguredOracle};

use config::{Config, API_KEY_ENV};

/// Remote health monitor: record visits and get oracle-assisted diagnoses
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ~/.health-monitor/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new patient and diagnose the first visit
    New {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symptoms: String,
        /// Image to analyse alongside the symptoms
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Record a returning visit for an existing patient ID
    Visit {
        #[arg(long)]
        id: String,
        #[arg(long)]
        symptoms: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Show a record
    Show {
        #[arg(long)]
        id: String,
    },

    /// List records with exactly this name
    Find {
        #[arg(long)]
        name: String,
    },

    /// List all records
    List,

    /// Export records
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Only records updated at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<String>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Management advice for a condition
    Advice {
        #[arg(long)]
        condition: String,
    },

    /// Analyse current symptoms against the patient's history
    History {
        #[arg(long)]
        id: String,
    },

    /// Write a default config file
    InitConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };

    if let Command::InitConfig = args.command {
        return init_config(&config_path);
    }

    let mut config =
        Config::load(&config_path)?.with_env_api_key(std::env::var(API_KEY_ENV).ok());
    if let Some(path) = &args.database {
        config.database_path = Some(path.clone());
    }
    debug!(config = ?config_path, "Configuration loaded");

    let db = open_database(&config)?;
    let images = FsImageStore::open(config.get_image_dir()?)
        .context("Failed to open image directory")?;
    let oracle = build_oracle(&config);
    let workflow = VisitWorkflow::new(&db, oracle, &images);

    match args.command {
        Command::New {
            name,
            symptoms,
            image,
        } => {
            let image = read_image(image.as_deref())?;
            let outcome = workflow.register_patient(&name, &symptoms, image.as_deref())?;
            println!("Patient ID: {}", outcome.record.id);
            print_outcome(&outcome);
        }
        Command::Visit {
            id,
            symptoms,
            image,
        } => {
            let image = read_image(image.as_deref())?;
            let outcome = workflow.returning_visit(&id, &symptoms, image.as_deref())?;
            print_outcome(&outcome);
        }
        Command::Show { id } => {
            let record = workflow.lifecycle().get(&id)?;
            print_record(&record);
        }
        Command::Find { name } => {
            let matches = workflow.find_by_name(&name)?;
            if matches.is_empty() {
                println!("No patients named {:?}", name);
            }
            for record in &matches {
                print_summary(record);
            }
        }
        Command::List => {
            for record in db.list_patients()? {
                print_summary(&record);
            }
        }
        Command::Export {
            format,
            since,
            output,
        } => {
            let exporter = RecordExporter::new(&db);
            let batch = match since {
                Some(since) => exporter.export_since(&since)?,
                None => exporter.export_all()?,
            };
            let content = match format {
                ExportFormat::Json => batch.to_json()?,
                ExportFormat::Csv => batch.to_csv(),
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    info!(records = batch.total, path = ?path, "Export written");
                    println!("Exported {} records to {:?}", batch.total, path);
                }
                None => print!("{}", content),
            }
        }
        Command::Advice { condition } => {
            println!("{}", workflow.health_advice(&condition)?);
        }
        Command::History { id } => {
            println!("{}", workflow.analyze_history(&id)?);
        }
        Command::InitConfig => init_config(&config_path)?,
    }

    Ok(())
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config file already exists: {:?}", path);
    }
    Config::default().save(path)?;
    println!("Wrote default config to {:?}", path);
    Ok(())
}

fn open_database(config: &Config) -> Result<Database> {
    let path = config.get_database_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    info!(path = ?path, "Opening database");
    Database::open(&path).with_context(|| format!("Failed to open database {:?}", path))
}

/// Gemini when a key is configured; otherwise an oracle that always fails,
/// so visits are still recorded with the unavailable placeholder.
fn build_oracle(config: &Config) -> Box<dyn TextOracle> {
    let key = config.api_key.as_deref().unwrap_or("");
    match GeminiOracle::with_timeout(key, Duration::from_secs(config.timeout_secs)) {
        Ok(oracle) => Box::new(
            oracle
                .with_models(&config.model, &config.vision_model)
                .with_generation_config(config.generation_config()),
        ),
        Err(e) => {
            warn!(error = %e, "Oracle not configured, diagnoses will be placeholders");
            Box::new(UnconfiguredOracle::new(e.to_string()))
        }
    }
}

fn read_image(path: Option<&Path>) -> Result<Option<Vec<u8>>> {
    path.map(|p| std::fs::read(p).with_context(|| format!("Failed to read image {:?}", p)))
        .transpose()
}

fn print_outcome(outcome: &VisitOutcome) {
    if outcome.oracle_failed() {
        eprintln!("Diagnosis service unavailable; placeholder stored.");
    }
    print_record(&outcome.record);
}

fn print_summary(record: &PatientRecord) {
    println!(
        "{}  {}  joined {}  {:?}",
        record.id,
        record.name,
        record.joining_date,
        record.visit_state()
    );
}

fn print_record(record: &PatientRecord) {
    println!("ID:            {}", record.id);
    println!("Name:          {}", record.name);
    println!("Joined:        {}", record.joining_date);
    println!("Symptoms:      {}", record.symptoms);
    if let Some(prev) = &record.prev_diagnosis {
        println!("\nPrevious diagnosis:\n{}", prev);
    }
    if let Some(latest) = &record.latest_diagnosis {
        println!("\nDiagnosis:\n{}", latest);
    }
    if let Some(suggestions) = &record.medicine_suggestions {
        println!("\nMedicine suggestions:\n{}", suggestions);
    }
    if let Some(image) = &record.image_reference {
        println!("\nImage:         {}", image);
    }
}
