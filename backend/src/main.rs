//! Caseload CLI - import fraud-dispute CSV files as investigation cases
//!
//! # Main Commands
//!
//! ```bash
//! caseload import disputes.csv       # Validate, group and merge into the store
//! caseload import disputes.csv --dry-run
//! caseload cases                     # Dump stored cases
//! caseload serve                     # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! caseload parse disputes.csv        # Just parse CSV to JSON
//! caseload validate disputes.csv     # Row-level validation only
//! ```
//!
//! Settings come from `CASELOAD_*` environment variables (or `.env`);
//! flags override them.

use caseload::server::{start_server, AppState};
use caseload::{
    parse_file_auto, Classifiers, ImportConfig, ImportOptions, Importer, JsonFileStore,
    RowValidator,
};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "caseload")]
#[command(about = "Bulk-import fraud-dispute cases from CSV", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Store location flags shared by commands that touch the store.
#[derive(Args)]
struct StoreArgs {
    /// Store directory (default: CASELOAD_STORE_DIR or .caseload)
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Read-only baseline cases (JSON array)
    #[arg(long)]
    baseline: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a CSV file without importing it
    Validate {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Full import: CSV → validated rows → cases → store
    Import {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        #[command(flatten)]
        store: StoreArgs,

        /// Report what would be created without saving
        #[arg(long)]
        dry_run: bool,

        /// Write the import report here (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List baseline and imported cases
    Cases {
        #[command(flatten)]
        store: StoreArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: CASELOAD_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        #[command(flatten)]
        store: StoreArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = ImportConfig::from_env();

    let result = match cli.command {
        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter.or(config.delimiter), output.as_deref()),

        Commands::Validate { input, delimiter } => {
            cmd_validate(&input, delimiter.or(config.delimiter), &config)
        }

        Commands::Import {
            input,
            delimiter,
            store,
            dry_run,
            output,
        } => {
            let config = with_store_args(config, store);
            let options = ImportOptions {
                delimiter: delimiter.or(config.delimiter),
                dry_run,
                imported_at: None,
            };
            cmd_import(&input, &options, &config, output.as_deref())
        }

        Commands::Cases { store, output } => {
            cmd_cases(&with_store_args(config, store), output.as_deref())
        }

        Commands::Serve { port, store } => {
            let mut config = with_store_args(config, store);
            if let Some(port) = port {
                config.port = port;
            }
            cmd_serve(config).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn with_store_args(mut config: ImportConfig, args: StoreArgs) -> ImportConfig {
    if let Some(dir) = args.store_dir {
        config.store_dir = dir;
    }
    if let Some(baseline) = args.baseline {
        config.baseline_path = Some(baseline);
    }
    config
}

fn build_validator(config: &ImportConfig) -> Result<RowValidator, Box<dyn std::error::Error>> {
    let classifiers = match &config.rules_path {
        Some(path) => {
            eprintln!("📋 Classifier rules: {}", path.display());
            Classifiers::from_file(path).map_err(|e| format!("Invalid rules file: {}", e))?
        }
        None => Classifiers::default(),
    };
    Ok(RowValidator::new(classifiers, config.defaults.clone()))
}

fn build_importer(config: &ImportConfig) -> Result<Importer<JsonFileStore>, Box<dyn std::error::Error>> {
    let mut store = JsonFileStore::new(&config.store_dir);
    if let Some(baseline) = &config.baseline_path {
        store = store.with_baseline(baseline);
    }
    Ok(Importer::new(store, build_validator(config)?))
}

fn cmd_parse(
    input: &Path,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let table = parse_file_auto(input, delimiter)?;

    eprintln!("   Encoding: {}", table.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(table.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );

    let Some((header, data)) = table.rows.split_first() else {
        eprintln!("⚠️  File is empty");
        return write_output("[]", output);
    };
    eprintln!("   Columns: {}", header.join(", "));
    eprintln!("✅ Parsed {} records", data.len());

    let records: Vec<Value> = data
        .iter()
        .map(|cells| {
            let record: Map<String, Value> = header
                .iter()
                .zip(cells.iter())
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            Value::Object(record)
        })
        .collect();

    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, output)
}

fn cmd_validate(
    input: &Path,
    delimiter: Option<char>,
    config: &ImportConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let table = parse_file_auto(input, delimiter)?;
    let outcome = build_validator(config)?.validate(&table.rows);

    if let Some(err) = &outcome.file_error {
        return Err(format!("File rejected: {}", err).into());
    }

    for err in outcome.errors.iter().take(20) {
        eprintln!("   ❌ {}", err);
    }
    if outcome.errors.len() > 20 {
        eprintln!("   ... +{} more", outcome.errors.len() - 20);
    }

    eprintln!(
        "\n📊 Results: {} valid, {} invalid",
        outcome.rows.len(),
        outcome.errors.len()
    );

    if !outcome.errors.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_import(
    input: &Path,
    options: &ImportOptions,
    config: &ImportConfig,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let importer = build_importer(config)?;
    let report = importer.import_file(input, options)?;

    eprintln!("\n{}", "=".repeat(70));
    eprintln!("📊 SUMMARY{}", if report.dry_run { " (dry run)" } else { "" });
    eprintln!("{}", "=".repeat(70));
    eprintln!("   Rows:           {}", report.total_rows);
    eprintln!("   Imported:       {}", report.success_count);
    eprintln!("   Failed:         {}", report.failed_count);
    eprintln!("   Skipped:        {}", report.skipped_count);
    eprintln!("   Cases added:    {}", report.cases_added);
    eprintln!("{}\n", "=".repeat(70));

    let json = serde_json::to_string_pretty(&report)?;
    write_output(&json, output)?;

    if report.file_error {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_cases(config: &ImportConfig, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let importer = build_importer(config)?;
    let view = importer.store().view()?;
    let cases: Vec<_> = view.all_cases().collect();

    eprintln!(
        "📋 {} case(s): {} baseline, {} imported",
        cases.len(),
        view.baseline.len(),
        view.imported.cases.len()
    );

    let json = serde_json::to_string_pretty(&cases)?;
    write_output(&json, output)
}

async fn cmd_serve(config: ImportConfig) -> Result<(), Box<dyn std::error::Error>> {
    let importer = build_importer(&config)?;
    start_server(config.port, AppState::new(importer, config.delimiter)).await
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
