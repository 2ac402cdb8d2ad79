//! Spore CLI - load laboratory workbooks into the membrane warehouse
//!
//! # Commands
//!
//! ```bash
//! spore transform batch.xlsx                 # Transform and load into PostgreSQL
//! spore transform batch.xlsx --out-dir out   # Transform and write CSV tables
//! spore barcodes                             # Barcodes for every stored name
//! spore run batch.xlsx                       # transform, then barcodes
//! spore schema                               # Print the star-schema contract
//! ```
//!
//! PostgreSQL is reached through `DATABASE_URL` (a `.env` file is read).

use clap::{Parser, Subcommand};
use spore::config::{database_url, PipelineConfig};
use spore::logs::init_logging;
use spore::transform::schema::contract;
use spore::{populate_barcodes, run_ingestion, CsvDirectory, PostgresWarehouse, Warehouse};
use std::path::{Path, PathBuf};

const DEFAULT_BARCODE_DIR: &str = "results";

#[derive(Parser)]
#[command(name = "spore")]
#[command(about = "Load membrane and image sheets into the spore warehouse", long_about = None)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform a workbook and load it into the warehouse
    Transform {
        /// Workbook, or directory holding Membranes.csv and Images.csv
        input: PathBuf,

        /// Write CSV tables here instead of PostgreSQL
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Render barcodes for every membrane and image name in the warehouse
    Barcodes {
        /// Folder receiving membrane_barcodes/ and images_barcodes/
        #[arg(short, long, default_value = DEFAULT_BARCODE_DIR)]
        out_dir: PathBuf,

        /// Read names from CSV tables here instead of PostgreSQL
        #[arg(short, long)]
        from_dir: Option<PathBuf>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Transform and load, then render barcodes
    Run {
        /// Workbook, or directory holding Membranes.csv and Images.csv
        input: PathBuf,

        /// Write CSV tables here instead of PostgreSQL
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Folder receiving the barcodes
        #[arg(short, long, default_value = DEFAULT_BARCODE_DIR)]
        barcode_dir: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the star-schema contract as JSON
    Schema,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Transform {
            input,
            out_dir,
            config,
        } => cmd_transform(&input, out_dir.as_deref(), config.as_deref()).await,

        Commands::Barcodes {
            out_dir,
            from_dir,
            config,
        } => cmd_barcodes(&out_dir, from_dir.as_deref(), config.as_deref()).await,

        Commands::Run {
            input,
            out_dir,
            barcode_dir,
            config,
        } => cmd_run(&input, out_dir.as_deref(), &barcode_dir, config.as_deref()).await,

        Commands::Schema => cmd_schema(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// CSV directory when `dir` is given, PostgreSQL otherwise.
async fn open_warehouse(
    dir: Option<&Path>,
    config: &PipelineConfig,
) -> Result<Box<dyn Warehouse>, Box<dyn std::error::Error>> {
    match dir {
        Some(dir) => Ok(Box::new(CsvDirectory::new(dir)?)),
        None => {
            let url = database_url()?;
            Ok(Box::new(PostgresWarehouse::connect(&url, &config.schema).await?))
        }
    }
}

async fn cmd_transform(
    input: &Path,
    out_dir: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::load(config_path)?;
    let mut warehouse = open_warehouse(out_dir, &config).await?;

    let report = run_ingestion(input, &config, warehouse.as_mut()).await?;
    eprintln!("\n📊 Run {}:", report.run_id);
    for (table, rows) in &report.load.tables {
        eprintln!("   {:<24} {} rows", table, rows);
    }
    if report.transform.unmatched_images > 0 {
        eprintln!(
            "   ⚠️  {} image(s) without membrane",
            report.transform.unmatched_images
        );
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

async fn cmd_barcodes(
    out_dir: &Path,
    from_dir: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::load(config_path)?;
    let mut warehouse = open_warehouse(from_dir, &config).await?;

    let result = populate_barcodes(warehouse.as_mut(), out_dir).await;
    let closed = warehouse.close().await;
    let report = result?;
    closed?;

    eprintln!(
        "\n🏷️  {} membrane and {} image barcodes written to {}",
        report.membranes,
        report.images,
        out_dir.display()
    );
    Ok(())
}

async fn cmd_run(
    input: &Path,
    out_dir: Option<&Path>,
    barcode_dir: &Path,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    cmd_transform(input, out_dir, config_path).await?;
    cmd_barcodes(barcode_dir, out_dir, config_path).await
}

fn cmd_schema() -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(&contract())?;
    println!("{}", json);
    Ok(())
}
