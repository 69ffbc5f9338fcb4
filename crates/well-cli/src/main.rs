use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use well_core::{FrameSource, PersonStore, QualityGate};
use well_hw::{Camera, WebcamSource};
use well_store::{IdentityFile, SqliteStore};
use welld::Config;

#[derive(Parser)]
#[command(name = "well", about = "Well monitoring agent CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show this machine's cached person id
    Identity,
    /// List enrolled persons
    Persons,
    /// Print recent readings as JSON lines, newest first
    Readings {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Capture one frame and print its quality report
    Probe,
    /// List V4L2 capture devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;

    match cli.command {
        Commands::Identity => identity(&config),
        Commands::Persons => persons(&config),
        Commands::Readings { limit } => readings(&config, limit),
        Commands::Probe => probe(&config),
        Commands::Devices => devices(),
    }
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    if !config.db_path.exists() {
        bail!("no database at {} (has welld run yet?)", config.db_path.display());
    }
    SqliteStore::open(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))
}

fn identity(config: &Config) -> Result<()> {
    let file = IdentityFile::new(config.identity_file.clone());
    let Some(id) = file.load()? else {
        println!("no cached identity ({})", file.path().display());
        return Ok(());
    };
    println!("person_id: {id}");

    if !config.db_path.exists() {
        println!("reference: unknown (no database)");
        return Ok(());
    }
    let mut store = open_store(config)?;
    match store.load_embedding(&id)? {
        Some(e) => println!(
            "reference: {}-dim ({})",
            e.dim(),
            e.model_version.as_deref().unwrap_or("unknown model")
        ),
        None => println!("reference: none"),
    }
    Ok(())
}

fn persons(config: &Config) -> Result<()> {
    let persons = open_store(config)?.list_persons()?;
    if persons.is_empty() {
        println!("No persons enrolled");
        return Ok(());
    }
    for p in persons {
        let dim = p
            .embedding_dim
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        println!("{}  dim={dim}  enrolled={}  updated={}", p.person_id, p.created_at, p.updated_at);
    }
    Ok(())
}

fn readings(config: &Config, limit: usize) -> Result<()> {
    for reading in open_store(config)?.recent_readings(limit)? {
        println!("{}", serde_json::to_string(&reading)?);
    }
    Ok(())
}

fn probe(config: &Config) -> Result<()> {
    let mut source = WebcamSource::new(config.camera_device.clone(), config.warmup_frames);
    let frame = source
        .capture()?
        .with_context(|| format!("no usable frame from {} (unavailable or too dark)", config.camera_device))?;

    let report = QualityGate::new(config.quality()).assess(&frame);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn devices() -> Result<()> {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
    }
    for d in devices {
        println!("{}  {}  driver={}  bus={}", d.path, d.name, d.driver, d.bus);
    }
    Ok(())
}
