use anyhow::{Context, Result};
use clap::Parser;
use gbfs2parquet::init::{init_tracing, init_writer};
use gbfs2parquet::{open_source, parse_cutoff, run_backfill};
use gbfs2parquet_config::{RuntimeConfig, StorageBackend};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Backfill station status snapshots into hour-partitioned Parquet files
#[derive(Parser)]
#[command(name = "gbfs2parquet")]
#[command(version)]
#[command(about = "Backfill station status snapshots into hour-partitioned Parquet files", long_about = None)]
struct Cli {
    /// Delimited snapshot dump to read
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Exclusive upper bound on execution_time (ISO-8601, UTC unless an offset is given)
    #[arg(long, value_name = "TIMESTAMP")]
    cutoff: Option<String>,

    /// Maximum rows per batch
    #[arg(long, value_name = "ROWS")]
    chunk_rows: Option<usize>,

    /// Maximum concurrent partition writes
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Output directory for Parquet files (filesystem backend only)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Exit non-zero when any partition write failed
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Build tokio runtime and run the backfill
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<ExitCode> {
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load_or_default().context("Failed to load configuration")?
    };

    // CLI flags win over files and environment
    apply_cli_overrides(&mut config, &cli)?;
    config.validate()?;

    init_tracing(&config.logging);

    let raw_cutoff = config
        .backfill
        .cutoff
        .clone()
        .context("A cutoff is required: pass --cutoff or set backfill.cutoff")?;
    let cutoff = parse_cutoff(&raw_cutoff)?;

    prepare_output(&config)?;
    let source = open_source(&cli.source, &config)?;
    let pool = init_writer(&config)?;

    info!(
        source = %cli.source.display(),
        cutoff = %cutoff,
        "gbfs2parquet {} starting",
        env!("CARGO_PKG_VERSION")
    );

    let summary = run_backfill(&source, &pool, cutoff).await?;
    pool.shutdown();

    println!("{}", summary);
    if cli.strict && !summary.is_success() {
        error!(
            write_failures = summary.write_failures,
            "Partition writes failed in strict mode"
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) -> Result<()> {
    if let Some(cutoff) = &cli.cutoff {
        config.backfill.cutoff = Some(cutoff.clone());
    }

    if let Some(chunk_rows) = cli.chunk_rows {
        config.source.chunk_rows = chunk_rows;
    }

    if let Some(concurrency) = cli.concurrency {
        config.writer.max_concurrent_writes = Some(concurrency);
    }

    // Override output directory (only valid for fs backend)
    if let Some(output) = &cli.output {
        if config.storage.backend != StorageBackend::Fs {
            anyhow::bail!(
                "--output flag only works with filesystem backend, but backend is '{}'.\n\
                Either remove --output flag or set backend to 'fs' in config file.",
                config.storage.backend
            );
        }

        let fs_config = config.storage.fs.get_or_insert_with(Default::default);
        fs_config.path = output.to_string_lossy().to_string();
    }

    if let Some(level) = &cli.log_level {
        config.logging.log_level = level.clone();
    }

    Ok(())
}

/// Create the filesystem output directory and make sure it is writable.
fn prepare_output(config: &RuntimeConfig) -> Result<()> {
    use std::fs;

    if config.storage.backend != StorageBackend::Fs {
        return Ok(());
    }

    let fs_config = config
        .storage
        .fs
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("filesystem backend requires storage.fs configuration"))?;

    let output_path = PathBuf::from(&fs_config.path);
    if !output_path.exists() {
        fs::create_dir_all(&output_path)
            .with_context(|| format!("Failed to create output directory: {}", fs_config.path))?;
    }

    let test_file = output_path.join(".gbfs2parquet-write-test");
    fs::write(&test_file, b"test").with_context(|| {
        format!(
            "Output directory '{}' is not writable. Check permissions.",
            fs_config.path
        )
    })?;
    fs::remove_file(&test_file).context("Failed to remove test file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::parse_from([
            "gbfs2parquet",
            "dump.psv",
            "--cutoff",
            "2019-08-01 18:52:03",
            "--chunk-rows",
            "500",
            "--concurrency",
            "8",
            "--output",
            "/tmp/out",
            "-v",
            "debug",
        ]);
        let mut config = RuntimeConfig::default();
        apply_cli_overrides(&mut config, &cli).unwrap();

        assert_eq!(config.backfill.cutoff.as_deref(), Some("2019-08-01 18:52:03"));
        assert_eq!(config.source.chunk_rows, 500);
        assert_eq!(config.writer.max_concurrent_writes, Some(8));
        assert_eq!(config.storage.fs.unwrap().path, "/tmp/out");
        assert_eq!(config.logging.log_level, "debug");
        assert!(!cli.strict);
    }

    #[test]
    fn output_flag_requires_fs_backend() {
        let cli = Cli::parse_from(["gbfs2parquet", "dump.psv", "--output", "/tmp/out"]);
        let mut config = RuntimeConfig::default();
        config.storage.backend = StorageBackend::S3;
        assert!(apply_cli_overrides(&mut config, &cli).is_err());
    }
}
