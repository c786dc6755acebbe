use std::io::Read;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ndex_mirror::app::{App, ProgressSink, ensure_success};
use ndex_mirror::config::{Config, ConfigLoader};
use ndex_mirror::error::MirrorError;
use ndex_mirror::ndex::NdexHttpClient;
use ndex_mirror::output::{ConsoleProgress, JsonOutput, OutputMode, print_transfer_summary};
use ndex_mirror::sink::{ObjectSink, S3Sink};

#[derive(Parser)]
#[command(name = "ndex-mirror")]
#[command(about = "Mirror NDEx networks into an S3 bucket")]
#[command(version, author)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct Overrides {
    /// JSON config file (default: ./ndex-mirror.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    manifest: Option<Utf8PathBuf>,

    #[arg(long, global = true)]
    bucket: Option<String>,

    #[arg(long, global = true)]
    region: Option<String>,

    /// S3-compatible endpoint, e.g. a local MinIO
    #[arg(long, global = true)]
    endpoint_url: Option<String>,

    /// Concurrent transfers; 0 starts one per manifest entry
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Keep launching transfers after one fails
    #[arg(long, global = true)]
    keep_going: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Query the NDEx catalog and write the manifest")]
    Manifest,
    #[command(about = "Upload every network in the manifest (default)")]
    Transfer,
    #[command(about = "Write the manifest, then upload every network in it")]
    Sync,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<MirrorError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MirrorError) -> u8 {
    match error {
        MirrorError::ConfigRead(_)
        | MirrorError::ConfigParse(_)
        | MirrorError::InvalidConfig(_)
        | MirrorError::ManifestRead { .. }
        | MirrorError::ManifestParse { .. }
        | MirrorError::ManifestCountMismatch { .. } => 2,
        MirrorError::NdexHttp(_)
        | MirrorError::NdexStatus { .. }
        | MirrorError::NdexDecode(_)
        | MirrorError::S3Upload { .. }
        | MirrorError::S3Setup(_)
        | MirrorError::TransferFailed { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let config = resolve_config(&cli.overrides)?;
    let ndex = NdexHttpClient::new(&config)?;

    match cli.command.unwrap_or(Command::Transfer) {
        Command::Manifest => {
            let app = App::new(ndex.clone(), ndex, NopSink, &config);
            let progress = progress_sink(output_mode);
            let result = app.generate_manifest(progress)?;
            if matches!(output_mode, OutputMode::Json) {
                JsonOutput::print_manifest(&result).into_diagnostic()?;
            }
            Ok(())
        }
        Command::Transfer => {
            let app = App::new(ndex.clone(), ndex, s3_sink(&config)?, &config);
            let report = app.transfer(progress_sink(output_mode))?;
            match output_mode {
                OutputMode::Human => print_transfer_summary(&report),
                OutputMode::Json => JsonOutput::print_transfer(&report).into_diagnostic()?,
            }
            ensure_success(&report)?;
            Ok(())
        }
        Command::Sync => {
            let app = App::new(ndex.clone(), ndex, s3_sink(&config)?, &config);
            let result = app.sync(progress_sink(output_mode))?;
            match output_mode {
                OutputMode::Human => print_transfer_summary(&result.transfer),
                OutputMode::Json => JsonOutput::print_sync(&result).into_diagnostic()?,
            }
            ensure_success(&result.transfer)?;
            Ok(())
        }
    }
}

fn resolve_config(overrides: &Overrides) -> Result<Config, MirrorError> {
    let mut config = ConfigLoader::resolve(overrides.config.as_deref())?;
    if let Some(path) = &overrides.manifest {
        config.manifest_path = path.clone();
    }
    if let Some(bucket) = &overrides.bucket {
        config.bucket = bucket.clone();
    }
    if let Some(region) = &overrides.region {
        config.region = Some(region.clone());
    }
    if let Some(endpoint_url) = &overrides.endpoint_url {
        config.s3_endpoint_url = Some(endpoint_url.clone());
    }
    if let Some(concurrency) = overrides.concurrency {
        config.max_concurrent = concurrency;
    }
    if overrides.keep_going {
        config.fail_fast = false;
    }
    config.validate()?;
    Ok(config)
}

fn progress_sink(mode: OutputMode) -> &'static dyn ProgressSink {
    match mode {
        OutputMode::Human => &ConsoleProgress,
        OutputMode::Json => &JsonOutput,
    }
}

fn s3_sink(config: &Config) -> Result<S3Sink, MirrorError> {
    S3Sink::new(config.region.as_deref(), config.s3_endpoint_url.as_deref())
}

/// Stands in for S3 when only the manifest is built.
struct NopSink;

impl ObjectSink for NopSink {
    fn put(&self, _bucket: &str, key: &str, _body: &mut dyn Read) -> Result<u64, MirrorError> {
        Err(MirrorError::S3Upload {
            key: key.to_string(),
            message: "object store not configured".to_string(),
        })
    }
}
