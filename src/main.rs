//! s3consistency: measure how often an object store breaks read-after-write,
//! read-after-delete, read-after-overwrite, list-after-create and
//! list-after-delete consistency under concurrent load.
//!
//! ```bash
//! # Five probes, 8 workers x 20 iterations each, against MinIO
//! s3consistency --endpoint http://localhost:9000 --path-style \
//!     --bucket s3consistency --threads 8 --iterations 20
//!
//! # Remove everything left in the bucket
//! s3consistency --bucket s3consistency --clean
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use s3_consistency::campaign::{clean_bucket, Campaign};
use s3_consistency::config::{AppConfig, DEFAULT_CONFIG_FILE};
use s3_consistency::gateway::config::GatewayBackend;
use s3_consistency::logging;

/// Object store consistency tests
#[derive(Parser, Debug)]
#[command(name = "s3consistency")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of iterations per thread per test
    #[arg(long)]
    iterations: Option<usize>,

    /// Number of threads per test
    #[arg(long, visible_alias = "workers")]
    threads: Option<usize>,

    /// Size in bytes of created files (capped at 5GB)
    #[arg(long)]
    chunk_size: Option<u64>,

    /// S3 endpoint to use
    #[arg(long)]
    endpoint: Option<String>,

    /// S3 region to use
    #[arg(long)]
    region: Option<String>,

    /// Bucket to use for the test
    #[arg(long)]
    bucket: Option<String>,

    /// Gateway backend (s3 or mock)
    #[arg(long)]
    backend: Option<GatewayBackend>,

    /// Use path-style addressing
    #[arg(long)]
    path_style: bool,

    /// Delete every object in the bucket instead of running the tests
    #[arg(long)]
    clean: bool,

    /// YAML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Also write the report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

/// Command-line flags win over file and environment settings
fn apply_args(config: &mut AppConfig, args: &Args) {
    if let Some(iterations) = args.iterations {
        config.campaign.iterations = iterations;
    }
    if let Some(threads) = args.threads {
        config.campaign.workers = threads;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.campaign.chunk_size = chunk_size;
    }
    if let Some(endpoint) = &args.endpoint {
        config.gateway.endpoint = Some(endpoint.clone());
    }
    if let Some(region) = &args.region {
        config.gateway.region = Some(region.clone());
    }
    if let Some(bucket) = &args.bucket {
        config.gateway.bucket = bucket.clone();
    }
    if let Some(backend) = args.backend {
        config.gateway.backend = backend;
    }
    if args.path_style {
        config.gateway.force_path_style = true;
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("** Error ** : {}", e);
            return ExitCode::from(2);
        }
    };

    // Logging settings come only from the file; env and flags never touch them.
    if let Err(e) = logging::init(&config.logging) {
        eprintln!("** Error ** : {}", e);
        return ExitCode::FAILURE;
    }
    AppConfig::describe_source(&args.config);

    if let Err(e) = config.apply_env() {
        error!("Invalid configuration: {}", e);
        eprintln!("** Error ** : {}", e);
        return ExitCode::from(2);
    }
    apply_args(&mut config, &args);

    if config.campaign.chunk_size > s3_consistency::gateway::MAX_CHUNK_SIZE {
        eprintln!(" ** Error ** : chunk-size exceeds the 5GB limit.");
        eprintln!("Setting chunk-size to 5GB.");
    }
    let chunk_len = match config.validate() {
        Ok(len) => len,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            eprintln!("** Error ** : {}", e);
            return ExitCode::from(2);
        }
    };

    info!(" <------------------ CAMPAIGN START ------------------>");
    let status = run(&config, &args, chunk_len);
    info!(" <------------------ CAMPAIGN END ------------------>");
    status
}

fn run(config: &AppConfig, args: &Args, chunk_len: usize) -> ExitCode {
    let gateway = match config.gateway.create_gateway() {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Failed to create gateway: {}", e);
            eprintln!("** Error ** : {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.clean {
        return match clean_bucket(gateway.as_ref()) {
            Ok(deleted) => {
                info!("Clean finished, {} objects deleted", deleted);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Clean aborted: {}", e);
                eprintln!("** Error ** : {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let campaign = Campaign::new(gateway, config.campaign.clone(), chunk_len);
    if let Err(e) = campaign.preflight() {
        error!("Preflight against {} failed: {}", campaign.gateway().describe(), e);
        eprintln!("** Error ** : {}", e);
        return ExitCode::FAILURE;
    }

    let report = campaign.run();
    println!("\n{}", report);

    if let Some(path) = &args.report {
        if let Err(e) = report.write_json(path) {
            // The table is already out; a missing JSON copy is not a harness fault.
            error!("Failed to write report to {}: {}", path.display(), e);
            eprintln!("** Error ** : failed to write report to {}: {}", path.display(), e);
        } else {
            info!("Report written to {}", path.display());
        }
    }

    ExitCode::SUCCESS
}
