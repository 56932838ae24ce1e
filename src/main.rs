use bucketsync::{
    run_replication, DiscoveryHints, ReplicationConfig, ReplicationError, RunStatus,
    S3StorageClient,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "bucketsync")]
#[command(about = "Replicate an S3 bucket into another bucket via server-side copy", long_about = None)]
#[command(version)]
struct Args {
    /// Source bucket name
    #[arg(long, env = "SOURCE_BUCKET")]
    source_bucket: String,

    /// Destination bucket name
    #[arg(long, env = "DEST_BUCKET")]
    dest_bucket: String,

    /// Source bucket region
    #[arg(long, env = "SOURCE_REGION", default_value = "us-east-1")]
    source_region: String,

    /// Destination bucket region
    #[arg(long, env = "DEST_REGION", default_value = "us-east-1")]
    dest_region: String,

    /// Classify objects without copying anything
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Worker pool size
    #[arg(long, env = "MAX_WORKERS", default_value_t = 10)]
    max_workers: usize,

    /// Abort instead of probing for objects when listing is denied
    #[arg(long)]
    no_fallback: bool,

    /// Extension hints for probe discovery (comma-separated, e.g. "pdf,csv")
    #[arg(long, env = "FILE_EXTENSIONS", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Folder hints for probe discovery (comma-separated)
    #[arg(long, env = "FOLDER_PATTERNS", value_delimiter = ',')]
    folders: Vec<String>,

    /// Key-prefix hints for probe discovery (comma-separated)
    #[arg(long, env = "KEY_PREFIXES", value_delimiter = ',')]
    prefixes: Vec<String>,

    /// File receiving keys found by probe discovery
    #[arg(long, default_value = "discovered_objects.txt")]
    discovered_keys: PathBuf,

    /// Key file from a previous discovery run, probed before generated patterns
    #[arg(long)]
    seed_keys: Option<PathBuf>,

    /// Run-level deadline (e.g. "2h", "90m")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("bucketsync={}", log_level))
        .init();

    info!("source: {} ({})", args.source_bucket, args.source_region);
    info!("destination: {} ({})", args.dest_bucket, args.dest_region);
    if args.dry_run {
        info!("dry-run mode: the destination will not be modified");
    }

    let source = S3StorageClient::for_region(&args.source_region).await;
    let dest = S3StorageClient::for_region(&args.dest_region).await;

    // Bucket accessibility is checked before any object work begins; a
    // failure here aborts with no partial summary.
    if let Err(cause) = dest.check_bucket(&args.dest_bucket).await {
        let err = ReplicationError::FatalInit(format!(
            "destination bucket '{}' is not accessible: {}",
            args.dest_bucket, cause
        ));
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    let config = ReplicationConfig {
        source_bucket: args.source_bucket,
        dest_bucket: args.dest_bucket,
        dry_run: args.dry_run,
        max_workers: args.max_workers,
        fallback_discovery: !args.no_fallback,
        hints: DiscoveryHints {
            extensions: args.extensions,
            folders: args.folders,
            prefixes: args.prefixes,
        },
        discovered_keys_path: Some(args.discovered_keys),
        seed_keys_path: args.seed_keys,
        run_timeout: args.timeout,
    };

    match run_replication(Arc::new(source), Arc::new(dest), config).await {
        Ok(summary) => {
            let mut report = serde_json::to_value(&summary)?;
            report["status"] = serde_json::to_value(summary.status())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            match summary.status() {
                RunStatus::Failed => {
                    error!(
                        "failure ratio {:.1}% exceeds the tolerated threshold",
                        summary.failure_ratio() * 100.0
                    );
                    std::process::exit(1);
                }
                RunStatus::Truncated => {
                    error!("run deadline expired before every object was processed");
                    std::process::exit(1);
                }
                _ => {}
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
