use anyhow::Result;
use clap::Parser;
use proxy_sieve::{
    logging,
    proxy::probe::{
        DEFAULT_API_TIMEOUT_SECS, DEFAULT_API_URL, DEFAULT_CONNECT_TIMEOUT_SECS,
        DEFAULT_REFERENCE_HOST, DEFAULT_REFERENCE_PATH,
    },
    CheckerConfig, ProbeMode, ProxyChecker, DEFAULT_INPUT_FILE, DEFAULT_OUTPUT_FILE,
};
use std::path::PathBuf;
use std::time::Duration;

/// Check a list of proxies and keep the live ones with latency and ASN metadata
#[derive(Parser)]
#[command(name = "proxy-sieve")]
#[command(about = "Check a list of proxies and keep the live ones with latency and ASN metadata")]
struct Cli {
    /// Input file with one `host,port[,country[,organization]]` per line
    #[arg(short, long, default_value = DEFAULT_INPUT_FILE)]
    input: PathBuf,

    /// Output file for live proxies (overwritten)
    #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
    output: PathBuf,

    /// Probe strategy (api, direct)
    #[arg(short, long, default_value = "api")]
    mode: String,

    /// Checking service URL used by the api strategy
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Reference host used by the direct strategy
    #[arg(long, default_value = DEFAULT_REFERENCE_HOST)]
    reference_host: String,

    /// Metadata path on the reference host
    #[arg(long, default_value = DEFAULT_REFERENCE_PATH)]
    reference_path: String,

    /// Timeout in seconds for checking service requests
    #[arg(long, default_value_t = DEFAULT_API_TIMEOUT_SECS)]
    api_timeout: u64,

    /// Timeout in seconds for each step of a direct probe
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout: u64,

    /// Number of proxies probed at once
    #[arg(short = 'n', long, default_value_t = 1)]
    concurrency: usize,

    /// Skip repeated host:port entries
    #[arg(long)]
    dedupe: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mode: ProbeMode = cli.mode.parse()?;
    let config = CheckerConfig::new()
        .with_mode(mode)
        .with_api_url(cli.api_url)
        .with_api_timeout(Duration::from_secs(cli.api_timeout))
        .with_connect_timeout(Duration::from_secs(cli.connect_timeout))
        .with_reference(cli.reference_host, cli.reference_path)
        .with_concurrency(cli.concurrency)
        .with_dedupe(cli.dedupe);

    let checker = ProxyChecker::with_config(&config).await?;
    checker.check_file(&cli.input, &cli.output).await?;

    Ok(())
}
