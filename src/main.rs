use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use proxy_sieve::{
    logging, store, AliveLayout, Config, IdentityResolver, Pipeline, ProbeMode, Protocol,
    ProxyChecker, ProxyParser, ProxySet, ProxySource, Result,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Keeps a verified pool of anonymous HTTP/SOCKS4/SOCKS5 proxies
#[derive(Parser)]
#[command(name = "proxy-sieve")]
#[command(about = "Keeps a verified pool of anonymous HTTP/SOCKS4/SOCKS5 proxies")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    options: Options,
}

#[derive(Args)]
struct Options {
    /// Directory holding alive and cache files
    #[arg(short, long, default_value = ".", global = true)]
    data_dir: PathBuf,

    /// Timeout in seconds for each probe round-trip
    #[arg(long, default_value = "10", global = true)]
    timeout: u64,

    /// Number of concurrent probes
    #[arg(short = 'n', long, default_value = "100", global = true)]
    concurrency: usize,

    /// Also require JSON, a latency ceiling and a working HTTPS tunnel
    #[arg(long, global = true)]
    hardened: bool,

    /// Write one alive list per protocol instead of a single file
    #[arg(long, global = true)]
    split: bool,

    /// Echo endpoint returning the caller's address as `origin`
    #[arg(long, default_value = proxy_sieve::DEFAULT_CHECK_URL, global = true)]
    check_url: String,

    /// HTTPS endpoint for the hardened second round-trip
    #[arg(long, default_value = proxy_sieve::DEFAULT_TUNNEL_URL, global = true)]
    tunnel_url: String,

    /// Candidate list as PROTOCOL=URL (repeatable, replaces the defaults)
    #[arg(short, long = "source", global = true)]
    sources: Vec<ProxySource>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, plan, probe and persist (default)
    Run,
    /// Fetch and show what a run would probe, without probing
    Plan,
    /// Probe the proxies in a file without touching stored state
    Check {
        /// Input file containing proxies
        input: PathBuf,
        /// Output file for working proxies
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Protocol for lines without a scheme (http, socks4, socks5)
        #[arg(short, long, default_value = "http")]
        protocol: Protocol,
    },
}

impl Options {
    fn to_config(&self) -> Config {
        let mut config = Config::new()
            .with_data_dir(&self.data_dir)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_concurrency(self.concurrency)
            .with_check_url(&self.check_url)
            .with_tunnel_url(&self.tunnel_url);

        if self.hardened {
            config = config.with_mode(ProbeMode::Hardened);
        }
        if self.split {
            config = config.with_layout(AliveLayout::PerProtocol);
        }
        if !self.sources.is_empty() {
            config = config.with_sources(self.sources.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.options.verbose);

    let config = cli.options.to_config();
    let outcome = match cli.command {
        Some(Commands::Run) | None => run(&config).await,
        Some(Commands::Plan) => show_plan(&config).await,
        Some(Commands::Check {
            input,
            output,
            protocol,
        }) => check(&config, input, output, protocol).await,
    };

    if let Err(e) = outcome {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: &Config) -> Result<()> {
    info!(
        "proxy check run ({:?} probe, {} workers, {}s timeout)",
        config.mode,
        config.concurrency,
        config.timeout.as_secs()
    );
    let pipeline = Pipeline::new(config)?;
    pipeline.run().await?;
    Ok(())
}

async fn show_plan(config: &Config) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    let (snapshot, batch) = pipeline.plan().await?;

    println!("snapshot: {} candidates", snapshot.len());
    println!("recheck:  {}", batch.recheck.len());
    println!("fresh:    {}", batch.fresh.len());
    Ok(())
}

async fn check(
    config: &Config,
    input: PathBuf,
    output: Option<PathBuf>,
    protocol: Protocol,
) -> Result<()> {
    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("reading {}", input.display()))?;
    let proxies = ProxyParser::parse_string(&content, protocol);
    info!("loaded {} proxies from {:?}", proxies.len(), input);

    let resolver = IdentityResolver::new(config)?;
    let self_ip: Arc<str> = resolver
        .resolve_self_ip()
        .await
        .context("cannot verify anonymity without own address")?
        .into();

    let checker = ProxyChecker::new(config);
    let (mut good, bad) = checker
        .check_and_separate(proxies.into_iter().collect(), &self_ip)
        .await;
    info!("results: {} good, {} bad", good.len(), bad.len());

    good.sort_by_key(|r| r.response_time());
    for result in &good {
        if let Some(time) = result.response_time() {
            println!("{} ({}ms)", result.proxy, time.as_millis());
        }
    }

    if let Some(output_path) = output {
        let alive: ProxySet = good.into_iter().map(|r| r.proxy).collect();
        store::write_list(&output_path, alive.iter())?;
        info!("saved {} working proxies to {:?}", alive.len(), output_path);
    }

    Ok(())
}
