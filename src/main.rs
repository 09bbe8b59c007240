use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::builder::PossibleValuesParser;
use clap::{ArgAction, Parser};
use tracing::{info, warn};

use sasquatrr::verify::default_workers;
use sasquatrr::{
    aggregate, logging, Aggregator, Domain, Error, NetworkProbe, OutputStyle, Reporter, RunConfig,
    Strategy, Verifier, VerifyConfig,
};

#[derive(Parser)]
#[command(name = "sasquatrr")]
#[command(about = "Enumerate typosquat domains and check which of them are live")]
struct Cli {
    /// Base domain to generate lookalikes for (e.g. example.com)
    domain: String,

    /// Strategy to apply; repeat for several (default: every strategy except combosquatting)
    #[arg(short = 's', long = "strategy", value_parser = PossibleValuesParser::new(Strategy::NAMES.iter().copied()))]
    strategies: Vec<String>,

    /// Number of concurrent probe workers
    #[arg(short, long, default_value_t = default_workers())]
    workers: usize,

    /// Attempt a TLS handshake on port 443 for resolving candidates
    #[arg(long)]
    tls: bool,

    /// Attempt a plain HTTP request on port 80 for resolving candidates
    #[arg(long)]
    http: bool,

    /// Timeout for each probe step, in seconds
    #[arg(short, long, default_value_t = 5.0)]
    timeout: f64,

    /// Restrict TLD-oriented strategies to these TLDs (repeat or comma-separate)
    #[arg(long = "tld", value_delimiter = ',')]
    tlds: Vec<String>,

    /// JSON keyboard adjacency table for replace/double_hit
    #[arg(long)]
    keyboard_table: Option<PathBuf>,

    /// JSON homoglyph table
    #[arg(long)]
    homoglyph_table: Option<PathBuf>,

    /// JSON similar-character table
    #[arg(long)]
    similar_table: Option<PathBuf>,

    /// Keyword file for combosquatting (enables the strategy)
    #[arg(long)]
    dictionary: Option<PathBuf>,

    /// Maximum number of candidates to generate
    #[arg(short = 'n', long)]
    max_candidates: Option<usize>,

    /// Print candidates without probing them
    #[arg(long)]
    generate_only: bool,

    /// Skip the banner and run configuration block
    #[arg(long)]
    no_banner: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        RunConfig {
            domain: self.domain,
            strategies: self.strategies,
            tlds: self.tlds,
            keyboard_table: self.keyboard_table,
            homoglyph_table: self.homoglyph_table,
            similar_table: self.similar_table,
            dictionary: self.dictionary,
            max_candidates: self.max_candidates,
            generate_only: self.generate_only,
            banner: !self.no_banner,
            verify: VerifyConfig {
                workers: self.workers,
                enable_tls: self.tls,
                enable_http: self.http,
                // negative or non-finite values fail validation as zero
                probe_timeout: Duration::try_from_secs_f64(self.timeout).unwrap_or(Duration::ZERO),
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let style = OutputStyle::from_env();
    logging::init(cli.verbose, style);
    let mut reporter = Reporter::stderr(style);

    match run(cli.into_config(), &mut reporter).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            reporter.error(&format!("{err:#}"));
            exit_code(&err)
        }
    }
}

async fn run(config: RunConfig, reporter: &mut Reporter<io::Stderr>) -> anyhow::Result<()> {
    let started = Instant::now();

    let domain = Domain::parse(&config.domain)?;
    if !config.generate_only {
        config.verify.validate()?;
    }

    if config.banner {
        reporter.banner();
        reporter.run_info(&domain.to_string(), &config.verify, &config.normalized_tlds());
    }

    let generator = config.generator()?;
    let candidates = generator.generate(&domain)?;
    reporter.candidates(candidates.len(), generator.strategies().len());

    let stdout = BufWriter::new(io::stdout());
    if config.generate_only {
        aggregate::write_candidates(stdout, &candidates).context("writing candidates")?;
        return Ok(());
    }

    let probe = NetworkProbe::new(config.verify.probe_timeout).context("building network probe")?;
    let verifier = Verifier::new(probe, config.verify.clone())?;

    let cancel = verifier.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling outstanding probes");
            cancel.cancel();
        }
    });

    info!(candidates = candidates.len(), workers = config.verify.workers, "verifying candidates");
    let progress = reporter.progress(candidates.len());
    let results = verifier.verify(candidates);
    let summary = Aggregator::new(stdout)
        .with_progress(progress.clone())
        .consume(results)
        .await
        .context("writing results")?;
    progress.finish_and_clear();

    reporter.summary(&summary, started.elapsed());
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<Error>() {
        Some(Error::InvalidDomain { .. }) => ExitCode::from(2),
        Some(Error::Table(_)) => ExitCode::from(3),
        Some(Error::UnknownStrategy(_) | Error::Config(_)) => ExitCode::from(4),
        None => ExitCode::FAILURE,
    }
}
