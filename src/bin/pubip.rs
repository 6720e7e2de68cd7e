//! pubip CLI
//!
//! Prints the host's public IP address.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use pubip::{
    format_result, AddressFamily, CompletionJob, DetectionRequest, Detector, DetectorConfig,
    IpResult, OutputFormat, Strategy,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

/// pubip - discover your public IP address
#[derive(Parser)]
#[command(name = "pubip")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address family to look for
    #[arg(short, long, value_enum, default_value_t = FamilyArg::Ipv4)]
    family: FamilyArg,

    /// How far detection may escalate
    #[arg(short, long, value_enum, default_value_t = StrategyArg::LocalWithStun)]
    strategy: StrategyArg,

    /// Output format
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,

    /// JSONP callback name
    #[arg(long, default_value = "callback")]
    callback: String,

    /// JSON configuration file (defaults apply when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run detection on a background worker and deliver the result through
    /// a completion queue
    #[arg(long = "async")]
    run_async: bool,

    /// Only report whether the gateway answers NAT-PMP or PCP
    #[arg(long)]
    check_local: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FamilyArg {
    Ipv4,
    Ipv6,
    Ipv6PreferIpv4,
}

impl From<FamilyArg> for AddressFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Ipv4 => AddressFamily::IPv4Only,
            FamilyArg::Ipv6 => AddressFamily::IPv6Only,
            FamilyArg::Ipv6PreferIpv4 => AddressFamily::IPv6PreferIPv4,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    LocalOnly,
    LocalWithStun,
    Full,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::LocalOnly => Strategy::LocalOnly,
            StrategyArg::LocalWithStun => Strategy::LocalWithStun,
            StrategyArg::Full => Strategy::Full,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
    JsonFull,
    Jsonp,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::JsonFull => OutputFormat::JsonFull,
            FormatArg::Jsonp => OutputFormat::Jsonp,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    pubip::init_with_level(if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    });

    let config = match &cli.config {
        Some(path) => DetectorConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => DetectorConfig::default(),
    };

    let detector = Arc::new(Detector::new(&config));

    if cli.check_local {
        let available = detector.is_local_detection_available();
        println!(
            "Local detection {}",
            if available { "available" } else { "unavailable" }
        );
        return Ok(exit_code(available));
    }

    let request = DetectionRequest::new(cli.family.into(), cli.strategy.into());
    let format = OutputFormat::from(cli.format);

    let success = if cli.run_async {
        run_async(detector, request, format, cli.callback)?
    } else {
        let result = detector.detect(request);
        print_result(&result, format, &cli.callback)
    };

    Ok(exit_code(success))
}

/// Detect on a runtime worker and run the completion on this thread
fn run_async(
    detector: Arc<Detector>,
    request: DetectionRequest,
    format: OutputFormat,
    callback: String,
) -> anyhow::Result<bool> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let (tx, rx) = mpsc::channel::<CompletionJob>();
    let success = Arc::new(AtomicBool::new(false));
    let flag = success.clone();

    detector.detect_with_callback(runtime.handle(), request, tx, move |result| {
        flag.store(print_result(&result, format, &callback), Ordering::SeqCst);
    });

    let job = rx
        .recv()
        .context("Detection finished without delivering a result")?;
    job();

    Ok(success.load(Ordering::SeqCst))
}

fn print_result(result: &IpResult, format: OutputFormat, callback: &str) -> bool {
    let rendered = format_result(result, format, callback);
    if !rendered.is_empty() {
        println!("{}", rendered);
    }
    if !result.is_success() {
        eprintln!("Error: {}", result.error());
    }
    result.is_success()
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
