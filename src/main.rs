use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use querytap_capture::ReplayPacketSource;
use querytap_core::config::EngineConfig;
use querytap_core::conversation::InvariantMode;
use querytap_core::pipeline::PipelineDriver;
use querytap_core::reaper::ReaperConfig;
use querytap_core::sink::OutputSink;
use querytap_sink::TextSink;

#[derive(Parser)]
#[command(name = "querytap", about = "Passive MySQL query/response observer", version)]
struct Cli {
    /// MySQL server host to observe (accepted for parity; the replay backend
    /// doesn't filter by it — a live capture backend would)
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// MySQL server port to observe
    #[arg(short = 'P', long, default_value_t = 3306)]
    port: u16,

    /// Network interface to capture on (ignored by the replay backend)
    #[arg(short, long)]
    interface: Option<String>,

    /// Verbosity: 0 = warnings only, 1 = normal, 2 = verbose, 3 = dump
    #[arg(short, long, default_value_t = 1)]
    log_level: u8,

    /// JSON-lines capture file to replay; omit or pass `-` to read stdin
    #[arg(long)]
    capture_file: Option<PathBuf>,

    /// Output path for rendered conversations; omit or pass `-` for stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seconds of inactivity before a buffered stream is discarded
    #[arg(long, default_value_t = 180)]
    traffic_timeout_secs: u64,

    /// Seconds before an in-flight conversation is discarded unanswered
    #[arg(long, default_value_t = 180)]
    conversation_timeout_secs: u64,

    /// Seconds between reaper sweeps
    #[arg(long, default_value_t = 30)]
    reap_interval_secs: u64,

    /// Log and discard protocol invariant violations instead of aborting
    #[arg(long)]
    lenient: bool,
}

fn init_tracing(log_level: u8) {
    let directive = match log_level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_sink(output: Option<PathBuf>) -> anyhow::Result<Box<dyn OutputSink>> {
    match output {
        None => Ok(Box::new(TextSink::stdout())),
        Some(path) if path.as_os_str() == "-" => Ok(Box::new(TextSink::stdout())),
        Some(path) => {
            let file = File::create(&path)?;
            Ok(Box::new(TextSink::new(file)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    eprintln!(
        "querytap: observing {}:{} ({})",
        cli.host,
        cli.port,
        cli.interface.as_deref().unwrap_or("any interface")
    );

    let engine_config = EngineConfig {
        reaper: ReaperConfig {
            traffic_timeout: Duration::from_secs(cli.traffic_timeout_secs),
            conversation_timeout: Duration::from_secs(cli.conversation_timeout_secs),
        },
        reap_interval: Duration::from_secs(cli.reap_interval_secs),
        invariant_mode: if cli.lenient { InvariantMode::Lenient } else { InvariantMode::Strict },
        ..EngineConfig::default()
    };

    let source: Box<dyn querytap_core::source::PacketSource> = match &cli.capture_file {
        Some(path) if path.as_os_str() != "-" => Box::new(ReplayPacketSource::from_file(
            path.clone(),
            engine_config.traffic_channel_capacity,
        )),
        _ => Box::new(ReplayPacketSource::from_stdin(engine_config.traffic_channel_capacity)),
    };

    let sink = build_sink(cli.output)?;

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let driver = PipelineDriver::new(engine_config);
    let stats = driver.run(source, sink, shutdown).await?;

    eprintln!("querytap: shutting down");
    eprintln!("{stats}");

    Ok(())
}
