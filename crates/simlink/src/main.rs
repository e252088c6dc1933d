mod host;

use std::io::Read;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;

use simlink_channel::{
    open_pipe_reader, open_pipe_writer, ChannelConfig, FrameSender, Result, SimChannel,
};

use crate::host::LoopbackHost;

#[derive(Parser, Debug)]
#[command(name = "simlink", version, about = "Loopback harness for the simlink controller channel")]
struct Cli {
    /// Read controller frames from this FIFO path instead of stdin.
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Write frames to this FIFO path instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Trace every frame sent and dispatched.
    #[arg(short, long)]
    verbose: bool,

    /// Seconds between dispatcher polls.
    #[arg(long, value_name = "SECS", default_value_t = 0.01)]
    tick_interval: f64,

    /// Endpoints to preload as `__node<i>.index` properties.
    #[arg(long, value_name = "N", default_value_t = 10)]
    max_clients: u32,

    /// Emit diagnostics as JSON lines instead of plain text.
    #[arg(long)]
    log_json: bool,

    /// Minimum diagnostic level (error, warn, info, debug, trace, off).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LevelFilter,
}

/// Route all diagnostics to stderr. When the channel is bound to stdio,
/// stdout carries wire bytes and a stray log line there would corrupt
/// framing for the controller on the other end.
fn init_diagnostics(cli: &Cli) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(cli.log_level)
        .with_ansi(false)
        .with_target(false);
    let result = if cli.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(err) = result {
        eprintln!("diagnostics setup failed: {err}");
    }
}

fn main() {
    let cli = Cli::parse();
    init_diagnostics(&cli);

    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ChannelConfig {
        verbose: cli.verbose,
        ..ChannelConfig::default()
    };
    let tick = Duration::from_secs_f64(cli.tick_interval.max(0.0));

    let output: Box<dyn std::io::Write + Send> = match &cli.output {
        Some(path) => Box::new(open_pipe_writer(path)?),
        None => Box::new(std::io::stdout()),
    };
    let sender = FrameSender::new(output, &config);
    let host = Box::new(LoopbackHost::new(sender.clone()));

    let running = Arc::new(AtomicBool::new(true));
    install_shutdown_handler(Arc::clone(&running));

    match &cli.input {
        Some(path) => {
            let input = open_pipe_reader(path)?;
            let channel = SimChannel::from_parts(input, sender, host, config);
            run_loop(channel, cli.max_clients, tick, running)
        }
        None => {
            let mut channel = SimChannel::from_parts(std::io::stdin(), sender, host, config);
            channel.engage_raw_mode()?;
            run_loop(channel, cli.max_clients, tick, running)
        }
    }
}

fn run_loop<I: Read + AsRawFd>(
    mut channel: SimChannel<I>,
    max_clients: u32,
    tick: Duration,
    running: Arc<AtomicBool>,
) -> Result<()> {
    // Indices the controller addresses endpoints by, same scheme the
    // simulation publishes.
    for i in 1..=max_clients {
        channel.set_property(format!("__node{i}.index"), i.to_string());
    }
    info!(max_clients, "channel up, polling for controller frames");

    while running.load(Ordering::SeqCst) {
        channel.poll_once()?;
        std::thread::sleep(tick);
    }

    info!("shutting down");
    Ok(())
}

fn install_shutdown_handler(running: Arc<AtomicBool>) {
    if let Err(err) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!(error = %err, "signal handler setup failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let cli = Cli::try_parse_from(["simlink"]).expect("bare invocation should parse");
        assert!(cli.input.is_none());
        assert!(cli.output.is_none());
        assert!(!cli.verbose);
        assert_eq!(cli.max_clients, 10);
        assert!((cli.tick_interval - 0.01).abs() < f64::EPSILON);
        assert!(!cli.log_json);
        assert_eq!(cli.log_level, LevelFilter::INFO);
    }

    #[test]
    fn parses_diagnostic_flags() {
        let cli = Cli::try_parse_from(["simlink", "--log-json", "--log-level", "debug"])
            .expect("diagnostic flags should parse");
        assert!(cli.log_json);
        assert_eq!(cli.log_level, LevelFilter::DEBUG);

        assert!(Cli::try_parse_from(["simlink", "--log-level", "chatty"]).is_err());
    }

    #[test]
    fn parses_pipe_paths_and_flags() {
        let cli = Cli::try_parse_from([
            "simlink",
            "--input",
            "/tmp/to-sim.pipe",
            "--output",
            "/tmp/from-sim.pipe",
            "--verbose",
            "--tick-interval",
            "0.5",
            "--max-clients",
            "3",
        ])
        .expect("pipe args should parse");

        assert_eq!(cli.input.as_deref(), Some(std::path::Path::new("/tmp/to-sim.pipe")));
        assert_eq!(
            cli.output.as_deref(),
            Some(std::path::Path::new("/tmp/from-sim.pipe"))
        );
        assert!(cli.verbose);
        assert_eq!(cli.max_clients, 3);
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["simlink", "--bogus"]).is_err());
    }
}
