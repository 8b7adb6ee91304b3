use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use slotwatch::{
    CancellationToken, EventSource, ScriptedSource, SlotEvent, WatchError, WatchSummary, Watcher,
    WatcherConfig,
};

#[derive(Debug, PartialEq, Eq)]
struct Args {
    script: PathBuf,
    capacity: Option<usize>,
    poll_timeout_ms: Option<u64>,
    idle_backoff_ms: Option<u64>,
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let argv: Vec<String> = std::env::args().collect();

    let args = match parse_args(&argv) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: slotwatch <script.jsonl> [options]");
            eprintln!();
            eprintln!("Arguments:");
            eprintln!("  <script.jsonl>          Slot events to replay, one JSON object per line");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --capacity <n>          Maximum tracked slots [default: 255]");
            eprintln!("  --poll-timeout-ms <ms>  Wait per poll [default: 1000]");
            eprintln!("  --idle-backoff-ms <ms>  Sleep after an empty poll [default: 1000]");
            eprintln!("  --json                  Print events as JSON lines");
            process::exit(2);
        }
    };

    init_tracing();

    if let Err(e) = run(args).await {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// Initialize tracing with SLOTWATCH_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("SLOTWATCH_LOG").as_deref() {
            Ok("trace") => "trace",
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("slotwatch={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut script: Option<PathBuf> = None;
    let mut capacity = None;
    let mut poll_timeout_ms = None;
    let mut idle_backoff_ms = None;
    let mut json = false;

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--capacity" => {
                i += 1;
                let n: usize = parse_value(args.get(i), "--capacity")?;
                if n == 0 {
                    return Err("--capacity must be at least 1".to_string());
                }
                capacity = Some(n);
            }
            "--poll-timeout-ms" => {
                i += 1;
                poll_timeout_ms = Some(parse_value(args.get(i), "--poll-timeout-ms")?);
            }
            "--idle-backoff-ms" => {
                i += 1;
                idle_backoff_ms = Some(parse_value(args.get(i), "--idle-backoff-ms")?);
            }
            "--json" => json = true,
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => {
                if script.is_some() {
                    return Err(format!("unexpected argument: {arg}"));
                }
                script = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    let script = script.ok_or("missing required argument: <script.jsonl>")?;
    Ok(Args {
        script,
        capacity,
        poll_timeout_ms,
        idle_backoff_ms,
        json,
    })
}

fn parse_value<T: std::str::FromStr>(value: Option<&String>, flag: &str) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{flag} requires a value"))?;
    value
        .parse()
        .map_err(|_| format!("invalid value for {flag}: '{value}'"))
}

async fn run(args: Args) -> anyhow::Result<()> {
    tracing::info!("slotwatch {}", env!("CARGO_PKG_VERSION"));

    let mut config = WatcherConfig::from_env()?;
    if let Some(capacity) = args.capacity {
        config = config.with_capacity(capacity);
    }
    if let Some(ms) = args.poll_timeout_ms {
        config = config.with_poll_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = args.idle_backoff_ms {
        config = config.with_idle_backoff(Duration::from_millis(ms));
    }

    let source = ScriptedSource::from_path(&args.script)
        .with_context(|| format!("loading {}", args.script.display()))?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping");
            shutdown.cancel();
        }
    });

    let (result, _stdout) =
        watch_and_print(source, config, cancel, args.json, std::io::stdout()).await?;
    let summary = result?;

    tracing::info!(
        inserted = summary.inserted,
        removed = summary.removed,
        missed_removals = summary.missed_removals,
        tracking_failures = summary.tracking_failures,
        tracked = summary.tracked,
        "Done"
    );
    Ok(())
}

/// Run the watcher and print every classified event to `out`.
///
/// The printer is drained before the watch result is returned, so events
/// emitted before a watch error still reach `out`.
async fn watch_and_print<S, W>(
    source: S,
    config: WatcherConfig,
    cancel: CancellationToken,
    json: bool,
    mut out: W,
) -> anyhow::Result<(Result<WatchSummary, WatchError>, W)>
where
    S: EventSource,
    W: Write + Send + 'static,
{
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<SlotEvent>();
    let mut watcher = Watcher::new(source, config).with_events(events_tx);
    tracing::debug!(config = ?watcher.config(), "Watcher configured");

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let written = if json {
                match serde_json::to_string(&event) {
                    Ok(line) => writeln!(out, "{line}"),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to serialize event");
                        continue;
                    }
                }
            } else {
                writeln!(out, "{event}")
            };
            if let Err(e) = written {
                tracing::warn!(error = %e, "Failed to print event");
            }
        }
        if let Err(e) = out.flush() {
            tracing::warn!(error = %e, "Failed to flush event output");
        }
        out
    });

    let result = watcher.run(cancel).await;
    // Dropping the watcher closes the event channel so the printer drains and exits.
    drop(watcher);
    let out = printer.await?;
    Ok((result, out))
}
