use std::{
    io::{self, BufRead},
    path::PathBuf,
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::Args;
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};
use pulse_channel::{
    BatchSender, Channel, ChannelConfig, DropReason, Dropped, Event, Profile, TimerMode,
};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};

use crate::{
    commands::open_store,
    senders::{DirSender, LineSender},
};

/// How long the reader waits for a flush before giving up on an event.
const BUSY_WAIT: Duration = Duration::from_secs(10);
const SIGNAL_POLL: Duration = Duration::from_millis(100);
const LINE_BUFFER: usize = 1024;

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Batch size preset: strict, standard or debug
    #[arg(long)]
    pub profile: Option<Profile>,

    /// Events per batch (overrides the profile)
    #[arg(long, short = 'n')]
    pub max_batch_size: Option<usize>,

    /// Seconds before a partial batch is flushed
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Fire the interval timer every period instead of restarting it after each flush
    #[arg(long)]
    pub continuous: bool,

    /// Write each batch as a file in this directory instead of to stdout
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Where undeliverable batches are kept
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Do not resend stored batches on startup
    #[arg(long)]
    pub no_replay: bool,
}

#[derive(Debug, Default)]
struct Totals {
    lines: u64,
    invalid: u64,
    dropped: u64,
}

pub fn run(args: IngestArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            error!("[error] {e:#}");
            eprintln!("[ingest] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: IngestArgs) -> Result<ExitCode> {
    let config = build_config(&args);
    if !config.enabled {
        warn!("telemetry is disabled; every event will be dropped");
    }

    let store = open_store(args.store_dir.as_deref())?;
    let sender: Arc<dyn BatchSender> = match &args.out {
        Some(dir) => Arc::new(
            DirSender::new(dir)
                .with_context(|| format!("failed to prepare output dir {}", dir.display()))?,
        ),
        None => Arc::new(LineSender::stdout()),
    };

    let channel = Channel::new(config, sender, store).context("failed to start channel")?;
    if !args.no_replay {
        channel.replay_stored();
    }

    // Signal handlers only set the flag; the loop below notices it.
    let shutdown = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        flag::register(sig, Arc::clone(&shutdown))
            .with_context(|| format!("failed to register signal handler for {sig}"))?;
    }

    let lines = spawn_reader().context("failed to start stdin reader")?;
    let mut totals = Totals::default();
    let mut end_of_input = false;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!("shutdown signal observed; stopping ingest");
            break;
        }

        let line = match lines.recv_timeout(SIGNAL_POLL) {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                error!("failed to read stdin: {e}");
                break;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                end_of_input = true;
                break;
            }
        };

        totals.lines += 1;
        let event = match parse_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                totals.invalid += 1;
                warn!("skipping line {}: {e:#}", totals.lines);
                continue;
            }
        };

        if let Err(dropped) = submit(&channel, event) {
            totals.dropped += 1;
            debug!("line {} dropped: {dropped}", totals.lines);
        }
    }

    // On a signal, pending events go straight to the store.
    if end_of_input && !deliver_remaining(&channel, BUSY_WAIT) {
        warn!("final batch still in flight after {BUSY_WAIT:?}");
    }
    channel.shutdown();

    let summary = serde_json::json!({
        "lines": totals.lines,
        "invalid": totals.invalid,
        "dropped": totals.dropped,
        "channel": channel.stats(),
    });
    eprintln!("{summary}");

    Ok(ExitCode::SUCCESS)
}

fn build_config(args: &IngestArgs) -> ChannelConfig {
    let mut config = ChannelConfig::from_env();
    if let Some(profile) = args.profile {
        config.max_batch_size = profile.max_batch_size();
    }
    if let Some(size) = args.max_batch_size {
        config.max_batch_size = size;
    }
    if let Some(secs) = args.interval {
        config.batch_interval_secs = secs;
    }
    if args.continuous {
        config.timer_mode = TimerMode::Continuous;
    }
    config
}

fn spawn_reader() -> io::Result<Receiver<io::Result<String>>> {
    let (tx, rx) = channel::bounded(LINE_BUFFER);
    thread::Builder::new()
        .name("pulse-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Blank lines yield `None`; anything other than a JSON object is an error.
pub(crate) fn parse_line(line: &str) -> Result<Option<Event>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_str(line).context("invalid JSON")?;
    match Event::try_from(value) {
        Ok(event) => Ok(Some(event)),
        Err(other) => bail!("expected a JSON object, got {}", json_kind(&other)),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Flushes the partial batch to the sender and waits for it. Returns false
/// if a flush is still in flight after `timeout`.
pub(crate) fn deliver_remaining(channel: &Channel, timeout: Duration) -> bool {
    // A flush already in flight would swallow this one.
    if !channel.wait_idle(timeout) {
        return false;
    }
    channel.flush();
    channel.wait_idle(timeout)
}

/// The reader is not a latency-sensitive producer, so instead of losing
/// events to a busy channel it waits for the flush to finish.
fn submit(channel: &Channel, event: Event) -> Result<(), Dropped> {
    loop {
        if channel.is_queue_busy() && !channel.wait_idle(BUSY_WAIT) {
            return Err(Dropped {
                reason: DropReason::ChannelBusy,
            });
        }
        match channel.enqueue(event.clone()) {
            Err(Dropped {
                reason: DropReason::ChannelBusy,
            }) => continue,
            other => return other,
        }
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
