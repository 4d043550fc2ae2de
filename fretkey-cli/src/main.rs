//! # fretkey
//!
//! Command-line front end: captures the microphone, calibrates against the
//! room and the instrument, then types one key for every committed note.
//!
//! ## Architecture
//! - **Main Thread**: reads commands from stdin and injects keys into the
//!   focused application (or echoes them, or prints JSON)
//! - **Audio Thread**: owns the capture stream, calibration and detection
//! - **Communication**: crossbeam channels in both directions
//!
//! Prompts and logs go to stderr so stdout only carries the echoed text or
//! the JSON event stream.

mod cli;
mod keyboard;
mod worker;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{select, Receiver};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use cli::{Args, OutputMode};
use fretkey_core::inject::{inject_or_log, ConsoleInjector, DryRunInjector, KeyInjector};
use fretkey_core::calibration::{INSTRUMENT_SAMPLE_LIMIT, NOISE_SAMPLE_LIMIT};
use fretkey_core::{audio, Calibration, KeyAction, KeyMapper, MappingScheme, NoteEvent};
use keyboard::SystemKeyboard;
use worker::{AudioWorker, CalibrationPlan, WorkerEvent};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_schemes {
        return print_schemes(&args);
    }
    if args.list_input_devices {
        for name in audio::list_input_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = args.detector_config()?;
    let mapper = args.key_mapper(config.scheme)?;
    log::info!(
        "[MAIN] scheme {}, window {} samples, debounce {:?}, consistency {}",
        mapper.current_scheme(),
        config.window_size,
        config.debounce,
        config.consistency_threshold
    );

    let plan = (!args.skip_calibration).then(|| CalibrationPlan {
        noise: args.noise_duration(),
        instrument: args.instrument_duration(),
    });

    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let worker = AudioWorker::spawn(config, args.input_device.clone(), plan, event_tx);
    let stdin_rx = spawn_stdin_reader();

    let result = run(&args, &mapper, &worker, &event_rx, &stdin_rx);
    log::debug!("[MAIN] Stopping audio worker");
    worker.shutdown();
    result
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn print_schemes(args: &Args) -> Result<()> {
    let mut mapper = args.key_mapper(MappingScheme::Custom)?;
    for scheme in MappingScheme::ALL {
        mapper.set_scheme(scheme.name())?;
        let table: Vec<String> = mapper
            .mappings()
            .iter()
            .map(|(note, action)| format!("{}={}", note, action))
            .collect();
        println!("{:<8} {}", scheme, table.join(" "));
    }
    Ok(())
}

/// Forwards stdin lines to the main loop. The channel closes on EOF.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("[STDIN] read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Sink for committed notes.
enum Output {
    Inject(Box<dyn KeyInjector>),
    Json(io::Stdout),
}

#[derive(Serialize)]
struct NoteRecord<'a> {
    #[serde(flatten)]
    event: &'a NoteEvent,
    cents: f32,
    key: Option<KeyAction>,
}

impl Output {
    fn new(mode: OutputMode) -> Result<Self> {
        let output = match mode {
            OutputMode::Type => {
                let keyboard = SystemKeyboard::new().context(
                    "cannot reach the system keyboard; try --output echo or --output dry-run",
                )?;
                Output::Inject(Box::new(keyboard))
            }
            OutputMode::Echo => Output::Inject(Box::new(ConsoleInjector::new(io::stdout()))),
            OutputMode::DryRun => Output::Inject(Box::new(DryRunInjector::default())),
            OutputMode::Json => Output::Json(io::stdout()),
        };
        Ok(output)
    }

    fn emit(&mut self, event: &NoteEvent, key: Option<KeyAction>) -> Result<()> {
        match self {
            Output::Inject(injector) => {
                if let Some(action) = key {
                    inject_or_log(injector.as_mut(), action);
                }
            }
            Output::Json(out) => {
                let record = NoteRecord {
                    event,
                    cents: event.cents_deviation(),
                    key,
                };
                let line = serde_json::to_string(&record)?;
                writeln!(out, "{}", line)?;
                out.flush()?;
            }
        }
        Ok(())
    }
}

fn run(
    args: &Args,
    mapper: &KeyMapper,
    worker: &AudioWorker,
    events: &Receiver<WorkerEvent>,
    stdin: &Receiver<String>,
) -> Result<()> {
    let mut output = Output::new(args.output)?;
    let deadline = match args.duration_secs {
        Some(secs) => crossbeam_channel::after(Duration::from_secs(secs)),
        None => crossbeam_channel::never(),
    };
    let mut stdin_open = true;

    loop {
        let lines = if stdin_open { stdin.clone() } else { crossbeam_channel::never() };
        select! {
            recv(events) -> msg => {
                let Ok(event) = msg else {
                    log::warn!("[MAIN] Audio worker disconnected");
                    return Ok(());
                };
                match event {
                    WorkerEvent::CaptureStarted { sample_rate } => {
                        log::info!("[MAIN] Capturing at {} Hz", sample_rate);
                    }
                    WorkerEvent::NoisePhaseStarted => {
                        eprintln!("{}", noise_prompt(args.noise_seconds));
                    }
                    WorkerEvent::AwaitingConfirmation { noise_level } => {
                        eprintln!("Noise level: {:.1} Hz", noise_level);
                        eprintln!("Press Enter, then pluck each open string a few times.");
                    }
                    WorkerEvent::InstrumentPhaseStarted => {
                        eprintln!("{}", instrument_prompt(args.instrument_seconds));
                    }
                    WorkerEvent::Calibrated(calibration) => {
                        print_calibration(&calibration, args.json_calibration)?;
                    }
                    WorkerEvent::Listening => {
                        eprintln!("Ready. Play a string to type; enter q to quit.");
                    }
                    WorkerEvent::Note(event) => {
                        let key = mapper.key_for(&event.note);
                        log::debug!(
                            "[MAIN] {} at {:.1} Hz ({:+.0} cents, confidence {:.2}) -> {:?}",
                            event.note,
                            event.frequency,
                            event.cents_deviation(),
                            event.confidence,
                            key
                        );
                        output.emit(&event, key)?;
                    }
                    WorkerEvent::Failed(reason) => {
                        anyhow::bail!("audio worker failed: {}", reason);
                    }
                    WorkerEvent::Stopped => return Ok(()),
                }
            }
            recv(lines) -> line => match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    log::info!("[MAIN] Quit requested");
                    return Ok(());
                }
                Ok(_) => worker.confirm(),
                Err(_) => {
                    // EOF: keep running until the deadline or the worker stops.
                    stdin_open = false;
                }
            },
            recv(deadline) -> _ => {
                log::info!("[MAIN] Duration elapsed, stopping");
                return Ok(());
            }
        }
    }
}

/// Phases end on whichever comes first: the reading count or the time limit.
fn noise_prompt(limit_secs: u64) -> String {
    format!(
        "Measuring background noise ({} readings, up to {}s), keep the strings quiet...",
        NOISE_SAMPLE_LIMIT, limit_secs
    )
}

fn instrument_prompt(limit_secs: u64) -> String {
    format!(
        "Listening to the instrument ({} readings, up to {}s)...",
        INSTRUMENT_SAMPLE_LIMIT, limit_secs
    )
}

fn print_calibration(calibration: &Calibration, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(calibration)
            .context("failed to serialize calibration")?;
        eprintln!("{}", text);
        return Ok(());
    }
    let profile = &calibration.profile;
    let report = &calibration.report;
    let notes: Vec<String> = report.distinct_notes.iter().map(|n| n.to_string()).collect();
    eprintln!("Calibration complete:");
    eprintln!("  noise level:         {:.1} Hz", profile.noise_level);
    eprintln!(
        "  frequency range:     {:.1} - {:.1} Hz",
        profile.frequency_range.min, profile.frequency_range.max
    );
    eprintln!("  magnitude threshold: {}", profile.magnitude_threshold);
    eprintln!(
        "  notes heard:         {}",
        if notes.is_empty() { "none".to_string() } else { notes.join(" ") }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_prompts_give_reading_count_and_time_limit() {
        let noise = noise_prompt(3);
        assert!(noise.contains("30 readings"), "{}", noise);
        assert!(noise.contains("up to 3s"), "{}", noise);

        let instrument = instrument_prompt(10);
        assert!(instrument.contains("100 readings"), "{}", instrument);
        assert!(instrument.contains("up to 10s"), "{}", instrument);
    }
}
