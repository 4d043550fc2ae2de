//! # Audio Worker
//!
//! Dedicated thread that owns the capture stream, the calibration controller
//! and the detection session. It talks to the main thread only through
//! crossbeam channels:
//!
//! - `commands` carries the player's confirmation and the shutdown request
//! - `events` carries prompts, the calibration result and committed notes

use crossbeam_channel::{after, select, Receiver, Sender};
use cpal::traits::StreamTrait;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fretkey_core::{
    audio, Calibration, CalibrationController, CalibrationPhase, CalibrationProfile,
    DetectionSession, DetectorConfig, NoteEvent,
};

/// Messages from the main thread to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    /// The player is ready for the instrument phase.
    Confirm,
    Shutdown,
}

/// Messages from the worker to the main thread.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    CaptureStarted { sample_rate: u32 },
    NoisePhaseStarted,
    /// Noise measured; the worker blocks until `WorkerCommand::Confirm`.
    AwaitingConfirmation { noise_level: f32 },
    InstrumentPhaseStarted,
    Calibrated(Calibration),
    Listening,
    Note(NoteEvent),
    Failed(String),
    Stopped,
}

/// Calibration timing handed to the worker.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationPlan {
    pub noise: Duration,
    pub instrument: Duration,
}

/// Handle to the running worker thread.
#[derive(Debug)]
pub struct AudioWorker {
    commands: Sender<WorkerCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AudioWorker {
    /// Spawns the worker. With `plan == None` calibration is skipped and the
    /// default profile is used.
    pub fn spawn(
        config: DetectorConfig,
        device: Option<String>,
        plan: Option<CalibrationPlan>,
        events: Sender<WorkerEvent>,
    ) -> Self {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let thread_handle = thread::spawn(move || {
            log::debug!("[AUDIO-THREAD] Starting audio thread...");
            if let Err(e) = run(config, device.as_deref(), plan, &command_rx, &events) {
                log::error!("[AUDIO-THREAD] {:#}", e);
                let _ = events.send(WorkerEvent::Failed(format!("{:#}", e)));
            }
            let _ = events.send(WorkerEvent::Stopped);
            log::debug!("[AUDIO-THREAD] Audio thread finished");
        });
        Self {
            commands: command_tx,
            thread_handle: Some(thread_handle),
        }
    }

    pub fn confirm(&self) {
        let _ = self.commands.send(WorkerCommand::Confirm);
    }

    /// Requests shutdown and waits for the thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("[MAIN] Audio thread panicked");
            }
        }
    }
}

/// Outcome of waiting on the channels during one step.
enum Step {
    Continue,
    Deadline,
    Stop,
}

fn run(
    mut config: DetectorConfig,
    device: Option<&str>,
    plan: Option<CalibrationPlan>,
    commands: &Receiver<WorkerCommand>,
    events: &Sender<WorkerEvent>,
) -> anyhow::Result<()> {
    let (raw_audio_tx, raw_audio_rx) = crossbeam_channel::bounded(audio::CHUNK_QUEUE_CAPACITY);
    let (stream, sample_rate) =
        audio::start_audio_capture(raw_audio_tx, config.sample_rate, device)?;
    config.sample_rate = sample_rate;
    let _ = events.send(WorkerEvent::CaptureStarted { sample_rate });

    let profile = match plan {
        Some(plan) => match calibrate(&config, plan, &raw_audio_rx, commands, events)? {
            Some(calibration) => {
                let profile = calibration.profile;
                let _ = events.send(WorkerEvent::Calibrated(calibration));
                profile
            }
            None => return stop_stream(stream),
        },
        None => CalibrationProfile::default(),
    };

    let mut session = DetectionSession::new(config, profile)?;
    let _ = events.send(WorkerEvent::Listening);

    loop {
        select! {
            recv(raw_audio_rx) -> msg => match msg {
                Ok(chunk) => {
                    if let Some(event) = session.feed(&chunk, Instant::now()) {
                        if events.send(WorkerEvent::Note(event)).is_err() {
                            break;
                        }
                    }
                }
                Err(_) => {
                    log::warn!("[AUDIO-THREAD] Audio channel closed");
                    break;
                }
            },
            recv(commands) -> cmd => match cmd {
                Ok(WorkerCommand::Confirm) => {}
                Ok(WorkerCommand::Shutdown) | Err(_) => {
                    log::debug!("[AUDIO-THREAD] Received shutdown signal");
                    break;
                }
            },
        }
    }

    // In-flight window and history are discarded, not flushed.
    session.reset();
    stop_stream(stream)
}

fn stop_stream(stream: cpal::Stream) -> anyhow::Result<()> {
    if let Err(e) = stream.pause() {
        log::warn!("[AUDIO-THREAD] Error pausing stream: {}", e);
    }
    drop(stream);
    Ok(())
}

/// Runs both calibration phases. Returns `None` when shutdown was requested
/// before calibration finished.
fn calibrate(
    config: &DetectorConfig,
    plan: CalibrationPlan,
    raw_audio: &Receiver<Vec<u8>>,
    commands: &Receiver<WorkerCommand>,
    events: &Sender<WorkerEvent>,
) -> anyhow::Result<Option<Calibration>> {
    let mut controller = CalibrationController::new(config);

    controller.begin_noise_phase()?;
    let _ = events.send(WorkerEvent::NoisePhaseStarted);
    let deadline = after(plan.noise);
    while controller.phase() == CalibrationPhase::Noise {
        match pump(&mut controller, raw_audio, commands, &deadline) {
            Step::Stop => return Ok(None),
            Step::Deadline => {
                log::info!("[AUDIO-THREAD] noise phase time limit reached");
                controller.finish_noise_phase()?;
            }
            Step::Continue => {}
        }
    }

    let _ = events.send(WorkerEvent::AwaitingConfirmation {
        noise_level: controller.noise_level(),
    });
    loop {
        select! {
            // Keep draining capture so the queue does not overflow while waiting.
            recv(raw_audio) -> msg => if msg.is_err() { return Ok(None); },
            recv(commands) -> cmd => match cmd {
                Ok(WorkerCommand::Confirm) => break,
                Ok(WorkerCommand::Shutdown) | Err(_) => return Ok(None),
            },
        }
    }

    controller.confirm_ready()?;
    let _ = events.send(WorkerEvent::InstrumentPhaseStarted);
    let deadline = after(plan.instrument);
    while controller.phase() == CalibrationPhase::Instrument {
        match pump(&mut controller, raw_audio, commands, &deadline) {
            Step::Stop => return Ok(None),
            Step::Deadline => {
                log::info!("[AUDIO-THREAD] instrument phase time limit reached");
                controller.finish_instrument_phase()?;
            }
            Step::Continue => {}
        }
    }

    Ok(Some(controller.finalize()?))
}

/// Waits for the next chunk, command or deadline and feeds chunks to the controller.
fn pump(
    controller: &mut CalibrationController,
    raw_audio: &Receiver<Vec<u8>>,
    commands: &Receiver<WorkerCommand>,
    deadline: &Receiver<Instant>,
) -> Step {
    select! {
        recv(raw_audio) -> msg => match msg {
            Ok(chunk) => {
                controller.feed(&chunk);
                Step::Continue
            }
            Err(_) => Step::Stop,
        },
        recv(commands) -> cmd => match cmd {
            Ok(WorkerCommand::Confirm) => Step::Continue,
            Ok(WorkerCommand::Shutdown) | Err(_) => Step::Stop,
        },
        recv(deadline) -> _ => Step::Deadline,
    }
}
