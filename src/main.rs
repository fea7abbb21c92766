use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hold_to_talk::capture_buffer::CaptureBuffer;
use hold_to_talk::config::Config;
use hold_to_talk::coordinator::{CoordinatorOptions, StreamingCoordinator, TranscriptEvent};
use hold_to_talk::device::{self, AudioDeviceSource};
use hold_to_talk::dump;
use hold_to_talk::error::SessionError;
use hold_to_talk::hotkey::HotkeyListener;
use hold_to_talk::protocol::UpdateStream;
use hold_to_talk::recognizer::{WhisperRecognizer, RECOGNIZER_SAMPLE_RATE};
use hold_to_talk::session::{SessionAction, SessionState, SessionStateMachine};
use hold_to_talk::sink::{StdoutSink, TranscriptSink};

#[derive(Parser)]
#[command(name = "hold-to-talk")]
#[command(about = "Hold a hotkey, speak, release, get text", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available audio input devices
    ListDevices,
    /// Record a fixed-length session to a WAV file for debugging
    TestRecord {
        /// Name for this recording
        #[arg(default_value = "test1")]
        name: String,
        /// Duration to record in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::ListDevices) => list_devices_command(),
        Some(Commands::TestRecord { name, duration }) => test_record_command(&name, duration),
        None => run_app(),
    }
}

fn list_devices_command() -> Result<()> {
    let names = device::list_input_devices()?;
    if names.is_empty() {
        println!("No input devices found");
    } else {
        println!("Available audio input devices:");
        for name in names {
            println!("  {}", name);
        }
    }
    Ok(())
}

fn test_record_command(name: &str, duration: u64) -> Result<()> {
    let config = Config::load_or_create()?;

    let buffer = Arc::new(CaptureBuffer::new(
        RECOGNIZER_SAMPLE_RATE,
        config.audio.max_session_secs.max(duration),
    ));
    let (err_tx, err_rx) = channel();

    let mut source = AudioDeviceSource::open(&config.audio.device)?;
    source.start_capture(Arc::clone(&buffer), err_tx)?;

    println!("Recording {} seconds...", duration);
    let deadline = Instant::now() + Duration::from_secs(duration);
    while Instant::now() < deadline {
        if let Ok(e) = err_rx.try_recv() {
            source.stop_capture();
            return Err(e.into());
        }
        thread::sleep(Duration::from_millis(50));
    }

    source.stop_capture();
    buffer.close();

    let dir = dump::dump_dir()?;
    std::fs::create_dir_all(&dir).context("Failed to create recordings directory")?;
    let path = dir.join(format!("{}.wav", name));
    dump::write_wav(&buffer, &path)?;

    Ok(())
}

/// Per-session resources. Created on Idle -> Armed, torn down on every exit
/// path back to Idle.
struct ActiveSession {
    buffer: Arc<CaptureBuffer>,
    source: AudioDeviceSource,
    device_errors: Receiver<SessionError>,
    events: Receiver<TranscriptEvent>,
    coordinator: thread::JoinHandle<(Result<String, SessionError>, String, WhisperRecognizer)>,
    flush_deadline: Option<Instant>,
}

fn run_app() -> Result<()> {
    let config = Config::load_or_create()?;

    println!("🎙️  hold-to-talk");
    println!(
        "   Model: {} | Language: {}",
        config.recognition.model, config.recognition.language
    );
    println!("   Hold {} to speak", config.hotkey.talk);

    // Load the model once; each session's coordinator thread takes
    // ownership and hands it back at join.
    let mut recognizer_slot = Some(WhisperRecognizer::new(config.recognition.clone())?);

    let hotkeys = HotkeyListener::new(&config.hotkey)?;
    let mut machine = SessionStateMachine::new();
    let mut sink = StdoutSink;
    let mut active: Option<ActiveSession> = None;
    // JSON wire output, one UpdateStream per session.
    let mut wire: Option<UpdateStream> = None;

    loop {
        if let Some(event) = hotkeys.poll_event() {
            match machine.on_hotkey(event) {
                Ok(SessionAction::AcquireDevice) => {
                    match start_session(&config, &mut recognizer_slot) {
                        Ok(session) => {
                            machine.device_acquired();
                            active = Some(session);
                            let id = machine.session().map(|s| s.id).unwrap_or(0);
                            if config.streaming.wire_updates {
                                wire = Some(UpdateStream::new(id));
                            } else {
                                println!("🔴 Session {} recording", id);
                            }
                        }
                        Err(e) => {
                            machine.device_failed(e.to_string());
                            eprintln!("❌ {}", e);
                        }
                    }
                }
                Ok(SessionAction::BeginFlush) => {
                    if let Some(session) = active.as_mut() {
                        session.flush_deadline = Some(
                            Instant::now() + Duration::from_millis(config.audio.flush_grace_ms),
                        );
                    }
                }
                Ok(SessionAction::None) => {}
                Err(SessionError::Busy) => {
                    eprintln!("⏳ Busy: previous session still finalizing");
                }
                Err(e) => {
                    eprintln!("❌ {}", e);
                }
            }
        }

        if let Some(session) = active.as_mut() {
            // Forward transcript updates as they stabilize.
            for event in session.events.try_iter() {
                deliver(&mut sink, &mut wire, &event);
            }

            // Invariant violations and device loss from the capture side
            // kill the session. Closing the buffer lets the coordinator
            // drain out and deliver the partial transcript.
            if let Ok(e) = session.device_errors.try_recv() {
                eprintln!("❌ {}", e);
                session.source.stop_capture();
                session.buffer.close();
                machine.abort(e);
            }

            // Flush grace elapsed: stop capture, let the coordinator see a
            // closed buffer and run the final pass.
            if let Some(deadline) = session.flush_deadline {
                if machine.state() == SessionState::Flushing && Instant::now() >= deadline {
                    machine.set_frame_count(session.buffer.frame_count());
                    session.source.stop_capture();
                    session.buffer.close();
                    machine.flush_complete();
                }
            }
        }

        // Coordinator done: reap the thread and recover the recognizer.
        let finished = active
            .as_ref()
            .map_or(false, |s| s.coordinator.is_finished());
        if finished {
            let session = active.take().expect("active session present");
            for event in session.events.try_iter() {
                deliver(&mut sink, &mut wire, &event);
            }
            match session.coordinator.join() {
                Ok((result, partial, recognizer)) => {
                    recognizer_slot = Some(recognizer);
                    match result {
                        Ok(_) => {
                            if machine.state() == SessionState::Processing {
                                machine.processing_complete();
                            } else {
                                machine.reset();
                            }
                        }
                        Err(e) => {
                            // Abort path still delivers the partial
                            // transcript.
                            eprintln!("❌ {}", e);
                            if !partial.is_empty() {
                                deliver(
                                    &mut sink,
                                    &mut wire,
                                    &TranscriptEvent::Finished { text: partial },
                                );
                            }
                            machine.abort(e);
                            machine.reset();
                        }
                    }
                }
                Err(_) => {
                    eprintln!("❌ Coordinator thread panicked; reloading model");
                    recognizer_slot = Some(WhisperRecognizer::new(config.recognition.clone())?);
                    machine.abort(SessionError::Recognition("coordinator panicked".into()));
                    machine.reset();
                }
            }
            wire = None;
        }

        thread::sleep(Duration::from_millis(10));
    }
}

/// Route a transcript event to the wire (one JSON update per line) when a
/// session stream is active, otherwise to the human-readable sink.
fn deliver<S: TranscriptSink>(
    sink: &mut S,
    wire: &mut Option<UpdateStream>,
    event: &TranscriptEvent,
) {
    match wire {
        Some(stream) => {
            if let Ok(line) = serde_json::to_string(&stream.update(event)) {
                println!("{}", line);
            }
        }
        None => sink.handle(event),
    }
}

fn start_session(
    config: &Config,
    recognizer_slot: &mut Option<WhisperRecognizer>,
) -> Result<ActiveSession, SessionError> {
    let recognizer = recognizer_slot
        .take()
        .ok_or_else(|| SessionError::Recognition("recognizer unavailable".into()))?;

    let buffer = Arc::new(CaptureBuffer::new(
        RECOGNIZER_SAMPLE_RATE,
        config.audio.max_session_secs,
    ));

    let mut source = match AudioDeviceSource::open(&config.audio.device) {
        Ok(source) => source,
        Err(e) => {
            *recognizer_slot = Some(recognizer);
            return Err(e);
        }
    };

    let (err_tx, err_rx) = channel();
    if let Err(e) = source.start_capture(Arc::clone(&buffer), err_tx) {
        *recognizer_slot = Some(recognizer);
        return Err(e);
    }

    let options = CoordinatorOptions {
        streaming: config.streaming.enabled,
        min_new_audio_ms: config.streaming.min_new_audio_ms,
        agreement_margin_words: config.streaming.agreement_margin_words,
        silence_threshold: config.audio.silence_threshold,
    };

    let (event_tx, event_rx) = channel();
    let coordinator_buffer = Arc::clone(&buffer);
    let handle = thread::spawn(move || {
        let mut coordinator = StreamingCoordinator::new(coordinator_buffer, recognizer, options);
        let result = coordinator.run(&event_tx);
        let partial = coordinator.confirmed_text();
        (result, partial, coordinator.into_recognizer())
    });

    Ok(ActiveSession {
        buffer,
        source,
        device_errors: err_rx,
        events: event_rx,
        coordinator: handle,
        flush_deadline: None,
    })
}
