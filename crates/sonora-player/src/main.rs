//! Sonora Player - terminal front end for the Sonora engine
//!
//! Reads line commands from stdin, drives the playback state machine and
//! prints its notices. Every typed command counts as a user interaction.
//!
//! ## Command line flags
//!
//! - `--config <path>`: read configuration from `<path>` instead of the default location

mod command;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use sonora_core::audio::{get_output_devices, ActivationGate, AudioConfig, CpalBackend, OutputDevice};
use sonora_core::config::{default_config_path, load_config, SonoraConfig};
use sonora_core::effect::{EffectParameterStore, EffectsState};
use sonora_core::library::Library;
use sonora_core::playback::{LoadRequest, LoadTicket, PlaybackEvent, PlaybackStateMachine};
use sonora_core::source::{decode, DecodeError, DecodedBuffer};
use sonora_core::SignalGraphEngine;

use command::{Command, HELP};

/// How often finished tracks are detected
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type LoadResult = (LoadTicket, Result<DecodedBuffer, DecodeError>);

#[tokio::main]
async fn main() -> Result<()> {
    // set RUST_LOG=debug for parameter and queue traffic
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config_path = config_path_from_args()?;
    log::info!("sonora-player starting up (config {:?})", config_path);
    let config: SonoraConfig = load_config(&config_path);

    println!("Sonora Player");
    println!("type help for commands");
    println!();

    let store = Arc::new(EffectParameterStore::new(config.effects.clone()));
    let backend = CpalBackend::new(config.audio.clone());
    let engine = SignalGraphEngine::new(Box::new(backend), ActivationGate::new(), config.reverb, config.master_gain);
    let (mut machine, events) = PlaybackStateMachine::new(engine, store);
    let mut library = Library::new();

    let mut lines = spawn_stdin_reader()?;
    let (loads_tx, mut loads_rx) = mpsc::unbounded_channel::<LoadResult>();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            line = lines.recv() => {
                // stdin closed
                let Some(line) = line else { break };
                machine.notify_user_gesture();

                match command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(cmd)) => {
                        if let Err(e) = run_command(cmd, &config, &mut machine, &mut library, &loads_tx).await {
                            println!("error: {:#}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{:#}", e),
                }
            }
            Some((ticket, result)) = loads_rx.recv() => {
                if let Err(e) = machine.complete_load(ticket, result) {
                    log::debug!("Load of {} failed: {}", ticket.track_id, e);
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = machine.poll() {
                    log::error!("Playback poll failed: {}", e);
                }
            }
        }
        print_events(&events);
    }

    machine.shutdown()?;
    print_events(&events);
    println!("Sonora Player stopped.");
    Ok(())
}

fn config_path_from_args() -> Result<PathBuf> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args.next().ok_or_else(|| anyhow!("--config needs a path"))?;
                path = Some(PathBuf::from(value));
            }
            other => log::warn!("Ignoring unknown argument {:?}", other),
        }
    }
    Ok(path.unwrap_or_else(default_config_path))
}

/// Forward stdin lines to the async loop from a plain thread
fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::error!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

/// Decode on a background task; the result comes back through `loads`
fn spawn_load(request: LoadRequest, loads: &mpsc::UnboundedSender<LoadResult>) {
    let loads = loads.clone();
    tokio::spawn(async move {
        let result = decode(&request.locator).await;
        if loads.send((request.ticket, result)).is_err() {
            log::debug!("Load result for {} dropped: player exiting", request.ticket.track_id);
        }
    });
}

async fn run_command(
    command: Command,
    config: &SonoraConfig,
    machine: &mut PlaybackStateMachine,
    library: &mut Library,
    loads: &mpsc::UnboundedSender<LoadResult>,
) -> Result<()> {
    match command {
        Command::Gesture => println!("interaction recorded"),
        Command::Activate => machine.request_engine_activation()?,
        Command::Devices => print_devices(&config.audio)?,
        Command::Add(path) => {
            let added = library.ingest_path(&path).await?.to_string();
            println!("[{}] {}", library.len() - 1, added);
            machine.set_active_view(library.tracks().to_vec());
        }
        Command::View => {
            if library.is_empty() {
                println!("library is empty (add <path>)");
            }
            for (index, track) in library.tracks().iter().enumerate() {
                println!("[{}] {}", index, track);
            }
        }
        Command::Select(index) => {
            let track = library
                .tracks()
                .get(index)
                .cloned()
                .ok_or_else(|| anyhow!("no track at index {}", index))?;
            let request = machine.begin_load(track)?;
            spawn_load(request, loads);
        }
        Command::Play => {
            if let Some(request) = machine.toggle_play_pause()? {
                spawn_load(request, loads);
            }
        }
        Command::Set { path, value } => {
            machine.set_effect(&path, value)?;
        }
        Command::Reset => {
            machine.reset_effects()?;
        }
        Command::Effects => print_effects(&machine.effects()),
        Command::State => {
            let atomics = machine.engine().atomics();
            println!("state: {}", machine.state());
            match machine.current_track() {
                Some(track) => println!("track: {}", track),
                None => println!("track: none"),
            }
            if let Some(source) = machine.source() {
                println!("position: {} frames (rate {:.2})", source.position_frames(), source.playback_rate());
            }
            println!(
                "engine: {} ({} nodes), {} frames rendered",
                if machine.engine().is_active() { "active" } else { "inactive" },
                machine.engine().node_count(),
                atomics.frames_rendered()
            );
        }
        Command::Help => println!("{}", HELP),
        // handled by the main loop
        Command::Quit => {}
    }
    Ok(())
}

fn print_devices(audio: &AudioConfig) -> Result<()> {
    for device in get_output_devices()? {
        let marker = if is_configured(audio, &device) { "*" } else { " " };
        let default = if device.is_default { " (default)" } else { "" };
        println!("{} {}{}", marker, device.id.display_label(), default);
    }
    let sample_rate = audio.target_sample_rate();
    println!(
        "buffer: {} frames ({:.1} ms at {} Hz)",
        audio.buffer_size.frames(),
        audio.buffer_size.latency_ms(sample_rate),
        sample_rate
    );
    Ok(())
}

/// A configured device without a host matches that name on any host
fn is_configured(audio: &AudioConfig, device: &OutputDevice) -> bool {
    match &audio.device {
        Some(id) => id.name == device.name && id.host.as_ref().map_or(true, |host| *host == device.host),
        None => device.is_default,
    }
}

fn print_events(events: &Receiver<PlaybackEvent>) {
    for event in events.try_iter() {
        match event {
            PlaybackEvent::StateChanged { from, to } => println!("* {} -> {}", from, to),
            PlaybackEvent::TrackChanged(Some(track)) => println!("* now: {}", track),
            PlaybackEvent::TrackChanged(None) => println!("* now: nothing"),
            PlaybackEvent::TrackUnplayable { title, reason, .. } => {
                println!("* cannot play {}: {}", title, reason)
            }
            PlaybackEvent::TrackEnded(id) => println!("* track {} ended", id),
            PlaybackEvent::EffectsChanged(effects) => print_effects(&effects),
        }
    }
}

fn print_effects(effects: &EffectsState) {
    let bands: Vec<String> = effects
        .eq_bands
        .iter()
        .map(|b| format!("{:.0}Hz {:+.1}dB", b.frequency_hz, b.gain_db))
        .collect();
    println!(
        "  eq [{}] pitch {:.2} delay {:.2}s fb {:.2} mix {:.2} reverb {:.2}",
        bands.join(", "),
        effects.pitch,
        effects.delay.time_seconds,
        effects.delay.feedback,
        effects.delay.mix,
        effects.reverb.mix
    );
}
