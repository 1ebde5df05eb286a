// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Printing the effective constraint cascade
//! - Showing the configuration
//! - Classifying stream URLs
//! - Running a scripted broadcast session against the simulated device

use livecast::backends::capture::{ScriptedOutcome, SimulatedDevice, TrackKind};
use livecast::backends::sink::LoggingSink;
use livecast::directory::{InMemoryDirectory, NewStreamRecord, StreamDirectory, parse_stream_url};
use livecast::errors::AcquisitionErrorKind;
use livecast::session::{BroadcastSession, ChatMessage, LiveMetadata, SessionEvent, SessionOptions};
use livecast::Config;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Options for `livecast simulate`
#[derive(clap::Args, Debug)]
pub struct SimulateArgs {
    /// Reject the first N constraint tiers as over-constrained
    #[arg(long, default_value = "0")]
    pub reject_tiers: usize,

    /// Camera is held by another application on the first attempt
    #[arg(long)]
    pub busy: bool,

    /// Camera permission is denied
    #[arg(long)]
    pub denied: bool,

    /// First grant comes back without a microphone track
    #[arg(long)]
    pub no_mic_track: bool,

    /// First grant produces 2x2 video, exercising automatic recovery
    #[arg(long)]
    pub degenerate: bool,

    /// Turn video off and back on while live
    #[arg(long)]
    pub video_cycle: bool,

    /// Broadcast title
    #[arg(long, default_value = "Live from the studio")]
    pub title: String,

    /// Stay on air for this many seconds (Ctrl+C ends early)
    #[arg(long, default_value = "0")]
    pub hold: u64,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Print the effective constraint cascade
pub fn print_tiers(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let cascade = config.cascade();

    println!("Constraint cascade ({} tiers):", cascade.len());
    println!();
    for (index, tier) in cascade.tiers().iter().enumerate() {
        println!("  [{}] {} (priority {})", index, tier.label, tier.priority);
        println!("      video: {}", tier.video);
    }
    Ok(())
}

/// Print the config path and the effective settings
pub fn print_config(config: &Config, write: bool) -> Result<(), Box<dyn std::error::Error>> {
    match Config::config_path() {
        Some(path) => {
            println!("Config file: {}", path.display());
            if write {
                config.save_to(&path)?;
                println!("Written.");
            }
        }
        None => println!("Config file: (no config directory on this platform)"),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Classify a stream URL
pub fn parse_url(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = parse_stream_url(url)?;
    println!("Platform: {}", parsed.platform);
    println!("Channel:  {}", parsed.channel);
    println!("Embed:    {}", parsed.embed_url);
    Ok(())
}

/// Run a scripted session on a current-thread runtime
pub fn simulate(config: Config, args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let device = Arc::new(SimulatedDevice::default());
    device.push_outcomes(script(&args, config.cascade().len()));

    // Ctrl+C cuts the on-air hold short; the session is ended on the way out
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let directory = InMemoryDirectory::new();
    runtime.block_on(run_simulation(config, args, device, &directory, stop_flag))
}

/// Ends the session however the simulation exits
struct EndOnExit<'a> {
    session: &'a BroadcastSession<SimulatedDevice>,
}

impl Drop for EndOnExit<'_> {
    fn drop(&mut self) {
        self.session.end();
    }
}

fn script(args: &SimulateArgs, tiers: usize) -> Vec<ScriptedOutcome> {
    let mut outcomes = Vec::new();

    if args.denied {
        // Every tier of the attempt and of the retry
        outcomes.extend(std::iter::repeat_n(
            ScriptedOutcome::Reject(AcquisitionErrorKind::PermissionDenied),
            tiers * 2,
        ));
        return outcomes;
    }
    if args.busy {
        outcomes.extend(std::iter::repeat_n(
            ScriptedOutcome::Reject(AcquisitionErrorKind::DeviceBusy),
            tiers,
        ));
    }
    outcomes.extend(std::iter::repeat_n(
        ScriptedOutcome::Reject(AcquisitionErrorKind::OverConstrained),
        args.reject_tiers.min(tiers),
    ));

    if args.degenerate {
        outcomes.push(ScriptedOutcome::GrantDegenerate);
    } else if args.no_mic_track {
        outcomes.push(ScriptedOutcome::GrantWithoutAudio);
        outcomes.push(ScriptedOutcome::Reject(AcquisitionErrorKind::DeviceNotFound));
    }
    outcomes
}

fn print_events(rx: &mut broadcast::Receiver<SessionEvent>, json: bool) {
    while let Ok(event) = rx.try_recv() {
        if json {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{}", line);
            }
            continue;
        }
        match event {
            SessionEvent::StateChanged { from, to } => println!("  state: {} -> {}", from, to),
            SessionEvent::Notice(notice) => println!("  notice: {}: {}", notice.title, notice.description),
            SessionEvent::Chat(message) => println!("  chat: {}", format_chat(&message)),
        }
    }
}

fn format_chat(message: &ChatMessage) -> String {
    format!(
        "#{} [{}] {}: {}",
        message.id,
        message.timestamp.format("%H:%M:%S"),
        message.author,
        message.body
    )
}

fn step(json: bool, label: &str) {
    if !json {
        println!();
        println!("> {}", label);
    }
}

async fn run_simulation(
    config: Config,
    args: SimulateArgs,
    device: Arc<SimulatedDevice>,
    directory: &dyn StreamDirectory,
    stop_flag: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = SessionOptions::from_config(&config).with_sink(Arc::new(LoggingSink));
    let session = BroadcastSession::new(Arc::clone(&device), options);
    let _end_on_exit = EndOnExit { session: &session };
    let mut rx = session.subscribe();
    let json = args.json;

    step(json, "start preview");
    let mut preview = session.start_preview().await;
    print_events(&mut rx, json);
    if preview.is_err() {
        step(json, "retry preview");
        preview = session.start_preview().await;
        print_events(&mut rx, json);
    }
    let view = match preview {
        Ok(view) => view,
        Err(e) => {
            session.end();
            print_events(&mut rx, json);
            return Err(e.into());
        }
    };
    if !json {
        if let Some(video) = &view.video {
            println!("  video: {} ({}), tier {:?}", video.id, video.settings, view.tier_used);
        }
        println!("  audio: {}", if view.audio.is_some() { "captured" } else { "none" });
    }

    step(json, "go live");
    let broadcast = session.go_live(LiveMetadata::new(args.title.clone(), "")).await?;
    let record_id = directory
        .create_session_record(&broadcast.owner, NewStreamRecord::from_broadcast(&broadcast))
        .await?;
    print_events(&mut rx, json);
    if !json {
        let listed = directory.list_approved_sessions(config.directory_limit).await?;
        println!("  directory: {} live stream(s), this one is {}", listed.len(), record_id);
    }

    step(json, "first frame");
    let settings = session
        .capture_view()
        .and_then(|v| v.video)
        .map(|t| t.settings)
        .unwrap_or_default();
    let outcome = session
        .observe_metadata(settings.width.unwrap_or(0), settings.height.unwrap_or(0))
        .await;
    print_events(&mut rx, json);
    if !json {
        println!("  recovery: {:?}", outcome);
    }

    step(json, "chat");
    session.send_chat_message("Thanks for joining!")?;
    session.receive_viewer_message("viewer42", "Love the new collection")?;
    print_events(&mut rx, json);

    if args.video_cycle {
        step(json, "video off / on");
        session.toggle(TrackKind::Video, false).await?;
        session.toggle(TrackKind::Video, true).await?;
        print_events(&mut rx, json);
        if !json {
            let video = session.capture_view().and_then(|v| v.video);
            println!("  video: {:?}", video.map(|t| t.id));
        }
    }

    step(json, "audio off / on");
    session.toggle_audio().await?;
    if let Err(e) = session.toggle_audio().await {
        if !json {
            println!("  audio on: {}", e);
        }
    }
    print_events(&mut rx, json);

    if args.hold > 0 {
        step(json, "on air (Ctrl+C to end early)");
        let start = Instant::now();
        let target = Duration::from_secs(args.hold);
        while start.elapsed() < target && !stop_flag.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    let transcript = session.chat_snapshot();

    step(json, "end");
    session.end();
    directory.delete_session_record(&record_id).await?;
    print_events(&mut rx, json);

    if !json {
        println!();
        println!("Chat transcript:");
        for message in &transcript {
            println!("  {}", format_chat(message));
        }
        println!();
        println!("Tracks still open: {}", device.live_track_count());
    }

    Ok(())
}
