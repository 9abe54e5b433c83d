//! CLI command implementations

use crate::output::format_rows;
use anyhow::{bail, Context};
use reel_core::{
    detect_engine,
    sim::{MemoryMediaSource, RecordingDelivery, ScriptedEngine, TaskQueue},
    EngineKind, EngineSet, MediaEvent, MediaMessage, PlaybackState, PlayerConfig, PlayerSession,
    PlaylistEntry,
};
use serde::Serialize;
use std::path::PathBuf;
use std::rc::Rc;
use tabled::Tabled;
use tracing::{info, warn};

#[derive(Serialize, Tabled)]
struct EventRow {
    code: u8,
    event: String,
    handler: String,
    native: bool,
}

/// List every event code
pub fn events(format: &str) -> anyhow::Result<()> {
    let rows: Vec<EventRow> = MediaEvent::all()
        .map(|event| EventRow {
            code: event.code(),
            event: event.to_string(),
            handler: event.handler_property().unwrap_or_else(|| "-".to_string()),
            native: !event.is_external(),
        })
        .collect();

    println!(
        "{}",
        format_rows(&rows, format, |r| format!("{:>3}  {}", r.code, r.event))
    );
    Ok(())
}

#[derive(Serialize, Tabled)]
struct DetectRow {
    url: String,
    engine: String,
    title: String,
}

/// Show the engine and derived title for each URL
pub fn detect(urls: &[String], format: &str) -> anyhow::Result<()> {
    let rows: Vec<DetectRow> = urls
        .iter()
        .map(|url| DetectRow {
            url: url.clone(),
            engine: detect_engine(url).to_string(),
            title: PlaylistEntry::new(url.clone(), None).title,
        })
        .collect();

    println!(
        "{}",
        format_rows(&rows, format, |r| format!("{:<5} {}", r.engine, r.url))
    );
    Ok(())
}

/// Options for [`simulate`]
pub struct SimulateOptions {
    pub config: Option<PathBuf>,
    pub video: Option<String>,
    pub entries: Vec<String>,
    pub cycles: usize,
    pub fail: Vec<usize>,
    pub subscribe: Vec<u32>,
    pub duration: f64,
}

#[derive(Serialize, Tabled)]
struct StepRow {
    step: usize,
    title: String,
    engine: String,
    state: String,
    url: String,
}

/// Play the configured playlist on the in-memory host
pub async fn simulate(options: SimulateOptions, format: &str) -> anyhow::Result<()> {
    let mut config = match &options.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            PlayerConfig::from_json(&json)?
        }
        None => PlayerConfig::default(),
    };
    if let Some(video) = options.video.clone() {
        config.video = Some(video);
    }
    config
        .playlist
        .extend(options.entries.iter().map(|url| PlaylistEntry::new(url.clone(), None)));

    // Launch order: the launch stream first, then the configured playlist
    let urls: Vec<String> = config
        .video
        .iter()
        .cloned()
        .chain(config.playlist.iter().map(|entry| entry.url.clone()))
        .collect();
    if urls.is_empty() {
        bail!("nothing to play: pass --video, --entry or --config");
    }

    let subscriptions = options
        .subscribe
        .iter()
        .map(|code| MediaEvent::try_from(*code))
        .collect::<reel_core::Result<Vec<_>>>()?;

    let tasks = TaskQueue::new();
    let media = Rc::new(MemoryMediaSource::with_scheduler(tasks.spawner()));
    let hls = Rc::new(ScriptedEngine::new(EngineKind::Hls).attached_to(media.clone(), options.duration));
    let dash = Rc::new(ScriptedEngine::new(EngineKind::Dash).attached_to(media.clone(), options.duration));
    let delivery = Rc::new(RecordingDelivery::new());
    let session = PlayerSession::new(
        config,
        media.clone(),
        EngineSet::new(hls.clone(), dash.clone()),
        Some(delivery.clone()),
        tasks.spawner(),
    )?;
    session.subscribe(subscriptions);

    let arm_failure = |index: usize| {
        if !options.fail.contains(&index) {
            return;
        }
        let engine = match detect_engine(&urls[index]) {
            EngineKind::Hls => &hls,
            EngineKind::Dash => &dash,
        };
        engine.fail_next("SIMULATED_FAILURE");
    };
    let record = |step: usize| {
        let entry = session.current_entry();
        StepRow {
            step,
            title: entry.as_ref().map(|e| e.title.clone()).unwrap_or_default(),
            engine: session
                .with_controller(|c| c.active_engine())
                .map(|kind| kind.to_string())
                .unwrap_or_else(|| "-".to_string()),
            state: session.state().to_string(),
            url: entry.map(|e| e.url).unwrap_or_default(),
        }
    };

    info!(entries = urls.len(), cycles = options.cycles, "Starting simulation");
    arm_failure(0);
    session.launch().await;
    tasks.run_until_idle().await;
    let mut steps = vec![record(0)];

    let total = options.cycles.max(1) * urls.len();
    for step in 1..total {
        let position = session.playlist().position().unwrap_or(0);
        arm_failure((position + 1) % urls.len());

        if session.state() == PlaybackState::Error {
            warn!(position, "Load failed, skipping to the next entry");
            session.advance().await;
        } else {
            media.end_of_stream();
        }
        tasks.run_until_idle().await;
        steps.push(record(step));
    }

    println!(
        "{}",
        format_rows(&steps, format, |r| {
            format!("{:>3}  {:<8} {:<5} {}", r.step, r.state, r.engine, r.title)
        })
    );

    if !delivery.is_empty() {
        match format {
            "json" => {
                let messages = delivery.parsed();
                println!("{}", serde_json::to_string_pretty(&messages)?);
            }
            _ => {
                println!("\nDelivered messages:");
                for message in delivery.messages() {
                    println!("  {message}");
                }
            }
        }
    }

    Ok(())
}

/// Decode a delivered event message
pub fn decode(json: &str, format: &str) -> anyhow::Result<()> {
    let message = MediaMessage::from_json(json).context("not a valid event message")?;

    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "readyState": u8::from(message.ready_state()),
                "event": message.event().code(),
                "eventName": message.event().to_string(),
                "message": message.message(),
            }))?
        );
    } else {
        println!("Event message:");
        println!("  Event: {} ({})", message.event(), message.event().code());
        println!("  Ready state: {:?}", message.ready_state());
        if !message.message().is_empty() {
            println!("  Payload: {}", message.message());
        }
    }

    Ok(())
}
