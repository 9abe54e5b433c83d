//! Playlist loop example
//!
//! Drives a three-entry playlist through two full loops on the in-memory
//! host and prints every message the host would receive.
//!
//! Run with: cargo run -p reel-core --example playlist_loop

use reel_core::{
    sim::{MemoryMediaSource, RecordingDelivery, ScriptedEngine, TaskQueue},
    EngineKind, EngineSet, MediaEvent, PlayerConfig, PlayerSession, PlaylistEntry,
};
use std::rc::Rc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> reel_core::Result<()> {
    println!("Reel Core - Playlist Loop Example");
    println!("=================================\n");

    let tasks = TaskQueue::new();
    let media = Rc::new(MemoryMediaSource::with_scheduler(tasks.spawner()));
    let hls = Rc::new(ScriptedEngine::new(EngineKind::Hls).attached_to(media.clone(), 42.0));
    let dash = Rc::new(ScriptedEngine::new(EngineKind::Dash).attached_to(media.clone(), 64.0));
    let delivery = Rc::new(RecordingDelivery::new());

    let mut config = PlayerConfig::with_video("https://cdn.example.com/intro.m3u8");
    config.playlist = vec![
        PlaylistEntry::new("https://cdn.example.com/feature.mpd", Some("Feature".into())),
        PlaylistEntry::new("https://cdn.example.com/credits.m3u8", None),
    ];

    let session = PlayerSession::new(
        config,
        media.clone(),
        EngineSet::new(hls, dash),
        Some(delivery.clone()),
        tasks.spawner(),
    )?;
    session.subscribe([MediaEvent::Playing, MediaEvent::Ended]);
    session.launch().await;
    tasks.run_until_idle().await;

    for _ in 0..6 {
        let entry = session.current_entry().expect("playlist started");
        println!("  Now playing: {:<14} {}", entry.title, entry.url);
        media.end_of_stream();
        tasks.run_until_idle().await;
    }

    println!("\nDelivered messages:");
    for message in delivery.messages() {
        println!("  {message}");
    }

    Ok(())
}
