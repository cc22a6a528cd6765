//! Music Player
//!
//! This example drives a small music player through the engine.
//!
//! Key concepts:
//! - One cluster with two orthogonal state groups (playback, track)
//! - Handlers that check preconditions against live state
//! - An external service with simulated latency, unaware of the engine
//! - Warnings as feedback instead of state changes
//!
//! Run with: cargo run --example music_player
//! Set RUST_LOG=vds=debug to see the engine's own spans and events.

use anyhow::{anyhow, Context};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vds::blueprint::{Blueprint, ClusterBuilder, StateGroupDefinition, TransitionRule};
use vds::core::{Command, CoreState, DomainEvent, Feedback, FeedbackLevel, Outcome};
use vds::engine::{CommandHandlerMap, Engine, HandlerResult};
use vds::state::GetState;
use vds::WILDCARD;

fn music_player_blueprint() -> anyhow::Result<Blueprint> {
    let player = ClusterBuilder::new()
        .describe("Core player")
        .state_group(
            "playback",
            StateGroupDefinition::new("stopped", ["stopped", "playing", "paused", "loading"])
                .describe("What the player is doing right now"),
        )
        .state_group(
            "track",
            StateGroupDefinition::new("noTrack", ["noTrack", "trackLoaded", "trackError"])
                .describe("Whether a track is ready"),
        )
        .on("TRACK_LOAD_STARTED", TransitionRule::to([("playback", "loading")]))
        .on(
            "TRACK_LOAD_SUCCEEDED",
            TransitionRule::to([("playback", "paused"), ("track", "trackLoaded")]),
        )
        .on(
            "TRACK_LOAD_FAILED",
            TransitionRule::to([("playback", "stopped"), ("track", "trackError")]),
        )
        .on("PLAYBACK_STARTED", TransitionRule::to([("playback", "playing")]))
        .on("PLAYBACK_PAUSED", TransitionRule::to([("playback", "paused")]))
        .on(
            "PLAYBACK_STOPPED",
            TransitionRule::to([("playback", "stopped"), ("track", "noTrack")]),
        );

    Ok(Blueprint::builder("VDS Music Player")
        .cluster("Player", player)
        .build()?)
}

// Business service: knows nothing about the engine.
struct AudioService {
    latency: Duration,
}

impl AudioService {
    async fn load(&self, url: &str) -> anyhow::Result<()> {
        tracing::info!(url, "MOCK_AUDIO_SERVICE | Attempting to load track");
        tokio::time::sleep(self.latency).await;
        if url.contains("good-song") {
            tracing::info!("MOCK_AUDIO_SERVICE | Track loaded successfully");
            Ok(())
        } else {
            tracing::info!("MOCK_AUDIO_SERVICE | Failed to load track");
            Err(anyhow!("Invalid or unreachable track URL"))
        }
    }

    async fn play(&self) {
        tracing::info!("MOCK_AUDIO_SERVICE | Playback started");
    }

    async fn pause(&self) {
        tracing::info!("MOCK_AUDIO_SERVICE | Playback paused");
    }
}

fn player_value(state: &CoreState, group: &str) -> String {
    state.value("Player", group).unwrap_or_default().to_string()
}

async fn load_track(audio: &AudioService, command: Command) -> HandlerResult {
    let url = command
        .payload
        .as_ref()
        .and_then(|payload| payload["trackUrl"].as_str())
        .context("LOAD_TRACK requires a trackUrl")?;

    let started = DomainEvent::new("TRACK_LOAD_STARTED").with_payload(json!({ "url": url }));
    let finished = match audio.load(url).await {
        Ok(()) => DomainEvent::new("TRACK_LOAD_SUCCEEDED").with_payload(json!({ "url": url })),
        Err(error) => {
            DomainEvent::new("TRACK_LOAD_FAILED").with_payload(json!({ "error": error.to_string() }))
        }
    };
    Ok(vec![started.into(), finished.into()])
}

async fn play(audio: &AudioService, state: GetState) -> HandlerResult {
    let current = state.get();
    let playback = player_value(&current, "playback");
    let track = player_value(&current, "track");
    if playback != "paused" || track != "trackLoaded" {
        let message = format!(
            "Cannot PLAY. Required state is 'paused/trackLoaded', but current is '{playback}/{track}'."
        );
        return Ok(vec![Feedback::warning("INVALID_OPERATION", message).into()]);
    }

    audio.play().await;
    Ok(vec![Outcome::event("PLAYBACK_STARTED")])
}

async fn pause(audio: &AudioService, state: GetState) -> HandlerResult {
    let playback = player_value(&state.get(), "playback");
    if playback != "playing" {
        let message =
            format!("Cannot PAUSE. Required state is 'playing', but current is '{playback}'.");
        return Ok(vec![Feedback::warning("INVALID_OPERATION", message).into()]);
    }

    audio.pause().await;
    Ok(vec![Outcome::event("PLAYBACK_PAUSED")])
}

fn music_player_handlers(audio: Arc<AudioService>) -> CommandHandlerMap {
    let (load_audio, play_audio, pause_audio) =
        (Arc::clone(&audio), Arc::clone(&audio), Arc::clone(&audio));

    CommandHandlerMap::new()
        .on("LOAD_TRACK", move |_state: GetState, command: Command| {
            let audio = Arc::clone(&load_audio);
            async move { load_track(&audio, command).await }
        })
        .on("PLAY", move |state: GetState, _command: Command| {
            let audio = Arc::clone(&play_audio);
            async move { play(&audio, state).await }
        })
        .on("PAUSE", move |state: GetState, _command: Command| {
            let audio = Arc::clone(&pause_audio);
            async move { pause(&audio, state).await }
        })
}

fn describe(state: &CoreState) -> String {
    serde_json::to_string(state).unwrap_or_else(|_| "<unprintable>".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    println!("=== VDS Music Player Example ===");
    println!();

    let audio = Arc::new(AudioService {
        latency: Duration::from_millis(500),
    });
    let engine = Engine::new(music_player_blueprint()?, music_player_handlers(audio));

    let _state_log = engine.subscribe_to_state(|state| {
        tracing::info!(state = %describe(state), "STATE UPDATE");
    });
    let _feedback_log = engine.subscribe_to_feedback(WILDCARD, |feedback| match feedback.level {
        FeedbackLevel::Error => {
            tracing::error!(name = %feedback.name, "FEEDBACK: {}", feedback.message)
        }
        _ => tracing::warn!(name = %feedback.name, "FEEDBACK: {}", feedback.message),
    });

    println!("Initial state: {}", describe(&engine.get_state()));

    let scenario = [
        (
            "Attempting to PLAY while stopped (should be rejected)",
            Command::new("PLAY"),
        ),
        (
            "Loading a valid track",
            Command::new("LOAD_TRACK").with_payload(json!({ "trackUrl": "path/to/good-song.mp3" })),
        ),
        ("Playing the loaded track", Command::new("PLAY")),
        (
            "Attempting to PLAY while already playing (should be rejected)",
            Command::new("PLAY"),
        ),
        ("Pausing the track", Command::new("PAUSE")),
        (
            "Loading an invalid track",
            Command::new("LOAD_TRACK").with_payload(json!({ "trackUrl": "path/to/bad-song.mp3" })),
        ),
    ];

    for (step, (description, command)) in scenario.into_iter().enumerate() {
        println!();
        println!("> ACTION {}: {}", step + 1, description);
        println!("  Dispatching command: {}", command.name);
        engine.dispatch(command).await;
    }

    println!();
    println!("Final state: {}", describe(&engine.get_state()));
    println!();
    println!("=== Example Complete ===");

    Ok(())
}
