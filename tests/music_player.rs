//! End-to-end tests driving the engine with a music player application.

use anyhow::{anyhow, Context};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vds::blueprint::Blueprint;
use vds::bus::{EventBus, Listener, ListenerFault, WILDCARD};
use vds::core::{Command, CoreState, DomainEvent, Feedback, FeedbackLevel, Outcome};
use vds::engine::{
    CommandHandlerMap, Engine, HandlerResult, NO_HANDLER_EXCEPTION, UNHANDLED_HANDLER_EXCEPTION,
};
use vds::state::GetState;

const BLUEPRINT: &str = r#"{
    "version": "1.0",
    "appName": "VDS Music Player",
    "clusters": {
        "Player": {
            "description": "Core player",
            "stateGroups": {
                "playback": {
                    "initial": "stopped",
                    "states": ["stopped", "playing", "paused", "loading"]
                },
                "track": {
                    "initial": "noTrack",
                    "states": ["noTrack", "trackLoaded", "trackError"]
                }
            },
            "transitions": {
                "on": {
                    "TRACK_LOAD_STARTED": { "target": { "playback": "loading" } },
                    "TRACK_LOAD_SUCCEEDED": { "target": { "playback": "paused", "track": "trackLoaded" } },
                    "TRACK_LOAD_FAILED": { "target": { "playback": "stopped", "track": "trackError" } },
                    "PLAYBACK_STARTED": { "target": { "playback": "playing" } },
                    "PLAYBACK_PAUSED": { "target": { "playback": "paused" } },
                    "PLAYBACK_STOPPED": { "target": { "playback": "stopped", "track": "noTrack" } }
                }
            }
        }
    }
}"#;

/// Stand-in for an audio backend; only URLs naming a good song load.
struct AudioService {
    latency: Duration,
}

impl AudioService {
    async fn load(&self, url: &str) -> anyhow::Result<()> {
        tokio::time::sleep(self.latency).await;
        if url.contains("good-song") {
            Ok(())
        } else {
            Err(anyhow!("Invalid or unreachable track URL"))
        }
    }
}

fn player(state: &CoreState, group: &str) -> String {
    state.value("Player", group).unwrap_or_default().to_string()
}

async fn load_track_handler(audio: &AudioService, command: Command) -> HandlerResult {
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

fn handlers(audio: Arc<AudioService>) -> CommandHandlerMap {
    CommandHandlerMap::new()
        .on("LOAD_TRACK", move |_state: GetState, command: Command| {
            let audio = Arc::clone(&audio);
            async move { load_track_handler(&audio, command).await }
        })
        .on("PLAY", |state: GetState, _command: Command| async move {
            let current = state.get();
            let (playback, track) = (player(&current, "playback"), player(&current, "track"));
            if playback != "paused" || track != "trackLoaded" {
                return Ok(vec![Feedback::warning(
                    "INVALID_OPERATION",
                    format!(
                        "Cannot PLAY. Required state is 'paused/trackLoaded', but current is '{playback}/{track}'."
                    ),
                )
                .into()]);
            }
            Ok(vec![Outcome::event("PLAYBACK_STARTED")])
        })
        .on("PAUSE", |state: GetState, _command: Command| async move {
            let playback = player(&state.get(), "playback");
            if playback != "playing" {
                return Ok(vec![Feedback::warning(
                    "INVALID_OPERATION",
                    format!("Cannot PAUSE. Required state is 'playing', but current is '{playback}'."),
                )
                .into()]);
            }
            Ok(vec![Outcome::event("PLAYBACK_PAUSED")])
        })
}

struct Harness {
    engine: Engine,
    feedback: Arc<Mutex<Vec<Feedback>>>,
    events: Arc<Mutex<Vec<String>>>,
    notifications: Arc<AtomicUsize>,
}

impl Harness {
    fn new(handlers: CommandHandlerMap) -> Self {
        let blueprint = Blueprint::from_json(BLUEPRINT).unwrap();
        let engine = Engine::new(blueprint, handlers);

        let feedback = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&feedback);
        engine.subscribe_to_feedback(WILDCARD, move |item| sink.lock().unwrap().push(item.clone()));

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        engine.subscribe_to_domain_events(
            WILDCARD,
            Listener::sync(move |event: &DomainEvent| {
                sink.lock().unwrap().push(event.name.clone());
                Ok(())
            }),
        );

        let notifications = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notifications);
        engine.subscribe_to_state(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        Self {
            engine,
            feedback,
            events,
            notifications,
        }
    }

    fn music_player() -> Self {
        Self::new(handlers(Arc::new(AudioService {
            latency: Duration::from_millis(5),
        })))
    }

    fn playback(&self) -> String {
        player(&self.engine.get_state(), "playback")
    }

    fn track(&self) -> String {
        player(&self.engine.get_state(), "track")
    }

    fn take_feedback(&self) -> Vec<Feedback> {
        std::mem::take(&mut *self.feedback.lock().unwrap())
    }

    fn take_events(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    fn notifications(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }
}

fn load_track(url: &str) -> Command {
    Command::new("LOAD_TRACK").with_payload(json!({ "trackUrl": url }))
}

#[tokio::test]
async fn music_player_scenario() {
    let harness = Harness::music_player();
    assert_eq!(harness.playback(), "stopped");
    assert_eq!(harness.track(), "noTrack");

    // 1. PLAY while stopped is rejected.
    let before = harness.engine.get_state();
    harness.engine.dispatch(Command::new("PLAY")).await;
    let feedback = harness.take_feedback();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].name, "INVALID_OPERATION");
    assert_eq!(feedback[0].level, FeedbackLevel::Warning);
    assert_eq!(
        feedback[0].message,
        "Cannot PLAY. Required state is 'paused/trackLoaded', but current is 'stopped/noTrack'."
    );
    assert!(Arc::ptr_eq(&before, &harness.engine.get_state()));
    assert_eq!(harness.notifications(), 0);

    // 2. A good track loads.
    harness.engine.dispatch(load_track("path/to/good-song.mp3")).await;
    assert_eq!(
        harness.take_events(),
        vec!["TRACK_LOAD_STARTED", "TRACK_LOAD_SUCCEEDED"]
    );
    assert_eq!(harness.playback(), "paused");
    assert_eq!(harness.track(), "trackLoaded");
    assert_eq!(harness.notifications(), 2);

    // 3. PLAY succeeds.
    harness.engine.dispatch(Command::new("PLAY")).await;
    assert_eq!(harness.take_events(), vec!["PLAYBACK_STARTED"]);
    assert_eq!(harness.playback(), "playing");

    // 4. PLAY again is rejected.
    harness.engine.dispatch(Command::new("PLAY")).await;
    let feedback = harness.take_feedback();
    assert_eq!(feedback.len(), 1);
    assert_eq!(
        feedback[0].message,
        "Cannot PLAY. Required state is 'paused/trackLoaded', but current is 'playing/trackLoaded'."
    );
    assert_eq!(harness.playback(), "playing");

    // 5. PAUSE.
    harness.engine.dispatch(Command::new("PAUSE")).await;
    assert_eq!(harness.take_events(), vec!["PLAYBACK_PAUSED"]);
    assert_eq!(harness.playback(), "paused");

    // 6. A bad track fails to load.
    harness.engine.dispatch(load_track("path/to/bad-song.mp3")).await;
    assert_eq!(
        harness.take_events(),
        vec!["TRACK_LOAD_STARTED", "TRACK_LOAD_FAILED"]
    );
    assert_eq!(harness.playback(), "stopped");
    assert_eq!(harness.track(), "trackError");
    assert!(harness.take_feedback().is_empty());
}

#[tokio::test]
async fn pause_outside_playback_is_rejected() {
    let harness = Harness::music_player();

    harness.engine.dispatch(Command::new("PAUSE")).await;

    let feedback = harness.take_feedback();
    assert_eq!(feedback.len(), 1);
    assert_eq!(
        feedback[0].message,
        "Cannot PAUSE. Required state is 'playing', but current is 'stopped'."
    );
    assert_eq!(harness.notifications(), 0);
}

#[tokio::test]
async fn load_without_url_reports_handler_failure() {
    let harness = Harness::music_player();

    harness.engine.dispatch(Command::new("LOAD_TRACK")).await;

    let feedback = harness.take_feedback();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].name, UNHANDLED_HANDLER_EXCEPTION);
    assert_eq!(
        feedback[0].payload.as_ref().unwrap()["error"],
        "LOAD_TRACK requires a trackUrl"
    );
    assert_eq!(harness.playback(), "stopped");
}

#[tokio::test]
async fn failed_load_carries_error_payload() {
    let harness = Harness::music_player();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    harness.engine.subscribe_to_domain_events(
        "TRACK_LOAD_FAILED",
        Listener::sync(move |event: &DomainEvent| {
            sink.lock().unwrap().push(event.payload.clone());
            Ok(())
        }),
    );

    harness.engine.dispatch(load_track("bad.mp3")).await;

    assert_eq!(
        *failures.lock().unwrap(),
        vec![Some(json!({ "error": "Invalid or unreachable track URL" }))]
    );
}

#[test]
fn failing_listener_does_not_starve_siblings() {
    let faults = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&faults);
    let bus: EventBus<DomainEvent> = EventBus::with_error_handler(Arc::new(move |_: ListenerFault| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let delivered = Arc::new(AtomicUsize::new(0));

    bus.subscribe(
        "PLAYBACK_STARTED",
        Listener::sync(|_: &DomainEvent| Err(anyhow!("first listener failed"))),
    );
    bus.subscribe(
        "PLAYBACK_STARTED",
        Listener::sync(|_: &DomainEvent| panic!("second listener panicked")),
    );
    let counter = Arc::clone(&delivered);
    bus.subscribe(
        "PLAYBACK_STARTED",
        Listener::sync(move |_: &DomainEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    bus.publish(&DomainEvent::new("PLAYBACK_STARTED"));

    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert_eq!(faults.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dispatch_always_resolves_with_one_error_feedback() {
    let handlers = CommandHandlerMap::new()
        .on("THROWS", |_s: GetState, _c: Command| async move {
            Err(anyhow!("synchronous failure"))
        })
        .on("REJECTS", |_s: GetState, _c: Command| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err(anyhow!("asynchronous failure"))
        })
        .on("PANICS", |_s: GetState, _c: Command| async move {
            if true {
                panic!("handler panicked");
            }
            Ok(Vec::new())
        });
    let harness = Harness::new(handlers);

    for (command, expected) in [
        ("THROWS", UNHANDLED_HANDLER_EXCEPTION),
        ("REJECTS", UNHANDLED_HANDLER_EXCEPTION),
        ("PANICS", UNHANDLED_HANDLER_EXCEPTION),
        ("MISSING", NO_HANDLER_EXCEPTION),
    ] {
        harness.engine.dispatch(Command::new(command)).await;

        let feedback = harness.take_feedback();
        assert_eq!(feedback.len(), 1, "{command}");
        assert_eq!(feedback[0].name, expected, "{command}");
        assert_eq!(feedback[0].level, FeedbackLevel::Error, "{command}");
    }
    assert_eq!(harness.notifications(), 0);
}

#[tokio::test]
async fn outcomes_travel_only_their_own_path() {
    let handlers = CommandHandlerMap::new()
        .on("NOTIFY", |_s: GetState, _c: Command| async move {
            Ok(vec![Feedback::info("PLAYBACK_STARTED", "looks like an event name").into()])
        })
        .on("START", |_s: GetState, _c: Command| async move {
            Ok(vec![Outcome::event("PLAYBACK_STARTED")])
        });
    let harness = Harness::new(handlers);

    harness.engine.dispatch(Command::new("NOTIFY")).await;
    assert_eq!(harness.take_feedback().len(), 1);
    assert!(harness.take_events().is_empty());
    assert_eq!(harness.playback(), "stopped");

    harness.engine.dispatch(Command::new("START")).await;
    assert!(harness.take_feedback().is_empty());
    assert_eq!(harness.take_events(), vec!["PLAYBACK_STARTED"]);
    assert_eq!(harness.playback(), "playing");
}

#[tokio::test]
async fn concurrent_dispatches_can_both_pass_a_precondition() {
    let racing = Harness::new(
        handlers(Arc::new(AudioService {
            latency: Duration::ZERO,
        }))
        .on("SLOW_PAUSE", |state: GetState, _c: Command| async move {
            let playing = player(&state.get(), "playback") == "playing";
            tokio::time::sleep(Duration::from_millis(5)).await;
            if playing {
                Ok(vec![Outcome::event("PLAYBACK_PAUSED")])
            } else {
                Ok(Vec::new())
            }
        }),
    );
    racing.engine.dispatch(load_track("good-song.mp3")).await;
    racing.engine.dispatch(Command::new("PLAY")).await;
    racing.take_events();

    // Both checks run before either event is projected.
    tokio::join!(
        racing.engine.dispatch(Command::new("SLOW_PAUSE")),
        racing.engine.dispatch(Command::new("SLOW_PAUSE")),
    );

    assert_eq!(
        racing.take_events(),
        vec!["PLAYBACK_PAUSED", "PLAYBACK_PAUSED"]
    );
    assert_eq!(racing.playback(), "paused");
}
