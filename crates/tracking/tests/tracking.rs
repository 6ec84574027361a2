//! End-to-end checks for the tracking behavior against a minimal host.

use std::io::Write;
use std::sync::Arc;

use statetrack_core::{BookmarkSet, InstanceState, StateMachineDefinition, TraceRecord};
use statetrack_tracking::{
    read_config, ExtensionProvider, InstanceContext, InstanceTracking,
    StateMachineTrackingBehavior, TrackingHost,
};
use uuid::Uuid;

/// Host that starts instances of a single turnstile definition.
#[derive(Default)]
struct TurnstileHost {
    providers: Vec<Arc<dyn ExtensionProvider>>,
}

impl TrackingHost for TurnstileHost {
    fn add_extension_provider(&mut self, provider: Arc<dyn ExtensionProvider>) {
        self.providers.push(provider);
    }
}

impl TurnstileHost {
    fn start(&self, bookmarks: &BookmarkSet) -> (Uuid, Vec<InstanceTracking>) {
        let context = InstanceContext {
            instance_id: Uuid::new_v4(),
            definition: Arc::new(
                StateMachineDefinition::builder("Turnstile", "Locked")
                    .state("Unlocked")
                    .transition("Coin", "Locked", "Unlocked")
                    .transition("Push", "Unlocked", "Locked")
                    .build()
                    .unwrap(),
            ),
            bookmarks: Arc::new(bookmarks.clone()),
        };
        let extensions = self
            .providers
            .iter()
            .map(|p| p.create(&context).unwrap())
            .collect();
        (context.instance_id, extensions)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("statetrack=debug")
        .try_init();
}

#[test]
fn configured_behavior_tracks_a_run() {
    init_tracing();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[tracking]\nmax_history = 2\ntrace_to_diagnostics = true").unwrap();
    let config = read_config(file.path()).unwrap();

    let mut host = TurnstileHost::default();
    StateMachineTrackingBehavior::from_config(&config)
        .apply(&mut host)
        .unwrap();

    let bookmarks = BookmarkSet::new();
    let (id, extensions) = host.start(&bookmarks);
    let tracking = &extensions[0];

    let mut seq = 0;
    let mut emit = |name: &str, marks: &[&str]| {
        for state in [InstanceState::Executing, InstanceState::Closed] {
            if state == InstanceState::Closed {
                bookmarks.replace(marks.iter().copied());
            }
            tracking.track(&TraceRecord::builder(id, seq, name, state).build());
            seq += 1;
        }
    };
    emit("Locked", &["Coin"]);
    emit("Coin", &["Coin"]);
    emit("Unlocked", &["Push"]);
    emit("Push", &["Push"]);
    emit("Locked", &["Coin"]);

    let tracker = tracking.tracker_snapshot();
    assert_eq!(tracker.current_state(), Some("Locked"));
    assert_eq!(tracker.history().collect::<Vec<_>>(), vec!["Unlocked", "Locked"]);
    assert_eq!(
        tracker.transitions().iter().collect::<Vec<_>>(),
        vec!["Coin"]
    );
    assert_eq!(tracking.record_snapshot().len(), 10);
    assert_eq!(tracking.participant().faults(), 0);
}

#[test]
fn records_from_another_instance_are_faults() {
    let mut host = TurnstileHost::default();
    StateMachineTrackingBehavior::default()
        .apply(&mut host)
        .unwrap();
    let (_, extensions) = host.start(&BookmarkSet::new());
    let tracking = &extensions[0];

    tracking.track(
        &TraceRecord::builder(Uuid::new_v4(), 0, "Locked", InstanceState::Closed).build(),
    );
    assert_eq!(tracking.tracker_snapshot().current_state(), None);
    // the record store accepts any instance; only the tracker rejects it
    assert_eq!(tracking.record_snapshot().len(), 1);
    assert_eq!(tracking.participant().faults(), 1);
}
