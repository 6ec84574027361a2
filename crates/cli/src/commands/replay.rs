use std::path::Path;
use std::process;
use std::sync::Arc;

use serde_json::json;
use statetrack_core::{BookmarkSet, InstanceState, StateMachineDefinition, TraceRecord};
use statetrack_storage::{open_store, promote_tracker, save_tracker};
use statetrack_tracking::{
    ExtensionProvider, InstanceContext, InstanceTracking, StateMachineTrackingBehavior,
    TrackingConfig, TrackingHost,
};
use uuid::Uuid;

use crate::input::{read_definition, read_records};
use crate::{fail, print_json, OutputFormat, EXIT_CHECK_FAILED};

pub(crate) struct ReplayOptions<'a> {
    pub trace: &'a Path,
    pub definition: &'a Path,
    pub max_history: Option<usize>,
    pub save: bool,
    pub config: &'a TrackingConfig,
    pub output: OutputFormat,
    pub quiet: bool,
}

/// Offline stand-in for a hosted service: holds the registered providers
/// and starts the single instance a trace file describes.
#[derive(Default)]
struct ReplayHost {
    providers: Vec<Arc<dyn ExtensionProvider>>,
}

impl TrackingHost for ReplayHost {
    fn add_extension_provider(&mut self, provider: Arc<dyn ExtensionProvider>) {
        self.providers.push(provider);
    }
}

/// A recorded trace carries no bookmarks, so while replaying, the
/// transitions leaving a state stand in for the bookmarks the host would
/// have exposed there.
fn replay_bookmarks(definition: &StateMachineDefinition, record: &TraceRecord) -> Vec<String> {
    definition
        .transitions_from(&record.activity_name)
        .map(|t| t.name.clone())
        .collect()
}

pub(crate) fn cmd_replay(opts: ReplayOptions<'_>) {
    let output = opts.output;
    let quiet = opts.quiet;

    let definition = Arc::new(
        read_definition(opts.definition).unwrap_or_else(|e| fail(&e, output, quiet)),
    );
    let records = read_records(opts.trace).unwrap_or_else(|e| fail(&e, output, quiet));
    let instance_id = records.first().map_or(Uuid::nil(), |r| r.instance_id);

    let mut behavior = StateMachineTrackingBehavior::from_config(opts.config);
    if let Some(max_history) = opts.max_history {
        behavior = StateMachineTrackingBehavior::new(max_history)
            .with_diagnostics(opts.config.tracking.trace_to_diagnostics);
    }
    let mut host = ReplayHost::default();
    behavior
        .apply(&mut host)
        .unwrap_or_else(|e| fail(&e.to_string(), output, quiet));

    let bookmarks = BookmarkSet::new();
    let context = InstanceContext {
        instance_id,
        definition: definition.clone(),
        bookmarks: Arc::new(bookmarks.clone()),
    };
    let extensions: Vec<InstanceTracking> = host
        .providers
        .iter()
        .map(|p| p.create(&context))
        .collect::<Result<_, _>>()
        .unwrap_or_else(|e| fail(&e.to_string(), output, quiet));
    let Some(tracking) = extensions.first() else {
        fail("no tracking extension registered", output, quiet);
    };

    tracing::debug!(%instance_id, records = records.len(), "replaying trace");
    for record in &records {
        if record.state == InstanceState::Closed && definition.is_state(&record.activity_name) {
            bookmarks.replace(replay_bookmarks(&definition, record));
        }
        tracking.track(record);
    }

    let tracker = tracking.tracker_snapshot();
    let faults = tracking.participant().faults();

    if opts.save {
        let runtime = tokio::runtime::Runtime::new()
            .unwrap_or_else(|e| fail(&format!("could not start runtime: {}", e), output, quiet));
        let connection = &opts.config.store.connection_string;
        runtime
            .block_on(async {
                let store = open_store(connection).await?;
                save_tracker(store.as_ref(), &tracker).await?;
                promote_tracker(store.as_ref(), &tracker).await
            })
            .unwrap_or_else(|e| fail(&e.to_string(), output, quiet));
        tracing::debug!(%instance_id, connection = %connection, "tracker saved");
    }

    if !quiet {
        match output {
            OutputFormat::Json => print_json(&json!({
                "tracker": tracker.snapshot(),
                "records": tracking.record_snapshot().len(),
                "faults": faults,
                "terminal": tracker.is_terminal(),
            })),
            OutputFormat::Text => {
                println!(
                    "{} instance {}",
                    tracker.state_machine(),
                    tracker.instance_id()
                );
                println!(
                    "  current state: {}",
                    tracker.current_state().unwrap_or("(none)")
                );
                println!(
                    "  history:       {}",
                    tracker.history().collect::<Vec<_>>().join(" -> ")
                );
                println!(
                    "  transitions:   {}",
                    tracker
                        .transitions()
                        .iter()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                println!("  records:       {}", records.len());
                if faults > 0 {
                    println!("  rejected:      {}", faults);
                }
                if opts.save {
                    println!("  saved to {}", opts.config.store.connection_string);
                }
            }
        }
    }

    if faults > 0 {
        process::exit(EXIT_CHECK_FAILED);
    }
}
