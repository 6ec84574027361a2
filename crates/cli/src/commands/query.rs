use std::path::Path;

use statetrack_core::{InstanceState, RecordQuery};

use crate::input::read_store;
use crate::{fail, print_json, OutputFormat};

pub(crate) fn cmd_query(
    trace: &Path,
    activity: Option<&str>,
    state: Option<InstanceState>,
    from: u64,
    output: OutputFormat,
    quiet: bool,
) {
    let store = read_store(trace).unwrap_or_else(|e| fail(&e, output, quiet));

    let mut query = RecordQuery::new().starting_at(from);
    if let Some(activity) = activity {
        query = query.activity(activity);
    }
    if let Some(state) = state {
        query = query.state(state);
    }

    let matches: Vec<_> = store.query(&query).collect();
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let value = serde_json::to_value(&matches)
                .unwrap_or_else(|e| fail(&format!("serialization: {}", e), output, quiet));
            print_json(&value);
        }
        OutputFormat::Text => {
            for record in &matches {
                println!("{}", record);
            }
            println!("{} of {} records match {}", matches.len(), store.len(), query);
        }
    }
}
