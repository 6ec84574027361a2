use std::path::Path;
use std::process;

use serde_json::json;
use statetrack_core::InstanceState;
use statetrack_testing::{exists, occurs_in_order, AssertionError};

use crate::input::{read_definition, read_store};
use crate::{fail, print_json, OutputFormat, EXIT_CHECK_FAILED};

pub(crate) fn cmd_check(
    trace: &Path,
    definition: &Path,
    in_order: &[String],
    output: OutputFormat,
    quiet: bool,
) {
    let definition = read_definition(definition).unwrap_or_else(|e| fail(&e, output, quiet));
    let store = read_store(trace).unwrap_or_else(|e| fail(&e, output, quiet));

    let result = occurs_in_order(&definition, &store, in_order);
    if !quiet {
        match (&result, output) {
            (Ok(()), OutputFormat::Text) => {
                println!("ok: {} occur in order", in_order.join(" -> "));
            }
            (Err(e), OutputFormat::Text) => println!("FAILED: {}", e),
            (_, OutputFormat::Json) => print_json(&check_json(in_order, &result)),
        }
    }
    if result.is_err() {
        process::exit(EXIT_CHECK_FAILED);
    }
}

fn check_json(in_order: &[String], result: &Result<(), AssertionError>) -> serde_json::Value {
    match result {
        Ok(()) => json!({ "passed": true, "in_order": in_order }),
        Err(AssertionError::Missing {
            expected,
            position,
            searched_from,
            last_matched,
        }) => json!({
            "passed": false,
            "in_order": in_order,
            "missing": expected,
            "position": position,
            "searched_from": searched_from,
            "last_matched": last_matched,
        }),
        Err(e) => json!({ "passed": false, "in_order": in_order, "error": e.to_string() }),
    }
}

pub(crate) fn cmd_exists(
    trace: &Path,
    activity: &str,
    state: InstanceState,
    output: OutputFormat,
    quiet: bool,
) {
    let store = read_store(trace).unwrap_or_else(|e| fail(&e, output, quiet));
    let found = exists(&store, activity, state);
    if !quiet {
        match output {
            OutputFormat::Json => print_json(&json!({
                "activity": activity,
                "state": state,
                "exists": found,
            })),
            OutputFormat::Text if found => println!("ok: {} reached {}", activity, state),
            OutputFormat::Text => println!("FAILED: {} never reached {}", activity, state),
        }
    }
    if !found {
        process::exit(EXIT_CHECK_FAILED);
    }
}
