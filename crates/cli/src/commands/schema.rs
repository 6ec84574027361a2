use std::path::Path;
use std::process;

use serde_json::json;
use statetrack_storage::schema::{required_objects, verify_schema, ScriptCache};

use crate::{fail, print_json, OutputFormat, EXIT_CHECK_FAILED};

pub(crate) fn cmd_schema(script_dir: &Path, output: OutputFormat, quiet: bool) {
    let cache = ScriptCache::discover(script_dir).unwrap_or_else(|e| {
        fail(
            &format!("could not read scripts in '{}': {}", script_dir.display(), e),
            output,
            quiet,
        )
    });
    let required = required_objects();
    let missing =
        verify_schema(&cache, &required).unwrap_or_else(|e| fail(&e.to_string(), output, quiet));

    if !quiet {
        match output {
            OutputFormat::Json => print_json(&json!({
                "scripts": cache.names().collect::<Vec<_>>(),
                "required": required.len(),
                "missing": missing.iter().map(ToString::to_string).collect::<Vec<_>>(),
            })),
            OutputFormat::Text => {
                println!(
                    "{} scripts in {}",
                    cache.names().count(),
                    script_dir.display()
                );
                if missing.is_empty() {
                    println!("ok: all {} required objects are created", required.len());
                } else {
                    for object in &missing {
                        println!("  missing {}", object);
                    }
                }
            }
        }
    }
    if !missing.is_empty() {
        process::exit(EXIT_CHECK_FAILED);
    }
}
