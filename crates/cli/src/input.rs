//! Reading trace and definition files.

use std::path::Path;

use statetrack_core::{RecordStore, StateMachineDefinition, TraceRecord};

/// Read a trace file: either one JSON array of records or one record per line.
pub(crate) fn read_records(path: &Path) -> Result<Vec<TraceRecord>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .map_err(|e| format!("could not parse '{}': {}", path.display(), e));
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| format!("could not parse '{}' line {}: {}", path.display(), i + 1, e))
        })
        .collect()
}

/// Read a trace file into a record store, rejecting records that are not in
/// sequence order.
pub(crate) fn read_store(path: &Path) -> Result<RecordStore, String> {
    let mut store = RecordStore::new();
    for record in read_records(path)? {
        store
            .append(record)
            .map_err(|e| format!("'{}': {}", path.display(), e))?;
    }
    Ok(store)
}

/// Read a state machine definition. `.toml` files are parsed as TOML,
/// anything else as JSON.
pub(crate) fn read_definition(path: &Path) -> Result<StateMachineDefinition, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let definition: StateMachineDefinition = if is_toml {
        toml::from_str(&content)
            .map_err(|e| format!("could not parse '{}': {}", path.display(), e))?
    } else {
        serde_json::from_str(&content)
            .map_err(|e| format!("could not parse '{}': {}", path.display(), e))?
    };

    definition
        .validate()
        .map_err(|e| format!("invalid definition '{}': {}", path.display(), e))?;
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use statetrack_core::InstanceState;
    use std::io::Write;
    use uuid::Uuid;

    fn record(seq: u64, name: &str) -> TraceRecord {
        TraceRecord::builder(Uuid::nil(), seq, name, InstanceState::Closed).build()
    }

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_json_array_and_json_lines_alike() {
        let records = vec![record(0, "A"), record(1, "B")];
        let array = write_temp(".json", &serde_json::to_string(&records).unwrap());
        let lines = write_temp(
            ".jsonl",
            &records
                .iter()
                .map(|r| serde_json::to_string(r).unwrap())
                .collect::<Vec<_>>()
                .join("\n\n"),
        );
        assert_eq!(read_records(array.path()).unwrap(), records);
        assert_eq!(read_records(lines.path()).unwrap(), records);
    }

    #[test]
    fn bad_line_is_reported_by_number() {
        let lines = write_temp(
            ".jsonl",
            &format!("{}\nnot json\n", serde_json::to_string(&record(0, "A")).unwrap()),
        );
        let err = read_records(lines.path()).unwrap_err();
        assert!(err.contains("line 2"), "{err}");
    }

    #[test]
    fn out_of_order_trace_is_rejected() {
        let file = write_temp(
            ".json",
            &serde_json::to_string(&vec![record(3, "A"), record(1, "B")]).unwrap(),
        );
        assert!(read_store(file.path()).is_err());
    }

    #[test]
    fn definitions_read_from_toml() {
        let file = write_temp(
            ".toml",
            r#"
name = "Turnstile"
initial_state = "Locked"
states = ["Locked", "Unlocked"]

[[transitions]]
name = "Coin"
from = "Locked"
to = "Unlocked"
"#,
        );
        let def = read_definition(file.path()).unwrap();
        assert_eq!(def.name, "Turnstile");
        assert_eq!(def.transitions.len(), 1);
    }

    #[test]
    fn invalid_definition_is_rejected() {
        let file = write_temp(
            ".json",
            r#"{"name": "Turnstile", "initial_state": "Nowhere", "states": ["Locked"]}"#,
        );
        assert!(read_definition(file.path())
            .unwrap_err()
            .contains("invalid definition"));
    }
}
