//! Presence checks for the host's durable-store schema scripts.
//!
//! The schema itself belongs to the host platform. These helpers only read
//! its provisioning scripts and report which required tables and procedures
//! are never created by them. Script text is cached in a [`ScriptCache`],
//! loaded at most once per script, and shared by reference.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::error::StorageError;

/// Kind of schema object a script creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaObjectKind {
    Table,
    Procedure,
}

/// A named table or stored procedure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaObject {
    pub kind: SchemaObjectKind,
    pub name: String,
}

impl SchemaObject {
    pub fn table(name: impl Into<String>) -> Self {
        SchemaObject {
            kind: SchemaObjectKind::Table,
            name: name.into(),
        }
    }

    pub fn procedure(name: impl Into<String>) -> Self {
        SchemaObject {
            kind: SchemaObjectKind::Procedure,
            name: name.into(),
        }
    }
}

impl fmt::Display for SchemaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SchemaObjectKind::Table => write!(f, "table {}", self.name),
            SchemaObjectKind::Procedure => write!(f, "procedure {}", self.name),
        }
    }
}

/// Objects a durable instance store schema must provide.
pub fn required_objects() -> Vec<SchemaObject> {
    let mut objects: Vec<SchemaObject> = ["Instances", "RunnableInstances", "Keys", "LockOwners"]
        .into_iter()
        .map(SchemaObject::table)
        .collect();
    objects.extend(
        ["CreateInstance", "LoadInstance", "SaveInstance", "DeleteInstance"]
            .into_iter()
            .map(SchemaObject::procedure),
    );
    objects
}

/// Lazily loaded, once-initialized script text, keyed by file name.
#[derive(Debug)]
pub struct ScriptCache {
    dir: PathBuf,
    scripts: BTreeMap<String, OnceLock<Arc<str>>>,
}

impl ScriptCache {
    /// A cache over the given script file names in `dir`. Nothing is read yet.
    pub fn new<I, S>(dir: impl Into<PathBuf>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptCache {
            dir: dir.into(),
            scripts: names
                .into_iter()
                .map(|n| (n.into(), OnceLock::new()))
                .collect(),
        }
    }

    /// A cache over every `*.sql` file in `dir`.
    pub fn discover(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        let mut names = Vec::new();
        let entries = std::fs::read_dir(&dir).map_err(|e| {
            StorageError::Backend(format!("could not read '{}': {}", dir.display(), e))
        })?;
        for entry in entries {
            let path = entry?.path();
            if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("sql"))
            {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(ScriptCache::new(dir, names))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }

    /// Script text, read from disk on first access only.
    pub fn get(&self, name: &str) -> Result<Arc<str>, StorageError> {
        let cell = self
            .scripts
            .get(name)
            .ok_or_else(|| StorageError::Backend(format!("unknown script '{}'", name)))?;
        if let Some(text) = cell.get() {
            return Ok(text.clone());
        }
        let path = self.dir.join(name);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            StorageError::Backend(format!("could not read '{}': {}", path.display(), e))
        })?;
        // A concurrent loader may have won; either copy is identical.
        let _ = cell.set(Arc::from(text));
        Ok(cell.get().cloned().unwrap_or_else(|| Arc::from("")))
    }
}

/// Objects created by a script, in order of appearance.
pub fn created_objects(script: &str) -> Vec<SchemaObject> {
    let mut out = Vec::new();
    let tokens: Vec<&str> = script.split_whitespace().collect();
    let mut i = 0;
    while i + 2 < tokens.len() {
        let verb = tokens[i];
        let kind = tokens[i + 1];
        let or_alter = verb.eq_ignore_ascii_case("alter")
            && i > 0
            && tokens[i - 1].eq_ignore_ascii_case("or");
        let is_create = verb.eq_ignore_ascii_case("create") || or_alter;
        if is_create {
            let kind = if kind.eq_ignore_ascii_case("table") {
                Some(SchemaObjectKind::Table)
            } else if kind.eq_ignore_ascii_case("procedure") || kind.eq_ignore_ascii_case("proc") {
                Some(SchemaObjectKind::Procedure)
            } else {
                None
            };
            if let Some(kind) = kind {
                let name = object_name(tokens[i + 2]);
                if !name.is_empty() {
                    out.push(SchemaObject { kind, name });
                }
                i += 3;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// `[schema].[Name](` → `Name`
fn object_name(token: &str) -> String {
    let token = token.split('(').next().unwrap_or(token);
    let last = token.rsplit('.').next().unwrap_or(token);
    last.trim_matches(|c| matches!(c, '[' | ']' | '"' | '`' | ';'))
        .to_string()
}

/// Required objects that no script in the cache creates.
pub fn verify_schema(
    cache: &ScriptCache,
    required: &[SchemaObject],
) -> Result<Vec<SchemaObject>, StorageError> {
    let mut created = Vec::new();
    for name in cache.names() {
        created.extend(created_objects(&cache.get(name)?));
    }
    let missing: Vec<SchemaObject> = required
        .iter()
        .filter(|r| {
            !created
                .iter()
                .any(|c| c.kind == r.kind && c.name.eq_ignore_ascii_case(&r.name))
        })
        .cloned()
        .collect();
    if !missing.is_empty() {
        tracing::warn!(
            missing = missing.len(),
            dir = %cache.dir().display(),
            "schema objects missing"
        );
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
        CREATE TABLE [System.Activities.DurableInstancing].[Instances] (
            [Id] uniqueidentifier not null
        );
        create table [dbo].[Keys](Id bigint);
        CREATE TABLE LockOwners (Id int);
    "#;

    const LOGIC: &str = r#"
        CREATE PROCEDURE [System.Activities.DurableInstancing].[CreateInstance]
        AS BEGIN SELECT 1 END
        GO
        create proc dbo.LoadInstance as select 1
        CREATE OR ALTER PROCEDURE [SaveInstance] AS SELECT 1
    "#;

    #[test]
    fn parses_created_objects() {
        let objects = created_objects(SCHEMA);
        assert_eq!(
            objects,
            vec![
                SchemaObject::table("Instances"),
                SchemaObject::table("Keys"),
                SchemaObject::table("LockOwners"),
            ]
        );
        let procs = created_objects(LOGIC);
        assert_eq!(
            procs,
            vec![
                SchemaObject::procedure("CreateInstance"),
                SchemaObject::procedure("LoadInstance"),
                SchemaObject::procedure("SaveInstance"),
            ]
        );
    }

    #[test]
    fn reports_missing_objects() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("schema.sql"), SCHEMA).unwrap();
        std::fs::write(dir.path().join("logic.sql"), LOGIC).unwrap();
        std::fs::write(dir.path().join("README.txt"), "CREATE TABLE Nope").unwrap();
        let cache = ScriptCache::discover(dir.path()).unwrap();
        assert_eq!(cache.names().count(), 2);
        let missing = verify_schema(&cache, &required_objects()).unwrap();
        assert_eq!(
            missing,
            vec![
                SchemaObject::table("RunnableInstances"),
                SchemaObject::procedure("DeleteInstance"),
            ]
        );
    }

    #[test]
    fn script_is_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.sql");
        std::fs::write(&path, SCHEMA).unwrap();
        let cache = ScriptCache::new(dir.path(), ["schema.sql"]);
        let first = cache.get("schema.sql").unwrap();
        std::fs::remove_file(&path).unwrap();
        let second = cache.get("schema.sql").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn unknown_script_is_an_error() {
        let cache = ScriptCache::new("/nonexistent", ["schema.sql"]);
        assert!(cache.get("other.sql").is_err());
        assert!(cache.get("schema.sql").is_err());
    }
}
