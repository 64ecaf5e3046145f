use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    choreographies: HashMap<String, String>,
    signals: HashMap<String, SignalEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignalEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        correlation: Option<String>,
    },
}

impl SignalEntry {
    fn as_path(&self) -> &str {
        match self {
            SignalEntry::Path(path) => path,
            SignalEntry::Detailed { path, .. } => path,
        }
    }

    fn correlation(&self) -> Option<&str> {
        match self {
            SignalEntry::Path(_) => None,
            SignalEntry::Detailed { correlation, .. } => correlation.as_deref(),
        }
    }
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

/// Choreography libraries (JSON accepted by `parse_choreographies_json`).
pub mod choreographies {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.choreographies.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&MANIFEST.choreographies, "choreography", name)?;
        read_to_string(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&MANIFEST.choreographies, "choreography", name)?;
        super::load_json(rel)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = lookup(&MANIFEST.choreographies, "choreography", name)?;
        Ok(resolve_path(rel))
    }
}

/// Recorded signal streams: a JSON array of `{ type, payload }` envelopes.
pub mod signals {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.signals.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.signals, "signal", name)?;
        read_to_string(entry.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&MANIFEST.signals, "signal", name)?;
        super::load_json(entry.as_path())
    }

    /// Correlation id the stream was captured under, if recorded.
    pub fn correlation(name: &str) -> Result<Option<String>> {
        let entry = lookup(&MANIFEST.signals, "signal", name)?;
        Ok(entry.correlation().map(str::to_owned))
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.signals, "signal", name)?;
        Ok(resolve_path(entry.as_path()))
    }
}
