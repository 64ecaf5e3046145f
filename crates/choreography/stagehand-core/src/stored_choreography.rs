use serde::Deserialize;

use crate::data::ChoreographyDefinition;
use crate::error::Result;

/// Accepted top-level shapes of a choreography file.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredChoreographies {
    Library {
        choreographies: Vec<ChoreographyDefinition>,
    },
    Many(Vec<ChoreographyDefinition>),
    One(Box<ChoreographyDefinition>),
}

/// Public API: parse choreography JSON into definitions ready for registration.
///
/// Accepts a single definition object, an array of definitions, or a library
/// object `{ "choreographies": [...] }`. Definitions are not validated here;
/// call `ChoreographyDefinition::validate` when authoring feedback is wanted.
pub fn parse_choreographies_json(s: &str) -> Result<Vec<ChoreographyDefinition>> {
    let stored: StoredChoreographies = serde_json::from_str(s)?;
    let defs = match stored {
        StoredChoreographies::Library { choreographies } => choreographies,
        StoredChoreographies::Many(defs) => defs,
        StoredChoreographies::One(def) => vec![*def],
    };
    for def in &defs {
        let issues = def.validate();
        if !issues.is_empty() {
            log::debug!(
                "choreography '{}' loaded with {} issue(s)",
                def.label(),
                issues.len()
            );
        }
    }
    Ok(defs)
}
