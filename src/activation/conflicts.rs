//! Heuristic conflict warnings
//!
//! Nothing here inspects pak contents. Names are case-folded and compared, and
//! the results are advisory only.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use crate::models::Instance;

/// Substrings that mark a mod as touching AI behaviour
pub const AI_KEYWORDS: &[&str] = &["ai", "suspect", "swat", "officer"];

/// Version markers, tried in this order
const VERSION_MARKERS: &[&str] = &["_v", "-v"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// More than one enabled mod looks AI-related
    AiOverlap(Vec<String>),
    /// Two enabled mods look like versions of the same thing
    SimilarNames { canonical: String, duplicate: String },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::AiOverlap(names) => write!(
                f,
                "Multiple AI-related mods detected: {}. These may conflict.",
                names.join(", ")
            ),
            Conflict::SimilarNames {
                canonical,
                duplicate,
            } => write!(
                f,
                "Similar mods detected: '{}' and '{}'. These may be duplicate versions.",
                canonical, duplicate
            ),
        }
    }
}

fn is_ai_related(name: &str) -> bool {
    let lower = name.to_lowercase();
    AI_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Lowercased name cut at the first version marker
pub fn base_name(name: &str) -> String {
    let mut base = name.to_lowercase();
    for marker in VERSION_MARKERS {
        if let Some(pos) = base.find(marker) {
            base.truncate(pos);
        }
    }
    base
}

/// Warnings for the enabled mods of an instance.
pub fn detect_conflicts(instance: &Instance) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    let ai_mods: Vec<String> = instance
        .enabled_mods()
        .filter(|m| is_ai_related(&m.name))
        .map(|m| m.name.clone())
        .collect();
    if ai_mods.len() > 1 {
        conflicts.push(Conflict::AiOverlap(ai_mods));
    }

    // First mod seen with a given base name stays canonical
    let mut seen: HashMap<String, &str> = HashMap::new();
    for entry in instance.enabled_mods() {
        match seen.entry(base_name(&entry.name)) {
            Entry::Occupied(canonical) => conflicts.push(Conflict::SimilarNames {
                canonical: canonical.get().to_string(),
                duplicate: entry.name.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(&entry.name);
            }
        }
    }

    conflicts
}
