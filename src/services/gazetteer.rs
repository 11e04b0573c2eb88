//! Sri Lankan location gazetteer.
//!
//! Maps attraction names to authoritative coordinates and metadata. The
//! record set is loaded once at startup from a versioned JSON file and is
//! read-only afterwards, so lookups are safe to share across requests.
//!
//! ## Lookup order
//! 1. Case-insensitive exact match on the canonical name
//! 2. Fuzzy partial-ratio match with a minimum score of 80 (0-100 scale)
//!
//! The partial ratio is the best normalized Levenshtein similarity between
//! the shorter string and every equal-length window of the longer one. Ties
//! keep the first entry in file order, so results are stable across releases.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::models::attraction::Coordinates;

/// Minimum fuzzy score accepted as a match.
const FUZZY_THRESHOLD: u32 = 80;

#[derive(Debug)]
pub enum GazetteerError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Empty(String),
}

impl fmt::Display for GazetteerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GazetteerError::Io(err) => write!(f, "Failed to read locations file: {}", err),
            GazetteerError::Parse(err) => write!(f, "Invalid locations file: {}", err),
            GazetteerError::Empty(path) => {
                write!(f, "Locations file contains no usable entries: {}", path)
            }
        }
    }
}

impl Error for GazetteerError {}

impl From<std::io::Error> for GazetteerError {
    fn from(err: std::io::Error) -> Self {
        GazetteerError::Io(err)
    }
}

impl From<serde_json::Error> for GazetteerError {
    fn from(err: serde_json::Error) -> Self {
        GazetteerError::Parse(err)
    }
}

/// One canonical location record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "unknown_category")]
    pub category: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visit_duration_minutes: Option<u32>,
}

fn unknown_category() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Deserialize)]
struct LocationsFile {
    sri_lanka_travel_locations: Vec<GazetteerEntry>,
}

/// How a resolution was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Exact,
    Fuzzy,
    Fallback,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Exact => "exact",
            ResolutionSource::Fuzzy => "fuzzy",
            ResolutionSource::Fallback => "fallback",
        }
    }
}

/// A successful coordinate resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLocation {
    pub coordinates: Coordinates,
    pub source: ResolutionSource,
}

/// In-memory name-to-coordinates index over the location record set.
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
    exact: HashMap<String, usize>,
}

impl Gazetteer {
    /// Load the record set from disk. A missing or malformed file is fatal;
    /// the process should not start without its gazetteer.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GazetteerError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let parsed: LocationsFile = serde_json::from_str(&raw)?;

        let entries: Vec<GazetteerEntry> = parsed
            .sri_lanka_travel_locations
            .into_iter()
            .filter(|entry| !entry.name.trim().is_empty())
            .collect();

        if entries.is_empty() {
            return Err(GazetteerError::Empty(
                path.as_ref().display().to_string(),
            ));
        }

        let mut exact = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            // First entry wins on duplicate names.
            exact
                .entry(entry.name.trim().to_lowercase())
                .or_insert(index);
        }

        info!(
            "Loaded {} travel locations ({} categories)",
            entries.len(),
            count_categories(&entries)
        );

        Ok(Self { entries, exact })
    }

    /// Build a gazetteer from already-parsed entries. Used by tests.
    pub fn from_entries(entries: Vec<GazetteerEntry>) -> Self {
        let mut exact = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            exact
                .entry(entry.name.trim().to_lowercase())
                .or_insert(index);
        }
        Self { entries, exact }
    }

    /// Resolve a name to coordinates, trying exact then fuzzy matching.
    pub fn resolve(&self, name: &str) -> Option<ResolvedLocation> {
        let entry_with_source = self.find(name)?;
        Some(ResolvedLocation {
            coordinates: Coordinates::new(entry_with_source.0.latitude, entry_with_source.0.longitude),
            source: entry_with_source.1,
        })
    }

    /// Full record lookup for callers that need category or metadata.
    pub fn lookup(&self, name: &str) -> Option<&GazetteerEntry> {
        self.find(name).map(|(entry, _)| entry)
    }

    fn find(&self, name: &str) -> Option<(&GazetteerEntry, ResolutionSource)> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        if let Some(&index) = self.exact.get(&needle) {
            return Some((&self.entries[index], ResolutionSource::Exact));
        }

        let mut best_score = 0;
        let mut best_index = None;
        for (index, entry) in self.entries.iter().enumerate() {
            let score = partial_ratio(&needle, &entry.name.trim().to_lowercase());
            // Strict comparison keeps the first entry on ties.
            if score > best_score && score >= FUZZY_THRESHOLD {
                best_score = score;
                best_index = Some(index);
            }
        }

        match best_index {
            Some(index) => {
                info!(
                    "Fuzzy match for '{}': '{}' (score {})",
                    name, self.entries[index].name, best_score
                );
                Some((&self.entries[index], ResolutionSource::Fuzzy))
            }
            None => {
                warn!("No coordinates found for attraction: {}", name);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-category entry counts, for the health endpoint.
    pub fn category_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for entry in &self.entries {
            *counts.entry(entry.category.clone()).or_insert(0) += 1;
        }
        counts
    }
}

fn count_categories(entries: &[GazetteerEntry]) -> usize {
    let mut categories: Vec<&str> = entries.iter().map(|e| e.category.as_str()).collect();
    categories.sort_unstable();
    categories.dedup();
    categories.len()
}

/// Partial-substring similarity in [0, 100].
///
/// Slides the shorter string over the longer one and keeps the best
/// normalized Levenshtein similarity of any equal-length window.
pub fn partial_ratio(a: &str, b: &str) -> u32 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 || b_len == 0 {
        return 0;
    }

    let (short, long, short_len, long_len) = if a_len <= b_len {
        (a, b, a_len, b_len)
    } else {
        (b, a, b_len, a_len)
    };

    let long_chars: Vec<char> = long.chars().collect();
    let mut best = 0.0f64;
    for start in 0..=(long_len - short_len) {
        let window: String = long_chars[start..start + short_len].iter().collect();
        let similarity = strsim::normalized_levenshtein(short, &window);
        if similarity > best {
            best = similarity;
        }
        if best >= 1.0 {
            break;
        }
    }

    (best * 100.0).round() as u32
}
