use serde::{Deserialize, Serialize};

/// Geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A candidate attraction emitted by the retriever.
///
/// Immutable once ranked, except that the gazetteer may fill in missing
/// coordinates before clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attraction {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub region: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Fused relevance score in [0, 1].
    pub pear_score: f64,
    pub neural_score: f64,
    pub similarity_score: f64,
    pub visit_duration_minutes: u32,
}

impl Attraction {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }
}

/// Structured traveller preferences fed into the context embedding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    pub interests: Vec<String>,
    pub trip_type: Option<String>,
    pub budget: Option<String>,
    pub duration_days: Option<u32>,
    pub group_size: Option<u32>,
    /// 1-10 scales; values above 7 and 4 map to qualitative phrases.
    pub cultural_interest: Option<u8>,
    pub adventure_level: Option<u8>,
    pub nature_appreciation: Option<u8>,
}

impl UserContext {
    /// Render the profile as the text that gets embedded alongside the query.
    pub fn to_context_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !self.interests.is_empty() {
            parts.push(format!("Interests: {}", self.interests.join(", ")));
        }
        if let Some(trip_type) = &self.trip_type {
            parts.push(format!("Trip type: {}", trip_type));
        }
        if let Some(budget) = &self.budget {
            parts.push(format!("Budget: {}", budget));
        }
        if let Some(days) = self.duration_days {
            parts.push(format!("Duration: {} days", days));
        }
        if let Some(size) = self.group_size {
            parts.push(format!("Group size: {}", size));
        }
        if let Some(phrase) = tiered_phrase(self.cultural_interest, "cultural interest") {
            parts.push(phrase);
        }
        if let Some(phrase) = tiered_phrase(self.adventure_level, "adventure preference") {
            parts.push(phrase);
        }
        if let Some(phrase) = tiered_phrase(self.nature_appreciation, "nature appreciation") {
            parts.push(phrase);
        }

        if parts.is_empty() {
            "General travel preferences".to_string()
        } else {
            parts.join(". ")
        }
    }
}

fn tiered_phrase(level: Option<u8>, subject: &str) -> Option<String> {
    match level {
        Some(level) if level > 7 => Some(format!("High {}", subject)),
        Some(level) if level > 4 => Some(format!("Moderate {}", subject)),
        _ => None,
    }
}
