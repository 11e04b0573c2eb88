use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::attraction::UserContext;

/// How much daily driving the traveller is willing to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelPreference {
    Minimal,
    Balanced,
    Extensive,
}

impl TravelPreference {
    /// Upper bound on intra-cluster driving per day.
    pub fn max_daily_travel_hours(&self) -> f64 {
        match self {
            TravelPreference::Minimal => 2.0,
            TravelPreference::Balanced => 3.0,
            TravelPreference::Extensive => 4.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLevel {
    Budget,
    Medium,
    Luxury,
}

impl BudgetLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetLevel::Budget => "budget",
            BudgetLevel::Medium => "medium",
            BudgetLevel::Luxury => "luxury",
        }
    }
}

/// Clustering strategy selectable per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringAlgorithm {
    Smart,
    KMeans,
    Dbscan,
}

impl Default for ClusteringAlgorithm {
    fn default() -> Self {
        ClusteringAlgorithm::Smart
    }
}

impl ClusteringAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusteringAlgorithm::Smart => "smart_clustering",
            ClusteringAlgorithm::KMeans => "kmeans",
            ClusteringAlgorithm::Dbscan => "dbscan",
        }
    }
}

/// Request for a clustered multi-day travel plan.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanRequest {
    pub query: String,
    #[serde(default)]
    pub interests: Vec<String>,
    pub trip_duration_days: u32,
    #[serde(default = "default_travel_preference")]
    pub daily_travel_preference: TravelPreference,
    #[serde(default = "default_max_attractions_per_day")]
    pub max_attractions_per_day: usize,
    #[serde(default = "default_budget_level")]
    pub budget_level: BudgetLevel,
    #[serde(default = "default_group_size")]
    pub group_size: u32,
    #[serde(default)]
    pub clustering_algorithm: ClusteringAlgorithm,
}

fn default_travel_preference() -> TravelPreference {
    TravelPreference::Balanced
}

fn default_max_attractions_per_day() -> usize {
    4
}

fn default_budget_level() -> BudgetLevel {
    BudgetLevel::Medium
}

fn default_group_size() -> u32 {
    2
}

impl PlanRequest {
    /// Client-side validation of the request ranges.
    pub fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("query must not be empty".to_string());
        }
        if !(1..=30).contains(&self.trip_duration_days) {
            return Err("trip_duration_days must be between 1 and 30".to_string());
        }
        if !(2..=6).contains(&self.max_attractions_per_day) {
            return Err("max_attractions_per_day must be between 2 and 6".to_string());
        }
        if self.group_size < 1 {
            return Err("group_size must be at least 1".to_string());
        }
        Ok(())
    }

    /// Derive the user context embedded alongside the query.
    pub fn user_context(&self) -> UserContext {
        let trip_type = if self.interests.iter().any(|i| i.eq_ignore_ascii_case("culture")) {
            "cultural"
        } else {
            "mixed"
        };

        UserContext {
            interests: self.interests.clone(),
            trip_type: Some(trip_type.to_string()),
            budget: Some(self.budget_level.as_str().to_string()),
            duration_days: Some(self.trip_duration_days),
            group_size: Some(self.group_size),
            ..Default::default()
        }
    }
}

/// Summary of the cluster assigned to one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub cluster_id: usize,
    pub region_name: String,
    pub center_lat: f64,
    pub center_lng: f64,
    pub size: usize,
    pub total_pear_score: f64,
    pub estimated_time_hours: f64,
    pub travel_time_minutes: f64,
    pub value_per_hour: f64,
    pub is_balanced: bool,
    pub optimal_visiting_order: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttractionInfo {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub region: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pear_score: f64,
    pub visit_order: usize,
}

/// One day of the generated itinerary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayItinerary {
    pub day: usize,
    pub cluster_info: ClusterInfo,
    pub attractions: Vec<AttractionInfo>,
    pub total_travel_distance_km: f64,
    pub estimated_total_time_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_travel_distance_km: f64,
    pub average_value_per_hour: f64,
    pub balanced_clusters: usize,
    /// Which routing source produced the travel metrics.
    pub travel_optimization: String,
    pub clustering_algorithm: String,
}

/// Complete clustered travel plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResponse {
    pub query: String,
    pub total_days: usize,
    pub total_attractions: usize,
    pub daily_itineraries: Vec<DayItinerary>,
    pub overall_stats: OverallStats,
    pub processing_time_ms: f64,
    pub generated_at: DateTime<Utc>,
}
