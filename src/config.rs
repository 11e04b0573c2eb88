use serde::{Deserialize, Serialize};

/// Runtime configuration for the planning pipeline.
///
/// Every knob can be overridden through the environment; defaults match the
/// values the planner was tuned with. Score-fusion and clustering weights are
/// exposed here rather than hardcoded so they can be adjusted per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the Qdrant instance holding the attraction collection.
    pub qdrant_url: String,
    /// Optional API key for hosted Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Collection searched for candidate attractions.
    pub qdrant_collection: String,
    /// OpenRouteService token. Absent means haversine-only routing.
    pub openroute_api_key: Option<String>,
    /// Path to the Sri Lankan locations record set loaded at startup.
    pub locations_file: String,
    /// Dimension of the embedding space shared by queries and attractions.
    pub embedding_dim: usize,
    /// First hidden layer width of the neural ranker.
    pub ranker_hidden_dim: usize,
    /// Optional pretrained ranker weights (JSON blob).
    pub ranker_weights_path: Option<String>,
    /// Weight of the neural score in the fused PEAR score.
    pub neural_score_weight: f64,
    /// Weight of the vector similarity in the fused PEAR score.
    pub similarity_score_weight: f64,
    /// Distance penalty applied when building the smart-clustering
    /// similarity matrix.
    pub distance_penalty_weight: f64,
    /// Candidate budget for the vector search, before re-ranking.
    pub vector_search_limit: usize,
    /// Maximum pairwise distance tolerated inside one day cluster.
    pub max_cluster_radius_km: f64,
    /// Minimum attractions per cluster before balancing kicks in.
    pub min_attractions_per_cluster: usize,
    /// Assumed driving speed for haversine duration estimates.
    pub avg_speed_kmh: f64,
    /// Per-request cap on concurrent route-matrix calls.
    pub route_concurrency: usize,
    /// Process-wide ceiling on in-flight external route calls.
    pub max_inflight_route_calls: usize,
    /// Seed shared by the clustering algorithms and the ranker fallback init.
    pub rng_seed: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_api_key: None,
            qdrant_collection: "exploresl".to_string(),
            openroute_api_key: None,
            locations_file: "data/sri_lanka_locations.json".to_string(),
            embedding_dim: 384,
            ranker_hidden_dim: 256,
            ranker_weights_path: None,
            neural_score_weight: 0.7,
            similarity_score_weight: 0.3,
            distance_penalty_weight: 0.7,
            vector_search_limit: 100,
            max_cluster_radius_km: 40.0,
            min_attractions_per_cluster: 2,
            avg_speed_kmh: 40.0,
            route_concurrency: 8,
            max_inflight_route_calls: 32,
            rng_seed: 42,
        }
    }
}

impl AppConfig {
    /// Create a config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            qdrant_url: std::env::var("QDRANT_URL").unwrap_or(defaults.qdrant_url),
            qdrant_api_key: std::env::var("QDRANT_API_KEY").ok().filter(|s| !s.is_empty()),
            qdrant_collection: std::env::var("QDRANT_COLLECTION_NAME")
                .unwrap_or(defaults.qdrant_collection),
            openroute_api_key: std::env::var("OPENROUTE_SERVICE_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            locations_file: std::env::var("LOCATIONS_FILE_PATH").unwrap_or(defaults.locations_file),
            embedding_dim: std::env::var("EMBEDDING_DIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.embedding_dim),
            ranker_hidden_dim: std::env::var("RANKER_HIDDEN_DIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ranker_hidden_dim),
            ranker_weights_path: std::env::var("RANKER_WEIGHTS_PATH")
                .ok()
                .filter(|s| !s.is_empty()),
            neural_score_weight: std::env::var("NEURAL_SCORE_WEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.neural_score_weight),
            similarity_score_weight: std::env::var("SIMILARITY_SCORE_WEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.similarity_score_weight),
            distance_penalty_weight: std::env::var("DISTANCE_PENALTY_WEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.distance_penalty_weight),
            vector_search_limit: std::env::var("VECTOR_SEARCH_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.vector_search_limit),
            max_cluster_radius_km: std::env::var("MAX_CLUSTER_RADIUS_KM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_cluster_radius_km),
            min_attractions_per_cluster: std::env::var("MIN_ATTRACTIONS_PER_CLUSTER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_attractions_per_cluster),
            avg_speed_kmh: std::env::var("AVG_SPEED_KMH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.avg_speed_kmh),
            route_concurrency: std::env::var("ROUTE_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.route_concurrency),
            max_inflight_route_calls: std::env::var("MAX_INFLIGHT_ROUTE_CALLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_inflight_route_calls),
            rng_seed: std::env::var("PLANNER_RNG_SEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rng_seed),
        }
    }
}
