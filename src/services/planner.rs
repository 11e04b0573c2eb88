//! Top-level trip planning.
//!
//! Orchestrates the full pipeline: retrieve and rank candidates, resolve
//! coordinates against the gazetteer, build balanced day clusters, solve
//! each cluster's visiting order, rank clusters, and assemble the day-indexed
//! response.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{info, warn};

use crate::config::AppConfig;
use crate::models::attraction::{Attraction, Coordinates};
use crate::models::plan::{
    AttractionInfo, ClusterInfo, DayItinerary, OverallStats, PlanRequest, PlanResponse,
};
use crate::services::clustering::{retain_locatable, Cluster, ClusterConfig, GeoClusterer};
use crate::services::embedding::HashingEmbedder;
use crate::services::gazetteer::Gazetteer;
use crate::services::ranker::PlaceRanker;
use crate::services::retriever::RecommendationService;
use crate::services::route_optimization::RouteOptimizationService;
use crate::services::routing::RouteProvider;
use crate::services::vector_index::{IndexError, QdrantClient};

/// Candidate budget handed to the retriever before clustering.
const RETRIEVAL_TOP_K: usize = 30;

#[derive(Debug)]
pub enum PlanError {
    InvalidRequest(String),
    Index(IndexError),
    NoAttractionsFound,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            PlanError::Index(err) => write!(f, "Retrieval failed: {}", err),
            PlanError::NoAttractionsFound => {
                write!(f, "No attractions found for your preferences")
            }
        }
    }
}

impl Error for PlanError {}

impl From<IndexError> for PlanError {
    fn from(err: IndexError) -> Self {
        PlanError::Index(err)
    }
}

pub struct PlanningService {
    retriever: RecommendationService,
    gazetteer: Arc<Gazetteer>,
    provider: Arc<RouteProvider>,
    optimizer: RouteOptimizationService,
    config: AppConfig,
}

impl PlanningService {
    /// Wire up the pipeline from configuration. The gazetteer is loaded by
    /// the caller because a missing record set must abort startup.
    pub fn from_config(
        config: AppConfig,
        gazetteer: Arc<Gazetteer>,
    ) -> Result<Self, IndexError> {
        let index = QdrantClient::new(
            &config.qdrant_url,
            config.qdrant_api_key.clone(),
            &config.qdrant_collection,
        )?;
        let ranker = PlaceRanker::load_or_init(
            config.ranker_weights_path.as_deref(),
            config.embedding_dim,
            config.ranker_hidden_dim,
            config.rng_seed,
        );
        let retriever = RecommendationService::new(
            Box::new(HashingEmbedder::new(config.embedding_dim)),
            index,
            ranker,
            config.neural_score_weight,
            config.similarity_score_weight,
            config.vector_search_limit,
        );
        let provider = Arc::new(RouteProvider::from_config(
            config.openroute_api_key.clone(),
            config.avg_speed_kmh,
            config.max_inflight_route_calls,
        ));

        Ok(Self::with_components(config, gazetteer, retriever, provider))
    }

    pub fn with_components(
        config: AppConfig,
        gazetteer: Arc<Gazetteer>,
        retriever: RecommendationService,
        provider: Arc<RouteProvider>,
    ) -> Self {
        let optimizer =
            RouteOptimizationService::new(provider.clone(), config.route_concurrency);
        Self {
            retriever,
            gazetteer,
            provider,
            optimizer,
            config,
        }
    }

    /// Produce a complete clustered travel plan for the request.
    pub async fn plan_trip(&self, request: &PlanRequest) -> Result<PlanResponse, PlanError> {
        request.validate().map_err(PlanError::InvalidRequest)?;
        let started = Instant::now();

        let context = request.user_context();
        info!("Planning trip for query '{}'", request.query);

        let candidates = self
            .retriever
            .recommend(&request.query, &context, RETRIEVAL_TOP_K)
            .await?;
        if candidates.is_empty() {
            return Err(PlanError::NoAttractionsFound);
        }
        info!("Retriever returned {} candidates", candidates.len());

        self.plan_from_candidates(request, candidates, started).await
    }

    /// Cluster, order, and assemble already-retrieved candidates. Split out
    /// of `plan_trip` so the geographic stages can run without the index.
    pub async fn plan_from_candidates(
        &self,
        request: &PlanRequest,
        candidates: Vec<Attraction>,
        started: Instant,
    ) -> Result<PlanResponse, PlanError> {
        let located = retain_locatable(
            candidates
                .into_iter()
                .map(|candidate| self.resolve_coordinates(candidate))
                .collect(),
        );
        if located.is_empty() {
            return Err(PlanError::NoAttractionsFound);
        }
        info!("{} candidates carry coordinates", located.len());

        let clusterer = GeoClusterer::new(self.cluster_config(request));

        let coords: Vec<Coordinates> = located
            .iter()
            .filter_map(|attraction| attraction.coordinates())
            .collect();
        let matrix = self
            .provider
            .matrix(&coords, self.config.route_concurrency)
            .await;
        let mut fallback_pairs = matrix.fallback_pairs;
        let mut total_pairs = matrix.total_pairs;

        let mut clusters = clusterer.cluster(&located, &matrix, request.clustering_algorithm);
        for cluster in &mut clusters {
            let tour = self.optimizer.optimize_cluster_route(cluster).await;
            fallback_pairs += tour.fallback_pairs;
            total_pairs += tour.total_pairs;
            cluster.evaluate_balance(clusterer.config());
        }

        let ranked = clusterer.rank_clusters(clusters);
        let selected: Vec<Cluster> = ranked
            .into_iter()
            .take(request.trip_duration_days as usize)
            .collect();

        Ok(self.assemble_response(request, selected, fallback_pairs, total_pairs, started))
    }

    /// Payload coordinates win; otherwise ask the gazetteer. Candidates that
    /// stay unlocated are dropped later, never guessed.
    fn resolve_coordinates(&self, mut attraction: Attraction) -> Attraction {
        if attraction.coordinates().is_some() {
            return attraction;
        }
        match self.gazetteer.resolve(&attraction.name) {
            Some(resolved) => {
                attraction.latitude = Some(resolved.coordinates.lat);
                attraction.longitude = Some(resolved.coordinates.lng);
            }
            None => {
                warn!(
                    "Dropping '{}': not present in the locations record set",
                    attraction.name
                );
            }
        }
        attraction
    }

    fn cluster_config(&self, request: &PlanRequest) -> ClusterConfig {
        ClusterConfig {
            max_cluster_radius_km: self.config.max_cluster_radius_km,
            max_daily_travel_hours: request.daily_travel_preference.max_daily_travel_hours(),
            min_per_cluster: self.config.min_attractions_per_cluster,
            max_per_cluster: request.max_attractions_per_day,
            target_clusters: request.trip_duration_days as usize,
            avg_speed_kmh: self.config.avg_speed_kmh,
            distance_penalty_weight: self.config.distance_penalty_weight,
            seed: self.config.rng_seed,
        }
    }

    fn assemble_response(
        &self,
        request: &PlanRequest,
        selected: Vec<Cluster>,
        fallback_pairs: usize,
        total_pairs: usize,
        started: Instant,
    ) -> PlanResponse {
        let mut daily_itineraries = Vec::with_capacity(selected.len());
        let mut total_attractions = 0;
        let mut total_travel_distance_km = 0.0;
        let mut value_per_hour_sum = 0.0;
        let mut balanced_clusters = 0;

        for (index, cluster) in selected.iter().enumerate() {
            let attractions: Vec<AttractionInfo> = cluster
                .ordered_attractions()
                .into_iter()
                .enumerate()
                .map(|(order, attraction)| AttractionInfo {
                    id: attraction.id.clone(),
                    name: attraction.name.clone(),
                    category: attraction.category.clone(),
                    description: attraction.description.clone(),
                    region: attraction.region.clone(),
                    latitude: attraction.latitude,
                    longitude: attraction.longitude,
                    pear_score: attraction.pear_score,
                    visit_order: order + 1,
                })
                .collect();

            total_attractions += attractions.len();
            total_travel_distance_km += cluster.total_travel_distance_km;
            value_per_hour_sum += cluster.value_per_hour;
            if cluster.is_balanced {
                balanced_clusters += 1;
            }

            daily_itineraries.push(DayItinerary {
                day: index + 1,
                cluster_info: ClusterInfo {
                    cluster_id: cluster.cluster_id,
                    region_name: cluster.region_name.clone(),
                    center_lat: cluster.center.lat,
                    center_lng: cluster.center.lng,
                    size: cluster.len(),
                    total_pear_score: cluster.total_pear_score,
                    estimated_time_hours: cluster.estimated_time_hours,
                    travel_time_minutes: cluster.total_travel_time_minutes,
                    value_per_hour: cluster.value_per_hour,
                    is_balanced: cluster.is_balanced,
                    optimal_visiting_order: cluster.optimal_order.clone(),
                },
                attractions,
                total_travel_distance_km: cluster.total_travel_distance_km,
                estimated_total_time_hours: cluster.estimated_time_hours,
            });
        }

        let day_count = daily_itineraries.len();
        let average_value_per_hour = if day_count > 0 {
            value_per_hour_sum / day_count as f64
        } else {
            0.0
        };

        PlanResponse {
            query: request.query.clone(),
            total_days: day_count,
            total_attractions,
            daily_itineraries,
            overall_stats: OverallStats {
                total_travel_distance_km: round2(total_travel_distance_km),
                average_value_per_hour: round3(average_value_per_hour),
                balanced_clusters,
                travel_optimization: self.routing_source_label(fallback_pairs, total_pairs),
                clustering_algorithm: request.clustering_algorithm.as_str().to_string(),
            },
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            generated_at: Utc::now(),
        }
    }

    fn routing_source_label(&self, fallback_pairs: usize, total_pairs: usize) -> String {
        if !self.provider.is_external() {
            return "Haversine fallback (route provider disabled)".to_string();
        }
        if fallback_pairs == 0 {
            "OpenRouteService driving directions".to_string()
        } else {
            format!(
                "OpenRouteService driving directions ({} of {} legs used haversine fallback)",
                fallback_pairs, total_pairs
            )
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
