//! End-to-end tests of the geographic planning stages.
//!
//! These exercise coordinate resolution, clustering, tour ordering, and
//! response assembly against the haversine route provider, without the
//! vector index.

use std::sync::Arc;
use std::time::Instant;

use explore_lanka_api::config::AppConfig;
use explore_lanka_api::models::attraction::Attraction;
use explore_lanka_api::models::plan::{
    BudgetLevel, ClusteringAlgorithm, PlanRequest, PlanResponse, TravelPreference,
};
use explore_lanka_api::services::embedding::HashingEmbedder;
use explore_lanka_api::services::gazetteer::Gazetteer;
use explore_lanka_api::services::planner::{PlanError, PlanningService};
use explore_lanka_api::services::ranker::{PlaceRanker, RankerWeights};
use explore_lanka_api::services::retriever::RecommendationService;
use explore_lanka_api::services::routing::RouteProvider;
use explore_lanka_api::services::vector_index::QdrantClient;

const DIM: usize = 8;

fn offline_planner() -> PlanningService {
    let config = AppConfig {
        embedding_dim: DIM,
        ranker_hidden_dim: 4,
        ..AppConfig::default()
    };
    let gazetteer =
        Arc::new(Gazetteer::load("data/sri_lanka_locations.json").expect("gazetteer loads"));
    let index = QdrantClient::new("http://localhost:6333", None, "test").expect("client builds");
    let ranker = PlaceRanker::from_weights(RankerWeights::seeded(DIM, 4, 42)).expect("weights");
    let retriever = RecommendationService::new(
        Box::new(HashingEmbedder::new(DIM)),
        index,
        ranker,
        0.7,
        0.3,
        100,
    );
    let provider = Arc::new(RouteProvider::from_config(None, 40.0, 8));
    PlanningService::with_components(config, gazetteer, retriever, provider)
}

fn request(query: &str, days: u32) -> PlanRequest {
    serde_json::from_value(serde_json::json!({
        "query": query,
        "interests": ["culture", "history"],
        "trip_duration_days": days
    }))
    .expect("request deserializes")
}

fn candidate(id: &str, name: &str, lat: Option<f64>, lng: Option<f64>, pear: f64) -> Attraction {
    Attraction {
        id: id.to_string(),
        name: name.to_string(),
        category: "Historical".to_string(),
        description: String::new(),
        region: "Central".to_string(),
        latitude: lat,
        longitude: lng,
        pear_score: pear,
        neural_score: pear,
        similarity_score: pear,
        visit_duration_minutes: 120,
    }
}

async fn plan(
    planner: &PlanningService,
    request: &PlanRequest,
    candidates: Vec<Attraction>,
) -> PlanResponse {
    planner
        .plan_from_candidates(request, candidates, Instant::now())
        .await
        .expect("plan is generated")
}

fn assert_day_orders_are_permutations(response: &PlanResponse) {
    for day in &response.daily_itineraries {
        let mut order = day.cluster_info.optimal_visiting_order.clone();
        order.sort_unstable();
        let expected: Vec<usize> = (0..day.cluster_info.size).collect();
        assert_eq!(order, expected, "day {} order is not a permutation", day.day);
    }
}

#[actix_rt::test]
async fn single_attraction_yields_trivial_plan() {
    let planner = offline_planner();
    let request = request("ancient fortresses", 1);
    let candidates = vec![candidate(
        "sigiriya",
        "Sigiriya Rock Fortress",
        Some(7.9568),
        Some(80.7604),
        0.9,
    )];

    let response = plan(&planner, &request, candidates).await;

    assert_eq!(response.total_days, 1);
    assert_eq!(response.total_attractions, 1);
    let day = &response.daily_itineraries[0];
    assert_eq!(day.cluster_info.size, 1);
    assert_eq!(day.cluster_info.optimal_visiting_order, vec![0]);
    assert_eq!(day.cluster_info.travel_time_minutes, 0.0);
    assert_eq!(day.attractions[0].visit_order, 1);
}

#[actix_rt::test]
async fn two_nearby_sites_share_a_day_with_haversine_metrics() {
    let planner = offline_planner();
    let request = request("cultural triangle", 1);
    let candidates = vec![
        candidate("sigiriya", "Sigiriya Rock Fortress", Some(7.9568), Some(80.7604), 0.9),
        candidate("dambulla", "Dambulla Cave Temple", Some(7.8567), Some(80.6492), 0.85),
    ];

    let response = plan(&planner, &request, candidates).await;

    assert_eq!(response.total_days, 1);
    let day = &response.daily_itineraries[0];
    assert_eq!(day.cluster_info.size, 2);
    assert_eq!(day.cluster_info.optimal_visiting_order, vec![0, 1]);

    // Great-circle distance between the two sites is roughly 16.8 km.
    assert!(
        day.total_travel_distance_km > 16.0 && day.total_travel_distance_km < 17.5,
        "unexpected distance {}",
        day.total_travel_distance_km
    );
    let expected_minutes = day.total_travel_distance_km / 40.0 * 60.0;
    assert!((day.cluster_info.travel_time_minutes - expected_minutes).abs() < 1e-6);

    // Provider is disabled, so the stats must say the numbers are estimates.
    assert!(response
        .overall_stats
        .travel_optimization
        .to_lowercase()
        .contains("fallback"));
}

#[actix_rt::test]
async fn central_province_sites_split_into_two_days() {
    let planner = offline_planner();
    let request = request("temples and heritage", 2);
    let candidates = vec![
        candidate("sigiriya", "Sigiriya Rock Fortress", Some(7.9568), Some(80.7604), 0.9),
        candidate("kandy", "Temple of the Sacred Tooth Relic", Some(7.2936), Some(80.6350), 0.88),
        candidate("dambulla", "Dambulla Cave Temple", Some(7.8567), Some(80.6492), 0.85),
    ];

    let response = plan(&planner, &request, candidates).await;

    assert_eq!(response.total_days, 2);
    assert_day_orders_are_permutations(&response);

    let sigiriya_day = response
        .daily_itineraries
        .iter()
        .find(|day| day.attractions.iter().any(|a| a.id == "sigiriya"))
        .expect("sigiriya is planned");
    assert!(
        sigiriya_day.attractions.iter().any(|a| a.id == "dambulla"),
        "the two nearby sites should share a day"
    );

    for day in &response.daily_itineraries {
        assert_eq!(day.cluster_info.region_name, "Central Province");
    }
}

#[actix_rt::test]
async fn day_clusters_stay_disjoint_and_within_travel_budget() {
    let planner = offline_planner();
    let request = request("the cultural triangle", 3);
    // Ten sites inside the cultural triangle, all within a ~35 km box.
    let names = [
        ("sigiriya", 7.9570, 80.7603, 0.95),
        ("pidurangala", 7.9664, 80.7576, 0.82),
        ("dambulla", 7.8567, 80.6482, 0.9),
        ("minneriya", 8.0344, 80.8394, 0.88),
        ("habarana", 8.0362, 80.7506, 0.7),
        ("kaudulla", 8.0180, 80.8721, 0.72),
        ("ritigala", 8.0300, 80.6600, 0.75),
        ("kandalama", 7.8700, 80.7000, 0.68),
        ("sigiriya-museum", 7.9500, 80.7450, 0.66),
        ("ibbankatuwa", 7.8300, 80.6300, 0.64),
    ];
    let candidates: Vec<Attraction> = names
        .iter()
        .map(|(id, lat, lng, pear)| candidate(id, id, Some(*lat), Some(*lng), *pear))
        .collect();

    let response = plan(&planner, &request, candidates).await;

    assert!((1..=3).contains(&response.total_days));
    assert_day_orders_are_permutations(&response);

    let mut seen: Vec<String> = Vec::new();
    for day in &response.daily_itineraries {
        assert!(day.cluster_info.size >= 1);
        assert!(day.cluster_info.size <= 4 + 2);
        assert!(
            day.cluster_info.travel_time_minutes <= 180.0 + 1e-6,
            "day {} exceeds the balanced travel budget: {}",
            day.day,
            day.cluster_info.travel_time_minutes
        );
        for attraction in &day.attractions {
            assert!(
                !seen.contains(&attraction.id),
                "{} appears in more than one day",
                attraction.id
            );
            seen.push(attraction.id.clone());
        }
    }
    assert!(response.total_attractions >= response.total_days);
}

#[actix_rt::test]
async fn gazetteer_resolves_names_and_drops_unknowns() {
    let planner = offline_planner();
    let request = request("heritage", 2);
    let candidates = vec![
        candidate("sigiriya", "Sigiriya Rock Fortress", None, None, 0.9),
        candidate("dambulla", "Dambulla Cave Temple", None, None, 0.85),
        candidate("atlantis", "Sunken Palace of Atlantis", None, None, 0.99),
    ];

    let response = plan(&planner, &request, candidates).await;

    assert_eq!(response.total_attractions, 2);
    let planned: Vec<&str> = response
        .daily_itineraries
        .iter()
        .flat_map(|day| day.attractions.iter().map(|a| a.id.as_str()))
        .collect();
    assert!(planned.contains(&"sigiriya"));
    assert!(planned.contains(&"dambulla"));
    assert!(!planned.contains(&"atlantis"));
}

#[actix_rt::test]
async fn all_unlocatable_candidates_fail_the_request() {
    let planner = offline_planner();
    let request = request("mystery tour", 1);
    let candidates = vec![candidate("nowhere", "Nowhere Shrine", None, None, 0.9)];

    let error = planner
        .plan_from_candidates(&request, candidates, Instant::now())
        .await
        .expect_err("no locatable candidates");
    assert!(matches!(error, PlanError::NoAttractionsFound));
}

#[actix_rt::test]
async fn clustering_algorithms_all_produce_valid_plans() {
    let planner = offline_planner();
    let candidates = || {
        vec![
            candidate("sigiriya", "Sigiriya Rock Fortress", Some(7.9568), Some(80.7604), 0.9),
            candidate("dambulla", "Dambulla Cave Temple", Some(7.8567), Some(80.6492), 0.85),
            candidate("kandy", "Temple of the Sacred Tooth Relic", Some(7.2936), Some(80.6350), 0.88),
            candidate("galle", "Galle Fort", Some(6.0267), Some(80.2170), 0.8),
        ]
    };

    for algorithm in ["smart", "k_means", "dbscan"] {
        let request: PlanRequest = serde_json::from_value(serde_json::json!({
            "query": "island highlights",
            "interests": ["culture"],
            "trip_duration_days": 3,
            "clustering_algorithm": algorithm
        }))
        .expect("request deserializes");

        let response = plan(&planner, &request, candidates()).await;
        assert!(response.total_days >= 1);
        assert!(response.total_attractions >= 1);
        assert_day_orders_are_permutations(&response);
        assert_eq!(
            response.overall_stats.clustering_algorithm,
            match algorithm {
                "smart" => "smart_clustering",
                "k_means" => "kmeans",
                _ => "dbscan",
            }
        );
    }
}

#[actix_rt::test]
async fn invalid_requests_are_rejected_before_retrieval() {
    let planner = offline_planner();
    let mut request = request("temples", 0);
    let error = planner.plan_trip(&request).await.expect_err("rejected");
    assert!(matches!(error, PlanError::InvalidRequest(_)));

    request = PlanRequest {
        query: String::new(),
        interests: vec![],
        trip_duration_days: 3,
        daily_travel_preference: TravelPreference::Balanced,
        max_attractions_per_day: 4,
        budget_level: BudgetLevel::Medium,
        group_size: 2,
        clustering_algorithm: ClusteringAlgorithm::Smart,
    };
    let error = planner.plan_trip(&request).await.expect_err("rejected");
    assert!(matches!(error, PlanError::InvalidRequest(_)));
}
