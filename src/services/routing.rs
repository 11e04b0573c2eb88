//! Driving distance and duration between attractions.
//!
//! When an OpenRouteService token is configured, point-to-point legs come
//! from its driving-car directions endpoint. Every failure mode (missing
//! credentials, transport error, non-OK status, parse error, deadline)
//! degrades to a haversine estimate for that leg, logged at warn, so route
//! lookups never fail a request. Each leg reports whether the fallback
//! produced it; the planner surfaces that in the response stats.
//!
//! Distance matrices are assembled from pairwise legs. The upper triangle
//! is computed concurrently with a bounded in-flight cap and mirrored, so
//! the matrix is symmetric with a zero diagonal regardless of completion
//! order. A process-wide semaphore keeps the total number of in-flight
//! external calls within the provider's rate budget.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::models::attraction::Coordinates;

const EARTH_RADIUS_KM: f64 = 6371.0;
const ORS_BASE_URL: &str = "https://api.openrouteservice.org";

/// Great-circle distance in kilometers.
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlat = (to.lat - from.lat).to_radians();
    let dlng = (to.lng - from.lng).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Distance and driving time for one leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub distance_km: f64,
    pub duration_minutes: f64,
}

/// A computed leg plus its provenance.
#[derive(Debug, Clone, Copy)]
pub struct RoutedLeg {
    pub info: RouteInfo,
    pub used_fallback: bool,
}

/// Pairwise driving metrics over a set of coordinates.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    pub distances_km: Vec<Vec<f64>>,
    pub durations_minutes: Vec<Vec<f64>>,
    /// Pairs that were estimated with haversine instead of real routing.
    pub fallback_pairs: usize,
    pub total_pairs: usize,
}

impl DistanceMatrix {
    fn zeroed(n: usize) -> Self {
        Self {
            distances_km: vec![vec![0.0; n]; n],
            durations_minutes: vec![vec![0.0; n]; n],
            fallback_pairs: 0,
            total_pairs: 0,
        }
    }

    fn set_pair(&mut self, i: usize, j: usize, leg: &RoutedLeg) {
        self.distances_km[i][j] = leg.info.distance_km;
        self.distances_km[j][i] = leg.info.distance_km;
        self.durations_minutes[i][j] = leg.info.duration_minutes;
        self.durations_minutes[j][i] = leg.info.duration_minutes;
        self.total_pairs += 1;
        if leg.used_fallback {
            self.fallback_pairs += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.distances_km.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances_km.is_empty()
    }
}

/// Haversine-only leg estimation at a fixed average speed.
#[derive(Debug, Clone)]
pub struct FallbackRouter {
    pub avg_speed_kmh: f64,
}

impl FallbackRouter {
    pub fn route(&self, from: Coordinates, to: Coordinates) -> RouteInfo {
        let distance_km = haversine_km(from, to);
        RouteInfo {
            distance_km,
            duration_minutes: distance_km / self.avg_speed_kmh * 60.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    summary: RouteSummary,
}

#[derive(Debug, Deserialize)]
struct RouteSummary {
    /// Meters.
    #[serde(default)]
    distance: f64,
    /// Seconds.
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Serialize)]
struct DirectionsRequest {
    coordinates: [[f64; 2]; 2],
}

/// OpenRouteService driving-car adapter.
pub struct ExternalRouter {
    client: Client,
    api_key: String,
    base_url: String,
    inflight: Arc<Semaphore>,
    fallback: FallbackRouter,
}

impl ExternalRouter {
    fn new(api_key: String, avg_speed_kmh: f64, max_inflight: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            base_url: ORS_BASE_URL.to_string(),
            inflight: Arc::new(Semaphore::new(max_inflight.max(1))),
            fallback: FallbackRouter { avg_speed_kmh },
        }
    }

    async fn route(&self, from: Coordinates, to: Coordinates) -> RoutedLeg {
        match self.fetch_directions(from, to).await {
            Ok(info) => RoutedLeg {
                info,
                used_fallback: false,
            },
            Err(reason) => {
                warn!(
                    "Route lookup ({:.4},{:.4}) -> ({:.4},{:.4}) fell back to haversine: {}",
                    from.lat, from.lng, to.lat, to.lng, reason
                );
                RoutedLeg {
                    info: self.fallback.route(from, to),
                    used_fallback: true,
                }
            }
        }
    }

    async fn fetch_directions(
        &self,
        from: Coordinates,
        to: Coordinates,
    ) -> Result<RouteInfo, String> {
        let _permit = self
            .inflight
            .acquire()
            .await
            .map_err(|_| "route call limiter closed".to_string())?;

        let url = format!("{}/v2/directions/driving-car", self.base_url);
        // ORS expects [lng, lat] order.
        let request = DirectionsRequest {
            coordinates: [[from.lng, from.lat], [to.lng, to.lat]],
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.api_key.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("status {}: {}", status, body));
        }

        let parsed: DirectionsResponse = response.json().await.map_err(|e| e.to_string())?;
        let summary = parsed
            .routes
            .first()
            .map(|route| &route.summary)
            .ok_or_else(|| "no routes in response".to_string())?;

        Ok(RouteInfo {
            distance_km: summary.distance / 1000.0,
            duration_minutes: summary.duration / 60.0,
        })
    }
}

/// Route source selected at startup.
///
/// Both variants expose the same `route`/`matrix` interface; callers never
/// branch on which one is active.
pub enum RouteProvider {
    External(ExternalRouter),
    Fallback(FallbackRouter),
}

impl RouteProvider {
    /// Build from configuration. No token means haversine-only routing.
    pub fn from_config(
        api_key: Option<String>,
        avg_speed_kmh: f64,
        max_inflight: usize,
    ) -> Self {
        match api_key {
            Some(key) if !key.is_empty() => {
                RouteProvider::External(ExternalRouter::new(key, avg_speed_kmh, max_inflight))
            }
            _ => {
                warn!("No route provider token configured; using haversine estimates");
                RouteProvider::Fallback(FallbackRouter { avg_speed_kmh })
            }
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, RouteProvider::External(_))
    }

    pub async fn route(&self, from: Coordinates, to: Coordinates) -> RoutedLeg {
        match self {
            RouteProvider::External(router) => router.route(from, to).await,
            RouteProvider::Fallback(router) => RoutedLeg {
                info: router.route(from, to),
                used_fallback: true,
            },
        }
    }

    /// Full pairwise matrix. Upper-triangle legs are fetched concurrently
    /// with at most `concurrency` in flight for this request; results are
    /// joined by pair index, so the matrix does not depend on completion
    /// order.
    pub async fn matrix(&self, coords: &[Coordinates], concurrency: usize) -> DistanceMatrix {
        let n = coords.len();
        let mut matrix = DistanceMatrix::zeroed(n);
        if n < 2 {
            return matrix;
        }

        match self {
            RouteProvider::Fallback(router) => {
                for i in 0..n {
                    for j in (i + 1)..n {
                        let leg = RoutedLeg {
                            info: router.route(coords[i], coords[j]),
                            used_fallback: true,
                        };
                        matrix.set_pair(i, j, &leg);
                    }
                }
            }
            RouteProvider::External(router) => {
                let pairs: Vec<(usize, usize)> = (0..n)
                    .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
                    .collect();

                let mut legs = stream::iter(pairs.into_iter().map(|(i, j)| {
                    let from = coords[i];
                    let to = coords[j];
                    async move { (i, j, router.route(from, to).await) }
                }))
                .buffer_unordered(concurrency.max(1));

                while let Some((i, j, leg)) = legs.next().await {
                    matrix.set_pair(i, j, &leg);
                }
            }
        }

        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGIRIYA: Coordinates = Coordinates {
        lat: 7.9568,
        lng: 80.7604,
    };
    const DAMBULLA: Coordinates = Coordinates {
        lat: 7.8567,
        lng: 80.6492,
    };

    #[test]
    fn haversine_of_same_point_is_zero() {
        assert!(haversine_km(SIGIRIYA, SIGIRIYA) < 1e-9);
    }

    #[test]
    fn haversine_matches_known_distance() {
        let distance = haversine_km(SIGIRIYA, DAMBULLA);
        assert!(
            distance > 16.0 && distance < 17.5,
            "Sigiriya to Dambulla should be ~16.8km, got {}",
            distance
        );
    }

    #[test]
    fn haversine_is_symmetric() {
        let forward = haversine_km(SIGIRIYA, DAMBULLA);
        let backward = haversine_km(DAMBULLA, SIGIRIYA);
        assert!((forward - backward).abs() < 1e-12);
    }

    #[test]
    fn fallback_duration_uses_average_speed() {
        let router = FallbackRouter { avg_speed_kmh: 40.0 };
        let info = router.route(SIGIRIYA, DAMBULLA);
        let expected_minutes = info.distance_km / 40.0 * 60.0;
        assert!((info.duration_minutes - expected_minutes).abs() < 1e-9);
    }

    #[actix_rt::test]
    async fn disabled_provider_matches_haversine_exactly() {
        let provider = RouteProvider::from_config(None, 40.0, 8);
        let leg = provider.route(SIGIRIYA, DAMBULLA).await;
        assert!(leg.used_fallback);
        assert!((leg.info.distance_km - haversine_km(SIGIRIYA, DAMBULLA)).abs() < 1e-9);
        assert!(
            (leg.info.duration_minutes - leg.info.distance_km / 40.0 * 60.0).abs() < 1e-9
        );
    }

    #[actix_rt::test]
    async fn matrix_is_symmetric_with_zero_diagonal() {
        let provider = RouteProvider::from_config(None, 40.0, 8);
        let coords = vec![
            SIGIRIYA,
            DAMBULLA,
            Coordinates::new(7.2936, 80.6350),
        ];
        let matrix = provider.matrix(&coords, 8).await;

        for i in 0..coords.len() {
            assert_eq!(matrix.distances_km[i][i], 0.0);
            for j in 0..coords.len() {
                assert!(
                    (matrix.distances_km[i][j] - matrix.distances_km[j][i]).abs() < 1e-12
                );
            }
        }
        assert_eq!(matrix.total_pairs, 3);
        assert_eq!(matrix.fallback_pairs, 3);
    }

    #[actix_rt::test]
    async fn matrix_of_one_point_is_empty_of_pairs() {
        let provider = RouteProvider::from_config(None, 40.0, 8);
        let matrix = provider.matrix(&[SIGIRIYA], 8).await;
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.total_pairs, 0);
    }

    #[test]
    fn blank_token_falls_back() {
        let provider = RouteProvider::from_config(Some(String::new()), 40.0, 8);
        assert!(!provider.is_external());
    }
}
