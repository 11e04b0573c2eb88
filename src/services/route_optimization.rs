//! Intra-cluster visiting order.
//!
//! Solves the open tour through one day cluster with a greedy
//! nearest-neighbor heuristic starting from the first member, then replaces
//! the cluster's estimated travel metrics with the exact hop distances and
//! durations along the tour.

use std::sync::Arc;

use crate::services::clustering::Cluster;
use crate::services::routing::{DistanceMatrix, RouteProvider};

/// Outcome of ordering one cluster, for routing-source accounting.
#[derive(Debug, Clone, Copy, Default)]
pub struct TourStats {
    pub fallback_pairs: usize,
    pub total_pairs: usize,
}

pub struct RouteOptimizationService {
    provider: Arc<RouteProvider>,
    matrix_concurrency: usize,
}

impl RouteOptimizationService {
    pub fn new(provider: Arc<RouteProvider>, matrix_concurrency: usize) -> Self {
        Self {
            provider,
            matrix_concurrency,
        }
    }

    /// Compute the cluster's distance matrix, solve the visiting order, and
    /// write the tour metrics back into the cluster.
    pub async fn optimize_cluster_route(&self, cluster: &mut Cluster) -> TourStats {
        let coords: Vec<_> = cluster
            .attractions
            .iter()
            .filter_map(|attraction| attraction.coordinates())
            .collect();

        // Members are coordinate-complete by the time they reach a cluster.
        if coords.len() <= 1 {
            cluster.apply_tour((0..cluster.len()).collect(), 0.0, 0.0);
            return TourStats::default();
        }

        let matrix = self.provider.matrix(&coords, self.matrix_concurrency).await;
        let order = if coords.len() == 2 {
            vec![0, 1]
        } else {
            nearest_neighbor_tour(&matrix.distances_km)
        };

        let (distance_km, duration_minutes) = tour_cost(&order, &matrix);
        cluster.apply_tour(order, distance_km, duration_minutes);

        TourStats {
            fallback_pairs: matrix.fallback_pairs,
            total_pairs: matrix.total_pairs,
        }
    }
}

/// Greedy open tour from index 0. Ties go to the lowest index.
pub fn nearest_neighbor_tour(distances: &[Vec<f64>]) -> Vec<usize> {
    let n = distances.len();
    if n == 0 {
        return Vec::new();
    }

    let mut tour = Vec::with_capacity(n);
    let mut unvisited: Vec<bool> = vec![true; n];
    let mut current = 0;
    tour.push(current);
    unvisited[current] = false;

    while tour.len() < n {
        let mut next = None;
        let mut best_distance = f64::INFINITY;
        for (candidate, open) in unvisited.iter().enumerate() {
            if *open && distances[current][candidate] < best_distance {
                best_distance = distances[current][candidate];
                next = Some(candidate);
            }
        }
        let Some(next) = next else {
            break;
        };
        tour.push(next);
        unvisited[next] = false;
        current = next;
    }

    tour
}

/// Sum of consecutive-hop distance and duration along a tour.
pub fn tour_cost(order: &[usize], matrix: &DistanceMatrix) -> (f64, f64) {
    let mut distance_km = 0.0;
    let mut duration_minutes = 0.0;
    for hop in order.windows(2) {
        distance_km += matrix.distances_km[hop[0]][hop[1]];
        duration_minutes += matrix.durations_minutes[hop[0]][hop[1]];
    }
    (distance_km, duration_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_from(distances: Vec<Vec<f64>>) -> DistanceMatrix {
        let n = distances.len();
        let durations = distances
            .iter()
            .map(|row| row.iter().map(|km| km / 40.0 * 60.0).collect())
            .collect();
        DistanceMatrix {
            distances_km: distances,
            durations_minutes: durations,
            fallback_pairs: n * (n - 1) / 2,
            total_pairs: n * (n - 1) / 2,
        }
    }

    #[test]
    fn tour_is_a_permutation() {
        let matrix = matrix_from(vec![
            vec![0.0, 12.0, 3.0, 7.0],
            vec![12.0, 0.0, 9.0, 2.0],
            vec![3.0, 9.0, 0.0, 5.0],
            vec![7.0, 2.0, 5.0, 0.0],
        ]);
        let mut tour = nearest_neighbor_tour(&matrix.distances_km);
        tour.sort_unstable();
        assert_eq!(tour, vec![0, 1, 2, 3]);
    }

    #[test]
    fn first_hop_is_the_closest_neighbor() {
        let distances = vec![
            vec![0.0, 12.0, 3.0, 7.0],
            vec![12.0, 0.0, 9.0, 2.0],
            vec![3.0, 9.0, 0.0, 5.0],
            vec![7.0, 2.0, 5.0, 0.0],
        ];
        let tour = nearest_neighbor_tour(&distances);
        assert_eq!(tour[0], 0);

        let closest = (1..distances.len())
            .min_by(|&a, &b| distances[0][a].partial_cmp(&distances[0][b]).unwrap())
            .unwrap();
        assert_eq!(tour[1], closest);
    }

    #[test]
    fn ties_resolve_to_the_lowest_index() {
        let distances = vec![
            vec![0.0, 5.0, 5.0],
            vec![5.0, 0.0, 1.0],
            vec![5.0, 1.0, 0.0],
        ];
        let tour = nearest_neighbor_tour(&distances);
        assert_eq!(tour, vec![0, 1, 2]);
    }

    #[test]
    fn tour_cost_sums_consecutive_hops() {
        let matrix = matrix_from(vec![
            vec![0.0, 10.0, 20.0],
            vec![10.0, 0.0, 4.0],
            vec![20.0, 4.0, 0.0],
        ]);
        let (distance, duration) = tour_cost(&[0, 1, 2], &matrix);
        assert!((distance - 14.0).abs() < 1e-12);
        assert!((duration - 14.0 / 40.0 * 60.0).abs() < 1e-9);
    }

    #[test]
    fn single_point_tour_is_trivial() {
        let tour = nearest_neighbor_tour(&[vec![0.0]]);
        assert_eq!(tour, vec![0]);
        let empty: Vec<Vec<f64>> = Vec::new();
        assert!(nearest_neighbor_tour(&empty).is_empty());
    }
}
