//! Balanced geographic day clustering.
//!
//! Partitions ranked, coordinate-complete attractions into day-sized
//! clusters. Three strategies share one entry point: smart clustering
//! (score-weighted similarity + k-means, the default), plain k-means over
//! the driving-distance matrix, and a density scan with the cluster radius
//! as the neighborhood bound. A balancing pass then splits oversized
//! clusters, redistributes members of geographically stretched ones, and
//! tags each cluster with a balance flag and a region name.
//!
//! All randomness is seeded, so identical inputs produce identical
//! partitions.

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::models::attraction::{Attraction, Coordinates};
use crate::models::plan::ClusteringAlgorithm;
use crate::services::routing::{haversine_km, DistanceMatrix};

/// Balance-flag thresholds. Looser than the split thresholds on purpose:
/// splits are aggressive, the label tolerates slightly larger day plans.
const BALANCED_MAX_SPREAD_KM: f64 = 50.0;
const BALANCED_MAX_HOURS: f64 = 14.0;
const BALANCED_MIN_VALUE_PER_HOUR: f64 = 0.1;
const BALANCED_SIZE_SLACK: usize = 2;

/// Weight of a cluster's value density when attaching orphans.
const ORPHAN_VALUE_WEIGHT: f64 = 0.3;

const KMEANS_MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub max_cluster_radius_km: f64,
    pub max_daily_travel_hours: f64,
    pub min_per_cluster: usize,
    pub max_per_cluster: usize,
    pub target_clusters: usize,
    pub avg_speed_kmh: f64,
    /// Coefficient of the normalized-distance penalty in the smart
    /// similarity matrix.
    pub distance_penalty_weight: f64,
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_cluster_radius_km: 40.0,
            max_daily_travel_hours: 3.0,
            min_per_cluster: 2,
            max_per_cluster: 4,
            target_clusters: 3,
            avg_speed_kmh: 40.0,
            distance_penalty_weight: 0.7,
            seed: 42,
        }
    }
}

/// One day-sized group of attractions with derived metrics.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub cluster_id: usize,
    pub attractions: Vec<Attraction>,
    pub center: Coordinates,
    pub total_pear_score: f64,
    pub max_pairwise_distance_km: f64,
    /// Driving distance along the solved tour.
    pub total_travel_distance_km: f64,
    pub total_travel_time_minutes: f64,
    pub estimated_time_hours: f64,
    pub value_per_hour: f64,
    pub is_balanced: bool,
    /// Permutation of member indices in visiting order.
    pub optimal_order: Vec<usize>,
    pub region_name: String,
}

impl Cluster {
    fn new(cluster_id: usize, attractions: Vec<Attraction>, config: &ClusterConfig) -> Self {
        let mut cluster = Self {
            cluster_id,
            optimal_order: (0..attractions.len()).collect(),
            attractions,
            center: Coordinates::new(0.0, 0.0),
            total_pear_score: 0.0,
            max_pairwise_distance_km: 0.0,
            total_travel_distance_km: 0.0,
            total_travel_time_minutes: 0.0,
            estimated_time_hours: 0.0,
            value_per_hour: 0.0,
            is_balanced: false,
            region_name: String::new(),
        };
        cluster.recompute(config);
        cluster
    }

    pub fn len(&self) -> usize {
        self.attractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attractions.is_empty()
    }

    fn push_attraction(&mut self, attraction: Attraction, config: &ClusterConfig) {
        self.attractions.push(attraction);
        self.optimal_order = (0..self.attractions.len()).collect();
        self.recompute(config);
    }

    /// Recompute center and derived metrics. Travel time uses a haversine
    /// estimate until the tour solver replaces it with hop durations.
    fn recompute(&mut self, config: &ClusterConfig) {
        let n = self.attractions.len();
        if n == 0 {
            return;
        }

        let mut lat_sum = 0.0;
        let mut lng_sum = 0.0;
        for attraction in &self.attractions {
            lat_sum += attraction.latitude.unwrap_or(0.0);
            lng_sum += attraction.longitude.unwrap_or(0.0);
        }
        self.center = Coordinates::new(lat_sum / n as f64, lng_sum / n as f64);
        self.region_name = region_name_for(self.center.lat, self.center.lng).to_string();

        self.total_pear_score = self.attractions.iter().map(|a| a.pear_score).sum();
        self.max_pairwise_distance_km = self.max_pairwise_distance();

        let travel_estimate = if n > 1 {
            self.max_pairwise_distance_km / config.avg_speed_kmh * 60.0 * (n - 1) as f64
        } else {
            0.0
        };
        self.total_travel_time_minutes = travel_estimate;
        self.refresh_time_metrics();
    }

    fn max_pairwise_distance(&self) -> f64 {
        let mut max_distance: f64 = 0.0;
        for (i, a) in self.attractions.iter().enumerate() {
            for b in self.attractions.iter().skip(i + 1) {
                if let (Some(from), Some(to)) = (a.coordinates(), b.coordinates()) {
                    max_distance = max_distance.max(haversine_km(from, to));
                }
            }
        }
        max_distance
    }

    fn refresh_time_metrics(&mut self) {
        let visit_minutes: f64 = self
            .attractions
            .iter()
            .map(|a| a.visit_duration_minutes as f64)
            .sum();
        self.estimated_time_hours = (visit_minutes + self.total_travel_time_minutes) / 60.0;
        self.value_per_hour = self.total_pear_score / self.estimated_time_hours.max(0.1);
    }

    /// Install the solved visiting order and its exact travel metrics,
    /// then refresh the time-derived fields.
    pub fn apply_tour(&mut self, order: Vec<usize>, distance_km: f64, travel_minutes: f64) {
        self.optimal_order = order;
        self.total_travel_distance_km = distance_km;
        self.total_travel_time_minutes = travel_minutes;
        self.refresh_time_metrics();
    }

    /// Evaluate the balance flag against the fixed day-plan bounds.
    pub fn evaluate_balance(&mut self, config: &ClusterConfig) {
        let size_ok = self.len() >= config.min_per_cluster
            && self.len() <= config.max_per_cluster + BALANCED_SIZE_SLACK;
        self.is_balanced = self.max_pairwise_distance_km <= BALANCED_MAX_SPREAD_KM
            && self.estimated_time_hours <= BALANCED_MAX_HOURS
            && size_ok
            && self.value_per_hour > BALANCED_MIN_VALUE_PER_HOUR;
    }

    /// Members in solved visiting order.
    pub fn ordered_attractions(&self) -> Vec<&Attraction> {
        self.optimal_order
            .iter()
            .filter_map(|&index| self.attractions.get(index))
            .collect()
    }
}

/// Drop candidates that cannot be placed on the map. Distance matrices and
/// cluster labels are index-aligned with the surviving list.
pub fn retain_locatable(attractions: Vec<Attraction>) -> Vec<Attraction> {
    attractions
        .into_iter()
        .filter(|attraction| attraction.coordinates().is_some())
        .collect()
}

pub struct GeoClusterer {
    config: ClusterConfig,
}

impl GeoClusterer {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Partition attractions into balanced day clusters.
    ///
    /// `attractions` must be coordinate-complete (see [`retain_locatable`])
    /// and `matrix` index-aligned with it.
    pub fn cluster(
        &self,
        attractions: &[Attraction],
        matrix: &DistanceMatrix,
        algorithm: ClusteringAlgorithm,
    ) -> Vec<Cluster> {
        if attractions.is_empty() {
            return Vec::new();
        }

        // Too few for balancing: one short cluster is allowed.
        if attractions.len() < self.config.min_per_cluster {
            return vec![Cluster::new(0, attractions.to_vec(), &self.config)];
        }

        let labels = match algorithm {
            ClusteringAlgorithm::Smart => self.smart_labels(attractions, matrix),
            ClusteringAlgorithm::KMeans => self.kmeans_labels(matrix),
            ClusteringAlgorithm::Dbscan => self.dbscan_labels(attractions, matrix),
        };

        let clusters = self.collect_clusters(attractions, &labels);
        let balanced = self.balance(clusters);

        info!(
            "{} produced {} clusters from {} attractions",
            algorithm.as_str(),
            balanced.len(),
            attractions.len()
        );
        balanced
    }

    /// Order clusters for day assignment, best first.
    pub fn rank_clusters(&self, mut clusters: Vec<Cluster>) -> Vec<Cluster> {
        let config = &self.config;
        clusters.sort_by(|a, b| {
            let score_a = day_assignment_score(a, config);
            let score_b = day_assignment_score(b, config);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        clusters
    }

    /// Score-weighted similarity labels: candidates with close PEAR scores
    /// and short driving legs land together.
    fn smart_labels(&self, attractions: &[Attraction], matrix: &DistanceMatrix) -> Vec<usize> {
        let n = attractions.len();
        let max_distance = matrix
            .distances_km
            .iter()
            .flat_map(|row| row.iter().copied())
            .fold(0.0f64, f64::max)
            .max(f64::EPSILON);

        let mut pseudo_distance = vec![vec![0.0f64; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let score_similarity =
                    1.0 - (attractions[i].pear_score - attractions[j].pear_score).abs();
                let normalized_distance = matrix.distances_km[i][j] / max_distance;
                let similarity = score_similarity
                    - self.config.distance_penalty_weight * normalized_distance;
                pseudo_distance[i][j] = 1.0 - similarity;
            }
        }

        kmeans(&pseudo_distance, self.cluster_count(n), self.config.seed)
    }

    fn kmeans_labels(&self, matrix: &DistanceMatrix) -> Vec<usize> {
        let n = matrix.len();
        kmeans(&matrix.distances_km, self.cluster_count(n), self.config.seed)
    }

    fn cluster_count(&self, n: usize) -> usize {
        let by_size = n / self.config.min_per_cluster.max(1);
        self.config.target_clusters.min(by_size).max(1)
    }

    /// Density scan over the driving-distance matrix. Noise points attach
    /// to the nearest feasible cluster or become singletons.
    fn dbscan_labels(&self, attractions: &[Attraction], matrix: &DistanceMatrix) -> Vec<usize> {
        let n = attractions.len();
        let eps = self.config.max_cluster_radius_km;
        let min_pts = self.config.min_per_cluster;

        let neighbors_of = |index: usize| -> Vec<usize> {
            (0..n)
                .filter(|&other| matrix.distances_km[index][other] <= eps)
                .collect()
        };

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut next_label = 0;

        for point in 0..n {
            if visited[point] {
                continue;
            }
            visited[point] = true;

            let seed_neighbors = neighbors_of(point);
            if seed_neighbors.len() < min_pts {
                continue; // noise for now
            }

            let label = next_label;
            next_label += 1;
            labels[point] = Some(label);

            let mut frontier = seed_neighbors;
            while let Some(neighbor) = frontier.pop() {
                if labels[neighbor].is_none() {
                    labels[neighbor] = Some(label);
                }
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    let expansion = neighbors_of(neighbor);
                    if expansion.len() >= min_pts {
                        frontier.extend(expansion);
                    }
                }
            }
        }

        self.attach_noise(attractions, labels, next_label)
    }

    fn attach_noise(
        &self,
        attractions: &[Attraction],
        labels: Vec<Option<usize>>,
        mut next_label: usize,
    ) -> Vec<usize> {
        let mut resolved: Vec<usize> = vec![usize::MAX; labels.len()];
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); next_label];

        for (index, label) in labels.iter().enumerate() {
            if let Some(label) = label {
                resolved[index] = *label;
                members[*label].push(index);
            }
        }

        for index in 0..labels.len() {
            if labels[index].is_some() {
                continue;
            }

            let mut best: Option<(usize, f64)> = None;
            for (label, cluster_members) in members.iter().enumerate() {
                if cluster_members.is_empty()
                    || cluster_members.len() >= self.config.max_per_cluster
                {
                    continue;
                }
                let distance = cluster_center_distance(attractions, cluster_members, index);
                if distance <= self.config.max_cluster_radius_km {
                    match best {
                        Some((_, best_distance)) if distance >= best_distance => {}
                        _ => best = Some((label, distance)),
                    }
                }
            }

            match best {
                Some((label, _)) => {
                    resolved[index] = label;
                    members[label].push(index);
                }
                None => {
                    resolved[index] = next_label;
                    members.push(vec![index]);
                    next_label += 1;
                }
            }
        }

        resolved
    }

    fn collect_clusters(&self, attractions: &[Attraction], labels: &[usize]) -> Vec<Cluster> {
        let mut label_values: Vec<usize> = labels.to_vec();
        label_values.sort_unstable();
        label_values.dedup();

        label_values
            .into_iter()
            .enumerate()
            .map(|(cluster_id, label)| {
                let members: Vec<Attraction> = labels
                    .iter()
                    .enumerate()
                    .filter(|(_, &l)| l == label)
                    .map(|(index, _)| attractions[index].clone())
                    .collect();
                Cluster::new(cluster_id, members, &self.config)
            })
            .collect()
    }

    /// Split oversized clusters, dissolve stretched ones, re-home their
    /// members, then refresh ids and balance flags.
    fn balance(&self, clusters: Vec<Cluster>) -> Vec<Cluster> {
        let config = &self.config;
        let max_daily_minutes = config.max_daily_travel_hours * 60.0;

        let mut kept: Vec<Cluster> = Vec::new();
        let mut orphans: Vec<Attraction> = Vec::new();

        for cluster in clusters {
            if cluster.len() > config.max_per_cluster {
                kept.extend(self.split_round_robin(cluster));
            } else if cluster.max_pairwise_distance_km > config.max_cluster_radius_km
                || cluster.total_travel_time_minutes > max_daily_minutes
            {
                orphans.extend(cluster.attractions);
            } else {
                kept.push(cluster);
            }
        }

        for orphan in orphans {
            match self.best_home(&orphan, &kept) {
                Some(index) => kept[index].push_attraction(orphan, config),
                None => kept.push(Cluster::new(kept.len(), vec![orphan], config)),
            }
        }

        for (cluster_id, cluster) in kept.iter_mut().enumerate() {
            cluster.cluster_id = cluster_id;
            cluster.evaluate_balance(config);
        }
        kept
    }

    /// Distribute members round-robin by descending PEAR score so the
    /// per-day value stays roughly even.
    fn split_round_robin(&self, cluster: Cluster) -> Vec<Cluster> {
        let config = &self.config;
        let mut members = cluster.attractions;
        members.sort_by(|a, b| {
            b.pear_score
                .partial_cmp(&a.pear_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let parts = members.len().div_ceil(config.max_per_cluster);
        let mut buckets: Vec<Vec<Attraction>> = vec![Vec::new(); parts];
        for (index, member) in members.into_iter().enumerate() {
            buckets[index % parts].push(member);
        }

        buckets
            .into_iter()
            .enumerate()
            .map(|(cluster_id, bucket)| Cluster::new(cluster_id, bucket, config))
            .collect()
    }

    /// Best admissible cluster for an orphan: closest center wins, with a
    /// bonus for value-dense clusters.
    fn best_home(&self, orphan: &Attraction, clusters: &[Cluster]) -> Option<usize> {
        let coordinates = orphan.coordinates()?;
        let mut best: Option<(usize, f64)> = None;

        for (index, cluster) in clusters.iter().enumerate() {
            if !self.can_admit(orphan, cluster) {
                continue;
            }
            let distance = haversine_km(coordinates, cluster.center);
            let attachment =
                1.0 / (1.0 + distance) + ORPHAN_VALUE_WEIGHT * cluster.value_per_hour;
            match best {
                Some((_, best_attachment)) if attachment <= best_attachment => {}
                _ => best = Some((index, attachment)),
            }
        }

        best.map(|(index, _)| index)
    }

    /// Feasibility predicate for adding one attraction to a cluster.
    pub fn can_admit(&self, attraction: &Attraction, cluster: &Cluster) -> bool {
        let coordinates = match attraction.coordinates() {
            Some(coordinates) => coordinates,
            None => return false,
        };
        if cluster.len() >= self.config.max_per_cluster {
            return false;
        }
        if haversine_km(coordinates, cluster.center) > self.config.max_cluster_radius_km {
            return false;
        }
        cluster.attractions.iter().all(|member| {
            member
                .coordinates()
                .map(|other| haversine_km(coordinates, other) <= self.config.max_cluster_radius_km)
                .unwrap_or(false)
        })
    }
}

fn cluster_center_distance(
    attractions: &[Attraction],
    member_indices: &[usize],
    point: usize,
) -> f64 {
    let n = member_indices.len() as f64;
    let mut lat = 0.0;
    let mut lng = 0.0;
    for &index in member_indices {
        lat += attractions[index].latitude.unwrap_or(0.0);
        lng += attractions[index].longitude.unwrap_or(0.0);
    }
    let center = Coordinates::new(lat / n, lng / n);
    match attractions[point].coordinates() {
        Some(coordinates) => haversine_km(coordinates, center),
        None => f64::INFINITY,
    }
}

fn day_assignment_score(cluster: &Cluster, config: &ClusterConfig) -> f64 {
    let mut score = cluster.value_per_hour;
    if cluster.is_balanced {
        score *= 1.2;
    }
    if cluster.total_travel_time_minutes > 180.0 {
        score *= 0.7;
    }
    if cluster.len() >= config.min_per_cluster && cluster.len() <= config.max_per_cluster {
        score *= 1.1;
    }
    score
}

/// Region lookup over fixed latitude/longitude bounds.
pub fn region_name_for(lat: f64, lng: f64) -> &'static str {
    if lat > 8.5 {
        "Northern Province"
    } else if lat > 7.5 && lng < 80.5 {
        "Western Province"
    } else if lat > 7.0 && lng > 81.0 {
        "Eastern Province"
    } else if lat > 6.5 {
        "Central Province"
    } else {
        "Southern Province"
    }
}

/// Seeded Lloyd's k-means over the rows of a pseudo-distance matrix.
fn kmeans(rows: &[Vec<f64>], k: usize, seed: u64) -> Vec<usize> {
    let n = rows.len();
    if n == 0 {
        return Vec::new();
    }
    let k = k.clamp(1, n);
    if k == 1 {
        return vec![0; n];
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    let mut centroids: Vec<Vec<f64>> = indices[..k].iter().map(|&i| rows[i].clone()).collect();

    let mut assignments = vec![0usize; n];
    for _ in 0..KMEANS_MAX_ITERATIONS {
        let mut changed = false;

        for (point, row) in rows.iter().enumerate() {
            let mut best_centroid = 0;
            let mut best_distance = f64::INFINITY;
            for (index, centroid) in centroids.iter().enumerate() {
                let distance = squared_distance(row, centroid);
                if distance < best_distance {
                    best_distance = distance;
                    best_centroid = index;
                }
            }
            if assignments[point] != best_centroid {
                assignments[point] = best_centroid;
                changed = true;
            }
        }

        if !changed {
            break;
        }

        for (index, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = rows
                .iter()
                .zip(assignments.iter())
                .filter(|(_, &assignment)| assignment == index)
                .map(|(row, _)| row)
                .collect();
            if members.is_empty() {
                continue; // keep the previous centroid
            }
            for (dimension, value) in centroid.iter_mut().enumerate() {
                *value = members.iter().map(|row| row[dimension]).sum::<f64>()
                    / members.len() as f64;
            }
        }
    }

    assignments
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}
