//! Candidate retrieval and re-ranking.
//!
//! Orchestrates the embedder, the vector index, and the neural ranker:
//! embed query and user context, pull a wide candidate set from the index,
//! score every hit with the ranker, fuse with the vector similarity into
//! the PEAR score, and return the top slice as attraction records.

use std::cmp::Ordering;

use log::{info, warn};
use rayon::prelude::*;

use crate::models::attraction::{Attraction, UserContext};
use crate::services::embedding::Embedder;
use crate::services::ranker::{fuse_scores, PlaceRanker};
use crate::services::vector_index::{IndexError, PayloadFilter, QdrantClient, VectorHit};

/// PEAR score assigned when an individual candidate cannot be scored.
const DEFAULT_PEAR_SCORE: f64 = 0.5;

/// Default visit length when the payload does not carry one.
const DEFAULT_VISIT_MINUTES: u32 = 120;

pub struct RecommendationService {
    embedder: Box<dyn Embedder>,
    index: QdrantClient,
    ranker: PlaceRanker,
    neural_weight: f64,
    similarity_weight: f64,
    search_limit: usize,
}

impl RecommendationService {
    pub fn new(
        embedder: Box<dyn Embedder>,
        index: QdrantClient,
        ranker: PlaceRanker,
        neural_weight: f64,
        similarity_weight: f64,
        search_limit: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            ranker,
            neural_weight,
            similarity_weight,
            search_limit,
        }
    }

    /// Retrieve and rank the best `top_k` attractions for a query.
    ///
    /// An empty hit list yields an empty result, not an error; index and
    /// embedding failures propagate and fail the request.
    pub async fn recommend(
        &self,
        query: &str,
        user_context: &UserContext,
        top_k: usize,
    ) -> Result<Vec<Attraction>, IndexError> {
        self.recommend_filtered(query, user_context, top_k, None).await
    }

    /// Same ranking restricted to one payload category.
    pub async fn recommend_by_category(
        &self,
        query: &str,
        user_context: &UserContext,
        top_k: usize,
        category: &str,
    ) -> Result<Vec<Attraction>, IndexError> {
        let filter = PayloadFilter::equals("category", category);
        self.recommend_filtered(query, user_context, top_k, Some(&filter))
            .await
    }

    /// Same ranking restricted to one region.
    pub async fn recommend_by_region(
        &self,
        query: &str,
        user_context: &UserContext,
        top_k: usize,
        region: &str,
    ) -> Result<Vec<Attraction>, IndexError> {
        let filter = PayloadFilter::equals("region", region);
        self.recommend_filtered(query, user_context, top_k, Some(&filter))
            .await
    }

    async fn recommend_filtered(
        &self,
        query: &str,
        user_context: &UserContext,
        top_k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<Attraction>, IndexError> {
        let query_vector = self.embedder.embed(query);
        let context_vector = self.embedder.embed(&user_context.to_context_text());

        let limit = self.search_limit.max(top_k);
        let hits = self.index.search(&query_vector, limit, filter).await?;
        if hits.is_empty() {
            warn!("No results found in vector search for query '{}'", query);
            return Ok(Vec::new());
        }
        info!("Retrieved {} candidates from vector index", hits.len());

        let mut ranked = self.rank_hits(&query_vector, &context_vector, &hits);
        ranked.truncate(top_k);
        Ok(ranked)
    }

    /// Score and order hits by descending PEAR score.
    ///
    /// Pure with respect to the index: identical inputs always produce the
    /// same ranking. The sort is stable, so injecting a duplicate candidate
    /// cannot reorder distinct ones.
    pub fn rank_hits(
        &self,
        query_vector: &[f32],
        context_vector: &[f32],
        hits: &[VectorHit],
    ) -> Vec<Attraction> {
        let mut scored: Vec<Attraction> = hits
            .par_iter()
            .map(|hit| self.score_hit(query_vector, context_vector, hit))
            .collect();

        scored.sort_by(|a, b| {
            b.pear_score
                .partial_cmp(&a.pear_score)
                .unwrap_or(Ordering::Equal)
        });
        scored
    }

    fn score_hit(
        &self,
        query_vector: &[f32],
        context_vector: &[f32],
        hit: &VectorHit,
    ) -> Attraction {
        let similarity = hit.similarity_score as f64;

        let (neural_score, pear_score) =
            match self.ranker.score(query_vector, context_vector, &hit.vector) {
                Some(neural) => {
                    let neural = neural as f64;
                    (
                        neural,
                        fuse_scores(neural, similarity, self.neural_weight, self.similarity_weight),
                    )
                }
                None => {
                    warn!(
                        "Could not score candidate {} (vector length {}); using default score",
                        hit.id,
                        hit.vector.len()
                    );
                    (DEFAULT_PEAR_SCORE, DEFAULT_PEAR_SCORE)
                }
            };

        attraction_from_hit(hit, neural_score, similarity, pear_score)
    }
}

fn attraction_from_hit(
    hit: &VectorHit,
    neural_score: f64,
    similarity_score: f64,
    pear_score: f64,
) -> Attraction {
    let payload = &hit.payload;
    Attraction {
        id: hit.id.clone(),
        name: payload_str(payload, "name").unwrap_or_else(|| "Unknown".to_string()),
        category: payload_str(payload, "category").unwrap_or_else(|| "Unknown".to_string()),
        description: payload_str(payload, "description").unwrap_or_default(),
        region: payload_str(payload, "region").unwrap_or_else(|| "Unknown".to_string()),
        latitude: payload_f64(payload, "latitude"),
        longitude: payload_f64(payload, "longitude"),
        pear_score,
        neural_score,
        similarity_score,
        visit_duration_minutes: payload_u32(payload, "visit_duration_minutes")
            .unwrap_or(DEFAULT_VISIT_MINUTES),
    }
}

fn payload_str(payload: &serde_json::Value, key: &str) -> Option<String> {
    payload.get(key)?.as_str().map(|s| s.to_string())
}

fn payload_f64(payload: &serde_json::Value, key: &str) -> Option<f64> {
    payload.get(key)?.as_f64()
}

fn payload_u32(payload: &serde_json::Value, key: &str) -> Option<u32> {
    payload.get(key)?.as_u64().map(|v| v as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embedding::HashingEmbedder;
    use crate::services::ranker::RankerWeights;
    use serde_json::json;

    const DIM: usize = 8;

    fn service() -> RecommendationService {
        let ranker =
            PlaceRanker::from_weights(RankerWeights::seeded(DIM, 4, 42)).unwrap();
        let index = QdrantClient::new("http://localhost:6333", None, "test").unwrap();
        RecommendationService::new(
            Box::new(HashingEmbedder::new(DIM)),
            index,
            ranker,
            0.7,
            0.3,
            100,
        )
    }

    fn hit(id: &str, name: &str, similarity: f32, vector: Vec<f32>) -> VectorHit {
        VectorHit {
            id: id.to_string(),
            payload: json!({
                "name": name,
                "category": "Historical",
                "description": "",
                "region": "Central",
                "visit_duration_minutes": 90
            }),
            vector,
            similarity_score: similarity,
        }
    }

    #[test]
    fn ranking_is_deterministic() {
        let service = service();
        let q = vec![0.2; DIM];
        let c = vec![0.1; DIM];
        let hits = vec![
            hit("a", "Sigiriya", 0.9, vec![0.5; DIM]),
            hit("b", "Dambulla", 0.7, vec![-0.5; DIM]),
            hit("c", "Kandy", 0.8, vec![0.25; DIM]),
        ];

        let first = service.rank_hits(&q, &c, &hits);
        let second = service.rank_hits(&q, &c, &hits);

        let ids: Vec<&str> = first.iter().map(|a| a.id.as_str()).collect();
        let ids_again: Vec<&str> = second.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ids_again);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.pear_score, b.pear_score);
        }
    }

    #[test]
    fn pear_scores_stay_in_bounds_and_fuse() {
        let service = service();
        let q = vec![0.3; DIM];
        let c = vec![-0.3; DIM];
        let hits = vec![
            hit("a", "Sigiriya", 1.0, vec![0.9; DIM]),
            hit("b", "Dambulla", 0.0, vec![-0.9; DIM]),
        ];

        for attraction in service.rank_hits(&q, &c, &hits) {
            assert!((0.0..=1.0).contains(&attraction.pear_score));
            let expected = (0.7 * attraction.neural_score
                + 0.3 * attraction.similarity_score)
                .clamp(0.0, 1.0);
            assert!((attraction.pear_score - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn malformed_vector_gets_default_score() {
        let service = service();
        let q = vec![0.3; DIM];
        let c = vec![0.3; DIM];
        let hits = vec![hit("broken", "Mystery", 0.9, vec![0.1; 3])];

        let ranked = service.rank_hits(&q, &c, &hits);
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].pear_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn duplicate_hits_do_not_reorder_distinct_candidates() {
        let service = service();
        let q = vec![0.4; DIM];
        let c = vec![0.2; DIM];
        let hits = vec![
            hit("a", "Sigiriya", 0.9, vec![0.5; DIM]),
            hit("b", "Dambulla", 0.6, vec![-0.4; DIM]),
            hit("c", "Kandy", 0.75, vec![0.2; DIM]),
        ];

        let baseline: Vec<String> = service
            .rank_hits(&q, &c, &hits)
            .into_iter()
            .map(|a| a.id)
            .collect();

        let mut with_duplicate = hits.clone();
        with_duplicate.push(hits[1].clone());
        let ranked: Vec<String> = service
            .rank_hits(&q, &c, &with_duplicate)
            .into_iter()
            .filter(|a| a.id != "b")
            .map(|a| a.id)
            .collect();

        let baseline_without_b: Vec<String> =
            baseline.into_iter().filter(|id| id != "b").collect();
        assert_eq!(ranked, baseline_without_b);
    }

    #[test]
    fn payload_fields_populate_the_attraction() {
        let hit = hit("a", "Sigiriya", 0.8, vec![0.1; DIM]);
        let attraction = attraction_from_hit(&hit, 0.7, 0.8, 0.73);
        assert_eq!(attraction.name, "Sigiriya");
        assert_eq!(attraction.category, "Historical");
        assert_eq!(attraction.visit_duration_minutes, 90);
        assert_eq!(attraction.latitude, None);
    }
}
