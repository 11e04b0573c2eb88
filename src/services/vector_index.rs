//! Qdrant vector index client.
//!
//! Thin REST adapter over the points search API. Hits come back with both
//! the stored payload and the raw vector; the raw vector is required by the
//! neural ranker, so `with_vector` is always requested.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum IndexError {
    HttpError(reqwest::Error),
    ResponseError(String),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::HttpError(err) => write!(f, "Vector index HTTP error: {}", err),
            IndexError::ResponseError(msg) => write!(f, "Vector index response error: {}", msg),
        }
    }
}

impl Error for IndexError {}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        IndexError::HttpError(err)
    }
}

/// Equality filter against a payload field.
#[derive(Debug, Clone)]
pub struct PayloadFilter {
    pub key: String,
    pub value: serde_json::Value,
}

impl PayloadFilter {
    pub fn equals(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: serde_json::Value::String(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    vector: Vec<f32>,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<WireFilter>,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Debug, Serialize)]
struct WireFilter {
    must: Vec<WireCondition>,
}

#[derive(Debug, Serialize)]
struct WireCondition {
    key: String,
    #[serde(rename = "match")]
    match_value: WireMatch,
}

#[derive(Debug, Serialize)]
struct WireMatch {
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    score: f32,
    payload: Option<serde_json::Value>,
    vector: Option<Vec<f32>>,
}

/// One search hit: id, stored payload, raw vector, cosine similarity.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub payload: serde_json::Value,
    pub vector: Vec<f32>,
    pub similarity_score: f32,
}

#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
}

impl QdrantClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        collection: &str,
    ) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            collection: collection.to_string(),
        })
    }

    /// Top-k cosine search. The index may return fewer than `limit` hits;
    /// an empty result is not an error.
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<VectorHit>, IndexError> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );

        let request = SearchRequest {
            vector: query_vector.to_vec(),
            limit,
            filter: filter.map(|f| WireFilter {
                must: vec![WireCondition {
                    key: f.key.clone(),
                    match_value: WireMatch {
                        value: f.value.clone(),
                    },
                }],
            }),
            with_payload: true,
            with_vector: true,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(IndexError::ResponseError(format!(
                "Search request failed with status {}: {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| IndexError::ResponseError(format!("Failed to parse response: {}", e)))?;

        let hits = parsed
            .result
            .into_iter()
            .map(|point| VectorHit {
                id: point_id_string(&point.id),
                payload: point.payload.unwrap_or(serde_json::Value::Null),
                vector: point.vector.unwrap_or_default(),
                similarity_score: point.score,
            })
            .collect();

        Ok(hits)
    }
}

fn point_id_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
