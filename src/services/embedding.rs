//! Text embedding interface.
//!
//! Queries, user context, and attraction payloads must all live in the same
//! vector space, and the retriever only depends on this trait. The default
//! implementation is a feature-hashing embedder: deterministic, dependency
//! free, and synchronous, which keeps embedding CPU-bound inside a request.
//! A model-server-backed embedder can be swapped in behind the same trait as
//! long as the attraction collection was indexed with the same model.

/// Produces fixed-dimension dense vectors for free text.
pub trait Embedder: Send + Sync {
    /// Dimension of every vector produced by this embedder. Constant for
    /// the process lifetime.
    fn dim(&self) -> usize;

    /// Embed a text. Identical input yields identical output within a
    /// process.
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Feature-hashing embedder over lowercase alphanumeric tokens.
///
/// Each token is FNV-1a hashed into one of `dim` buckets with a hash-derived
/// sign, and the result is L2-normalized. Not a learned model, but stable
/// and shared between queries and candidates.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dim as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
