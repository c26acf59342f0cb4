use std::collections::{BTreeMap, HashSet};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::server_config::RetrievalConfig;

pub mod corpus;
pub mod embedder;

pub use embedder::Embedder;

/// One past reply considered for the index, before filtering and embedding.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

/// A neighbor returned from a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarEmailContext {
    pub content_snippet: String,
    pub metadata: BTreeMap<String, String>,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    text: String,
    metadata: BTreeMap<String, String>,
    embedding: Vec<f32>,
}

/// Per-user similarity index over past sent replies. Entries keep corpus
/// order, so equal-score neighbors tie-break by insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyIndex {
    entries: Vec<IndexEntry>,
}

const SNIPPET_MAX_CHARS: usize = 200;
const CONTEXT_NEIGHBORS: usize = 3;

impl ReplyIndex {
    /// Embed the corpus into a fresh index. Entries shorter than
    /// `min_entry_chars` and exact duplicates of an earlier entry are
    /// dropped before any embedding call is made.
    pub async fn build(
        embedder: &dyn Embedder,
        corpus: Vec<CorpusEntry>,
        min_entry_chars: usize,
    ) -> AppResult<Self> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for entry in corpus {
            if entry.text.chars().count() < min_entry_chars {
                continue;
            }
            if !seen.insert(entry.text.clone()) {
                continue;
            }

            let embedding = embedder.embed(&entry.text).await?;
            entries.push(IndexEntry {
                text: entry.text,
                metadata: entry.metadata,
                embedding,
            });
        }

        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn to_bytes(&self) -> AppResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(bytes)
            .context("Could not deserialize reply index")
            .map_err(Into::into)
    }

    /// Neighbors scoring at or above `score_threshold`, best first, at most
    /// `max_neighbors`. The sort is stable so ties keep insertion order.
    pub async fn query_similar(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        cfg: &RetrievalConfig,
    ) -> AppResult<Vec<SimilarEmailContext>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = embedder.embed(query).await?;

        let mut neighbors: Vec<SimilarEmailContext> = self
            .entries
            .iter()
            .map(|entry| SimilarEmailContext {
                content_snippet: snippet(&entry.text),
                metadata: entry.metadata.clone(),
                score: cosine_similarity(&query_vec, &entry.embedding),
            })
            .filter(|n| n.score >= cfg.score_threshold)
            .collect();

        neighbors.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        neighbors.truncate(cfg.max_neighbors);

        Ok(neighbors)
    }

    /// The context block handed to reply generation: the top snippets joined
    /// with " | ", or the empty string when nothing clears the threshold.
    pub async fn query_context(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        cfg: &RetrievalConfig,
    ) -> AppResult<String> {
        let neighbors = self.query_similar(embedder, query, cfg).await?;

        Ok(neighbors
            .iter()
            .take(CONTEXT_NEIGHBORS)
            .map(|n| n.content_snippet.as_str())
            .collect::<Vec<_>>()
            .join(" | "))
    }
}

/// First 200 chars of the entry, cut on a char boundary.
fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_MAX_CHARS).collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b)
}
