use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Searchable projection of a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDocument {
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the document for `doc.post_id`
    async fn upsert(&self, doc: PostDocument) -> Result<()>;

    /// Returns whether a document was removed
    async fn remove(&self, post_id: &str) -> Result<bool>;

    /// Documents matching any of `terms`, best match first
    async fn search(&self, terms: &[String], limit: usize) -> Result<Vec<PostDocument>>;
}

/// Split text into lowercase alphanumeric terms
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

struct Indexed {
    doc: PostDocument,
    terms: Vec<String>,
}

#[derive(Clone, Default)]
pub struct InMemorySearchIndex {
    docs: Arc<RwLock<HashMap<String, Indexed>>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, post_id: &str) -> bool {
        self.docs.read().contains_key(post_id)
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert(&self, doc: PostDocument) -> Result<()> {
        let terms = tokenize(&doc.content);
        self.docs
            .write()
            .insert(doc.post_id.clone(), Indexed { doc, terms });
        Ok(())
    }

    async fn remove(&self, post_id: &str) -> Result<bool> {
        Ok(self.docs.write().remove(post_id).is_some())
    }

    async fn search(&self, terms: &[String], limit: usize) -> Result<Vec<PostDocument>> {
        let docs = self.docs.read();
        let mut scored: Vec<(usize, &PostDocument)> = docs
            .values()
            .filter_map(|indexed| {
                let hits = indexed
                    .terms
                    .iter()
                    .filter(|term| terms.contains(term))
                    .count();
                (hits > 0).then_some((hits, &indexed.doc))
            })
            .collect();

        // Score, then recency, then id for a stable order
        scored.sort_by(|(a_hits, a), (b_hits, b)| {
            b_hits
                .cmp(a_hits)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.post_id.cmp(&b.post_id))
        });

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, doc)| doc.clone())
            .collect())
    }
}
