//! Rendered document cache.
//!
//! Two levels share one backend: generated graphs keyed by
//! (variant, public, base URL) and rendered bytes keyed by the full
//! [`CacheKey`]. Entries live until the owning view invalidates them.

use crate::{
    codec::Format, error::ApiDocResult, renderer::Presentation, specification::SchemaGraph,
};
use async_trait::async_trait;
use axum::body::Bytes;
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Key of a rendered artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub variant: String,
    pub format: Format,
    pub public: bool,
    pub presentation: Presentation,
    /// Server URL derived from the request's host headers
    pub base_url: Option<String>,
    /// Raw document URL embedded in HTML pages
    pub document_url: Option<String>,
}

impl CacheKey {
    pub fn graph_key(&self) -> GraphKey {
        GraphKey {
            variant: self.variant.clone(),
            public: self.public,
            base_url: self.base_url.clone(),
        }
    }
}

/// Key of a generated graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphKey {
    pub variant: String,
    pub public: bool,
    pub base_url: Option<String>,
}

/// Rendered bytes with the content type they are served with
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDocument {
    pub body: Bytes,
    pub content_type: String,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub documents: u64,
    pub graphs: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

/// Storage for graphs and rendered documents
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a rendered document
    async fn get(&self, key: &CacheKey) -> ApiDocResult<Option<CachedDocument>>;

    /// Store a rendered document, replacing any previous entry
    async fn put(&self, key: CacheKey, document: CachedDocument) -> ApiDocResult<()>;

    /// Get a generated graph
    async fn get_graph(&self, key: &GraphKey) -> ApiDocResult<Option<Arc<SchemaGraph>>>;

    /// Store a generated graph, replacing any previous entry
    async fn put_graph(&self, key: GraphKey, graph: Arc<SchemaGraph>) -> ApiDocResult<()>;

    /// Remove every entry of one document variant, returning how many were removed
    async fn invalidate_variant(&self, variant: &str) -> ApiDocResult<usize>;

    /// Clear all entries
    async fn flush(&self) -> ApiDocResult<()>;

    async fn stats(&self) -> ApiDocResult<CacheStats>;
}

/// In-process backend on sharded concurrent maps
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: DashMap<CacheKey, CachedDocument>,
    graphs: DashMap<GraphKey, Arc<SchemaGraph>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &CacheKey) -> ApiDocResult<Option<CachedDocument>> {
        let document = self.documents.get(key).map(|entry| entry.value().clone());
        match document {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        Ok(document)
    }

    async fn put(&self, key: CacheKey, document: CachedDocument) -> ApiDocResult<()> {
        self.documents.insert(key, document);
        Ok(())
    }

    async fn get_graph(&self, key: &GraphKey) -> ApiDocResult<Option<Arc<SchemaGraph>>> {
        Ok(self.graphs.get(key).map(|entry| Arc::clone(entry.value())))
    }

    async fn put_graph(&self, key: GraphKey, graph: Arc<SchemaGraph>) -> ApiDocResult<()> {
        self.graphs.insert(key, graph);
        Ok(())
    }

    async fn invalidate_variant(&self, variant: &str) -> ApiDocResult<usize> {
        let before = self.documents.len() + self.graphs.len();
        self.documents.retain(|key, _| key.variant != variant);
        self.graphs.retain(|key, _| key.variant != variant);
        Ok(before - (self.documents.len() + self.graphs.len()))
    }

    async fn flush(&self) -> ApiDocResult<()> {
        self.documents.clear();
        self.graphs.clear();
        Ok(())
    }

    async fn stats(&self) -> ApiDocResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            documents: self.documents.len() as u64,
            graphs: self.graphs.len() as u64,
        })
    }
}
