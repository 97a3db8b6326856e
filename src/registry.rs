//! Read-only document registry derived from the vector store.

use std::sync::Arc;

use crate::document::DocumentSummary;
use crate::error::Result;
use crate::store::VectorStore;

/// A derived view over [`VectorStore`] metadata: which documents exist and
/// how many chunks each has.
///
/// Documents exist only implicitly as the set of chunks sharing a filename,
/// so the registry computes its answers on demand and never caches them —
/// the store's read-after-write guarantee makes any cache a staleness risk
/// for no benefit.
#[derive(Clone)]
pub struct DocumentRegistry {
    store: Arc<dyn VectorStore>,
}

impl DocumentRegistry {
    /// Create a registry over the given store.
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// All known documents, sorted by filename.
    pub async fn documents(&self) -> Result<Vec<DocumentSummary>> {
        let mut docs = self.store.list_documents().await?;
        docs.sort_by(|a, b| a.document.cmp(&b.document));
        Ok(docs)
    }

    /// Whether any chunks exist for `document`.
    pub async fn contains(&self, document: &str) -> Result<bool> {
        Ok(self.documents().await?.iter().any(|d| d.document == document))
    }

    /// Total number of chunks across all documents.
    pub async fn total_chunks(&self) -> Result<usize> {
        Ok(self.documents().await?.iter().map(|d| d.chunk_count).sum())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::document::{Chunk, chunk_key};
    use crate::inmemory::InMemoryVectorStore;

    fn chunk(document: &str, ordinal: usize) -> Chunk {
        Chunk {
            key: chunk_key(document, ordinal),
            document: document.to_string(),
            page: 1,
            page_end: None,
            ordinal,
            text: "text".to_string(),
            embedding: vec![1.0],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn registry_reflects_store_contents() {
        let store = Arc::new(InMemoryVectorStore::new());
        let registry = DocumentRegistry::new(store.clone());

        assert!(registry.documents().await.unwrap().is_empty());
        assert_eq!(registry.total_chunks().await.unwrap(), 0);

        store
            .upsert(&[chunk("b.txt", 0), chunk("a.txt", 0), chunk("a.txt", 1)])
            .await
            .unwrap();

        let docs = registry.documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].document, "a.txt");
        assert!(registry.contains("b.txt").await.unwrap());
        assert!(!registry.contains("c.txt").await.unwrap());
        assert_eq!(registry.total_chunks().await.unwrap(), 3);

        // No caching: a delete in the store is visible immediately.
        store.delete_by_document("a.txt").await.unwrap();
        assert!(!registry.contains("a.txt").await.unwrap());
    }
}
