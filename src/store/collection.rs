// src/store/collection.rs
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One typed document collection. Lookups take closure predicates, and
/// `update_one` runs find-and-mutate under a single write lock so a
/// guarded transition can never interleave with a competing writer.
pub struct Collection<T> {
    documents: RwLock<HashMap<String, T>>,
}

impl<T> Collection<T>
where
    T: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, id: &str, document: T) {
        let mut documents = self.documents.write().await;
        documents.insert(id.to_string(), document);
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        let documents = self.documents.read().await;
        documents.get(id).cloned()
    }

    pub async fn find_one<P>(&self, predicate: P) -> Option<T>
    where
        P: Fn(&T) -> bool,
    {
        let documents = self.documents.read().await;
        documents.values().find(|doc| predicate(doc)).cloned()
    }

    pub async fn find<P>(&self, predicate: P) -> Vec<T>
    where
        P: Fn(&T) -> bool,
    {
        let documents = self.documents.read().await;
        documents.values().filter(|doc| predicate(doc)).cloned().collect()
    }

    /// Atomic conditional update: the first document matching the
    /// predicate is mutated in place and returned. `None` means nothing
    /// matched, and nothing was changed.
    pub async fn update_one<P, M>(&self, predicate: P, mutate: M) -> Option<T>
    where
        P: Fn(&T) -> bool,
        M: FnOnce(&mut T),
    {
        let mut documents = self.documents.write().await;
        let document = documents.values_mut().find(|doc| predicate(doc))?;
        mutate(document);
        Some(document.clone())
    }

    pub async fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&T) -> bool,
    {
        let documents = self.documents.read().await;
        documents.values().filter(|doc| predicate(doc)).count()
    }
}

/// Envelope for paginated listings.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    /// Slice an already-sorted result set. Pages are 1-based; a page
    /// past the end comes back empty, never an error.
    pub fn from_sorted(items: Vec<T>, page: u32, limit: u32) -> Self {
        let total = items.len();
        let page = page.max(1);
        let limit = limit.max(1);
        let start = ((page - 1) as usize) * (limit as usize);

        let items = if start >= total {
            Vec::new()
        } else {
            items.into_iter().skip(start).take(limit as usize).collect()
        };

        Self { items, total, page, limit }
    }
}
