//! Document persistence.
//!
//! The pipeline only needs save / find / update; the backend stays
//! opaque behind [`DocumentRepository`]. The in-memory implementation is
//! the one the server ships with.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::{Document, DocumentStatus, FacturaError};

/// Persistence seam for document records.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Persist a new record. Duplicate ids are a [`FacturaError::Conflict`].
    async fn save(&self, document: Document) -> Result<(), FacturaError>;

    /// Fetch a record by id.
    async fn find(&self, id: &str) -> Result<Document, FacturaError>;

    /// Advance the stored status, enforcing the state machine.
    async fn update_status(&self, id: &str, status: DocumentStatus) -> Result<(), FacturaError>;

    /// Record the SUNAT ticket assigned on submission.
    async fn set_ticket(&self, id: &str, ticket: &str) -> Result<(), FacturaError>;
}

/// Thread-safe in-memory repository. Readers may observe a document while
/// a single writer updates it; the lock provides the ordering.
#[derive(Default)]
pub struct MemoryRepository {
    documents: RwLock<HashMap<String, Document>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, in no particular order.
    pub async fn list(&self) -> Vec<Document> {
        self.documents.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl DocumentRepository for MemoryRepository {
    async fn save(&self, document: Document) -> Result<(), FacturaError> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&document.id) {
            return Err(FacturaError::Conflict(format!(
                "document {} already exists",
                document.id
            )));
        }
        documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Document, FacturaError> {
        let documents = self.documents.read().await;
        documents
            .get(id)
            .cloned()
            .ok_or_else(|| FacturaError::NotFound(format!("document {id} not found")))
    }

    async fn update_status(&self, id: &str, status: DocumentStatus) -> Result<(), FacturaError> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(id)
            .ok_or_else(|| FacturaError::NotFound(format!("document {id} not found")))?;
        document.status = document
            .status
            .advance(status)
            .map_err(|e| FacturaError::Conflict(e.to_string()))?;
        document.last_updated = chrono::Local::now().naive_local();
        Ok(())
    }

    async fn set_ticket(&self, id: &str, ticket: &str) -> Result<(), FacturaError> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(id)
            .ok_or_else(|| FacturaError::NotFound(format!("document {id} not found")))?;
        if document.ticket.is_none() {
            document.ticket = Some(ticket.to_string());
            document.last_updated = chrono::Local::now().naive_local();
        }
        Ok(())
    }
}
