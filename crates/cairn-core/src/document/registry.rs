//! Document registry.
//!
//! The one resource shared across sessions: a process-wide keyed store of
//! uploaded documents with an explicit scope field. Keeping it in one place
//! keeps the cascading-delete invariant in one place. All mutation goes
//! through a single write lock, so operations on one document id are
//! linearizable (the second of two racing deletes observes `NotFound`).

use super::model::{Document, DocumentScope};
use crate::error::{CairnError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide registry of uploaded documents.
#[derive(Default)]
pub struct DocumentRegistry {
    documents: Arc<RwLock<HashMap<String, Document>>>,
}

impl DocumentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a successfully uploaded document.
    ///
    /// # Errors
    ///
    /// - `Validation` if the scope/owner pairing invariant is violated
    /// - `Conflict` if a document with this id is already registered
    pub async fn register(&self, document: Document) -> Result<Document> {
        document.validate_scope()?;
        let mut documents = self.documents.write().await;
        if documents.contains_key(&document.id) {
            return Err(CairnError::conflict(format!(
                "document '{}' already registered",
                document.id
            )));
        }
        documents.insert(document.id.clone(), document.clone());
        Ok(document)
    }

    /// Returns a snapshot of the document with the given id.
    pub async fn get(&self, document_id: &str) -> Option<Document> {
        let documents = self.documents.read().await;
        documents.get(document_id).cloned()
    }

    /// Removes the document with the given id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such document exists, so no two deletes of
    /// the same id can both report success.
    pub async fn delete(&self, document_id: &str) -> Result<Document> {
        let mut documents = self.documents.write().await;
        documents
            .remove(document_id)
            .ok_or_else(|| CairnError::not_found("Document", document_id))
    }

    /// Returns the temporary documents owned by the session, upload-time
    /// ascending, optionally followed by all permanent documents.
    pub async fn list_for_session(
        &self,
        session_id: &str,
        include_permanent: bool,
    ) -> Vec<Document> {
        let documents = self.documents.read().await;
        let mut owned: Vec<Document> = documents
            .values()
            .filter(|d| d.session_id.as_deref() == Some(session_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        if include_permanent {
            let mut permanent: Vec<Document> = documents
                .values()
                .filter(|d| d.scope == DocumentScope::Permanent)
                .cloned()
                .collect();
            permanent.sort_by(|a, b| {
                a.uploaded_at
                    .cmp(&b.uploaded_at)
                    .then_with(|| a.id.cmp(&b.id))
            });
            owned.extend(permanent);
        }
        owned
    }

    /// Removes every temporary document owned by the given session.
    ///
    /// Called by the session-deletion cascade. Permanent documents are
    /// never touched, regardless of count.
    pub async fn remove_session_documents(&self, session_id: &str) -> Vec<Document> {
        let mut documents = self.documents.write().await;
        let doomed: Vec<String> = documents
            .values()
            .filter(|d| {
                d.scope == DocumentScope::Temporary
                    && d.session_id.as_deref() == Some(session_id)
            })
            .map(|d| d.id.clone())
            .collect();
        doomed
            .iter()
            .filter_map(|id| documents.remove(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_doc(id: &str, session_id: &str, uploaded_at: &str) -> Document {
        Document {
            id: id.to_string(),
            name: format!("{}.pdf", id),
            size_bytes: 1024,
            scope: DocumentScope::Temporary,
            session_id: Some(session_id.to_string()),
            uploaded_at: uploaded_at.to_string(),
            url: None,
        }
    }

    fn perm_doc(id: &str, uploaded_at: &str) -> Document {
        Document {
            id: id.to_string(),
            name: format!("{}.pdf", id),
            size_bytes: 2048,
            scope: DocumentScope::Permanent,
            session_id: None,
            uploaded_at: uploaded_at.to_string(),
            url: None,
        }
    }

    #[tokio::test]
    async fn test_register_rejects_bad_scope_pairing() {
        let registry = DocumentRegistry::new();

        let mut doc = temp_doc("d1", "s1", "2025-01-01T00:00:00Z");
        doc.session_id = None;
        let err = registry.register(doc).await.unwrap_err();
        assert!(err.is_validation());

        let mut doc = perm_doc("d2", "2025-01-01T00:00:00Z");
        doc.session_id = Some("s1".to_string());
        let err = registry.register(doc).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_second_delete_reports_not_found() {
        let registry = DocumentRegistry::new();
        registry
            .register(temp_doc("d1", "s1", "2025-01-01T00:00:00Z"))
            .await
            .unwrap();

        registry.delete("d1").await.unwrap();
        let err = registry.delete("d1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cascade_spares_permanent_documents() {
        let registry = DocumentRegistry::new();
        registry
            .register(temp_doc("d1", "s1", "2025-01-01T00:00:00Z"))
            .await
            .unwrap();
        registry
            .register(temp_doc("d2", "s1", "2025-01-02T00:00:00Z"))
            .await
            .unwrap();
        registry
            .register(temp_doc("d3", "s2", "2025-01-03T00:00:00Z"))
            .await
            .unwrap();
        registry
            .register(perm_doc("p1", "2025-01-04T00:00:00Z"))
            .await
            .unwrap();

        let removed = registry.remove_session_documents("s1").await;
        assert_eq!(removed.len(), 2);

        assert!(registry.get("d1").await.is_none());
        assert!(registry.get("d2").await.is_none());
        assert!(registry.get("d3").await.is_some());
        assert!(registry.get("p1").await.is_some());
    }

    #[tokio::test]
    async fn test_list_for_session_orders_by_upload_time() {
        let registry = DocumentRegistry::new();
        registry
            .register(temp_doc("d2", "s1", "2025-01-02T00:00:00Z"))
            .await
            .unwrap();
        registry
            .register(temp_doc("d1", "s1", "2025-01-01T00:00:00Z"))
            .await
            .unwrap();
        registry
            .register(perm_doc("p1", "2025-01-03T00:00:00Z"))
            .await
            .unwrap();

        let without = registry.list_for_session("s1", false).await;
        let ids: Vec<&str> = without.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2"]);

        let with = registry.list_for_session("s1", true).await;
        let ids: Vec<&str> = with.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2", "p1"]);
    }
}
