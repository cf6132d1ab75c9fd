//! Document lifecycle coordinator: wires the CAS transition port to the
//! event bus so every successful transition is observable (spec §4.1).

use std::sync::Arc;
use tracing::{info, warn};

use amber_core::error::Result;
use amber_core::ports::DocumentRepository;
use amber_core::types::DocumentStatus;

use crate::bus::{EventBus, StatusEvent};

/// Guarantees at-most-one active processing path per document: a
/// caller that loses the CAS race gets `Ok(false)` and should stop,
/// not retry the stage.
pub struct DocumentStateMachine {
    repository: Arc<dyn DocumentRepository>,
    bus: Arc<EventBus>,
}

impl DocumentStateMachine {
    #[must_use]
    pub fn new(repository: Arc<dyn DocumentRepository>, bus: Arc<EventBus>) -> Self {
        Self { repository, bus }
    }

    /// Attempt `from -> to`. On success, publishes a [`StatusEvent`].
    /// On CAS mismatch, logs and returns `false` without emitting
    /// anything (spec §4.1: "Failure to transition silently no-ops").
    pub async fn advance(
        &self,
        tenant_id: &str,
        document_id: &str,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<bool> {
        let advanced = self
            .repository
            .advance_if_in_state(tenant_id, document_id, from, to)
            .await?;

        if advanced {
            info!(document_id, ?from, ?to, "document advanced");
            self.bus.emit_state_change(StatusEvent {
                document_id: document_id.to_string(),
                tenant_id: tenant_id.to_string(),
                old_status: from,
                new_status: to,
                progress: None,
                details: None,
            });
        } else {
            warn!(document_id, ?from, ?to, "cas transition lost race, no-op");
        }

        Ok(advanced)
    }

    /// Terminal failure transition, reachable from any non-terminal
    /// state. Always emits, since there is no competing writer to race
    /// against at this point in the pipeline.
    pub async fn fail(&self, tenant_id: &str, document_id: &str, from: DocumentStatus, error_message: &str) -> Result<()> {
        self.repository.mark_failed(tenant_id, document_id, error_message).await?;
        self.bus.emit_state_change(StatusEvent {
            document_id: document_id.to_string(),
            tenant_id: tenant_id.to_string(),
            old_status: from,
            new_status: DocumentStatus::Failed,
            progress: None,
            details: Some(serde_json::json!({ "error": error_message })),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct FakeRepo {
        state: Mutex<DocumentStatus>,
    }

    #[async_trait]
    impl DocumentRepository for FakeRepo {
        async fn get(&self, _tenant_id: &str, _document_id: &str) -> Result<Option<amber_core::types::Document>> {
            Ok(None)
        }
        async fn save(&self, _document: &amber_core::types::Document) -> Result<()> {
            Ok(())
        }
        async fn advance_if_in_state(
            &self,
            _tenant_id: &str,
            _document_id: &str,
            expected: DocumentStatus,
            next: DocumentStatus,
        ) -> Result<bool> {
            let mut state = self.state.lock();
            if *state == expected {
                *state = next;
                Ok(true)
            } else {
                Ok(false)
            }
        }
        async fn mark_failed(&self, _tenant_id: &str, _document_id: &str, _error_message: &str) -> Result<()> {
            *self.state.lock() = DocumentStatus::Failed;
            Ok(())
        }
        async fn find_by_content_hash(&self, _tenant_id: &str, _content_hash: &str) -> Result<Option<amber_core::types::Document>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn losing_cas_race_returns_false_without_emitting() {
        let repo = Arc::new(FakeRepo { state: Mutex::new(DocumentStatus::Extracting) });
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe("doc-1");
        let machine = DocumentStateMachine::new(repo, bus);

        let advanced = machine
            .advance("t1", "doc-1", DocumentStatus::Ingested, DocumentStatus::Extracting)
            .await
            .unwrap();

        assert!(!advanced);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn winning_cas_race_emits_status_event() {
        let repo = Arc::new(FakeRepo { state: Mutex::new(DocumentStatus::Ingested) });
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe("doc-1");
        let machine = DocumentStateMachine::new(repo, bus);

        let advanced = machine
            .advance("t1", "doc-1", DocumentStatus::Ingested, DocumentStatus::Extracting)
            .await
            .unwrap();

        assert!(advanced);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.new_status, DocumentStatus::Extracting);
    }
}
