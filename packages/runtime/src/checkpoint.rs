//! # Checkpoint Manager
//!
//! Creates the named, timestamped document snapshot that must exist before
//! any bulk mutation begins. Restoration is user-driven outside this
//! engine; the record is kept only for display and rollback guidance.

use std::sync::Arc;

use chrono::Utc;

use restyle_common::{CheckpointRecord, DocumentHost, EngineError};

pub struct CheckpointManager {
    host: Arc<dyn DocumentHost>,
}

impl CheckpointManager {
    pub fn new(host: Arc<dyn DocumentHost>) -> Self {
        Self { host }
    }

    /// Create a snapshot titled `"<label> - <timestamp>"`.
    ///
    /// On host rejection (e.g. no edit permission) this returns
    /// [`EngineError::Checkpoint`] and the caller must abort before any
    /// mutation. No checkpoint, no mutation, ever.
    pub async fn create(&self, label: &str) -> Result<CheckpointRecord, EngineError> {
        let created_at = Utc::now();
        let title = format!(
            "{} - {}",
            label,
            created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        self.host
            .create_checkpoint(&title)
            .await
            .map_err(|e| EngineError::Checkpoint(e.to_string()))?;

        tracing::info!(%title, "checkpoint created");

        Ok(CheckpointRecord { title, created_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use restyle_common::{
        ChangeNotification, ContentNodeRef, DocumentInfo, HostError, NodeId, NodePage,
        PageRequest, StyleDefinition, StyleRef,
    };
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct SnapshotHost {
        titles: Mutex<Vec<String>>,
        reject: bool,
    }

    #[async_trait]
    impl DocumentHost for SnapshotHost {
        async fn document_info(&self) -> Result<DocumentInfo, HostError> {
            unimplemented!()
        }

        async fn list_nodes(&self, _page: PageRequest) -> Result<NodePage, HostError> {
            unimplemented!()
        }

        async fn read_binding(&self, _id: &NodeId) -> Result<ContentNodeRef, HostError> {
            unimplemented!()
        }

        async fn write_binding(&self, _id: &NodeId, _t: &StyleRef) -> Result<(), HostError> {
            unimplemented!()
        }

        async fn list_definitions(&self) -> Result<Vec<StyleDefinition>, HostError> {
            unimplemented!()
        }

        async fn create_checkpoint(&self, title: &str) -> Result<(), HostError> {
            if self.reject {
                return Err(HostError::PermissionDenied("no edit scope".to_string()));
            }
            self.titles.lock().unwrap().push(title.to_string());
            Ok(())
        }

        fn subscribe_changes(&self) -> mpsc::UnboundedReceiver<ChangeNotification> {
            let (_tx, rx) = mpsc::unbounded_channel();
            rx
        }
    }

    #[tokio::test]
    async fn test_title_carries_label_and_timestamp() {
        let host = Arc::new(SnapshotHost {
            titles: Mutex::new(Vec::new()),
            reject: false,
        });
        let manager = CheckpointManager::new(host.clone());

        let record = manager.create("Bulk restyle").await.unwrap();

        assert!(record.title.starts_with("Bulk restyle - "));
        assert!(record.title.ends_with("UTC"));
        assert_eq!(host.titles.lock().unwrap().as_slice(), &[record.title]);
    }

    #[tokio::test]
    async fn test_host_rejection_becomes_checkpoint_error() {
        let host = Arc::new(SnapshotHost {
            titles: Mutex::new(Vec::new()),
            reject: true,
        });
        let manager = CheckpointManager::new(host);

        let result = manager.create("Bulk restyle").await;

        assert!(matches!(result, Err(EngineError::Checkpoint(_))));
    }
}
