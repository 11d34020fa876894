//! # Change Watcher
//!
//! Subscribes to the host's document-mutation notifications and flags the
//! current audit result stale when the document changes underneath it.
//!
//! Notifications tagged with the engine's own origin are ignored so the
//! engine's replacement run does not invalidate its own audit twice over.
//! The watcher holds no state beyond its task handle; the flag itself lives
//! in the shared [`AuditStore`].

use std::sync::Arc;

use tokio::task::JoinHandle;

use restyle_common::{ChangeOrigin, DocumentHost};

use crate::audit::AuditStore;

pub struct ChangeWatcher {
    task: Option<JoinHandle<()>>,
}

impl ChangeWatcher {
    /// Subscribe to the host's change feed and start the watch task.
    pub fn spawn(host: &Arc<dyn DocumentHost>, store: AuditStore) -> Self {
        let mut changes = host.subscribe_changes();

        let task = tokio::spawn(async move {
            while let Some(notification) = changes.recv().await {
                match notification.origin {
                    ChangeOrigin::External => {
                        tracing::info!("external document change, audit invalidated");
                        store.invalidate();
                    }
                    ChangeOrigin::Engine => {
                        // Our own in-flight mutation; the replacement engine
                        // invalidates once at completion.
                    }
                }
            }
        });

        Self { task: Some(task) }
    }

    /// Stop watching and release the subscription.
    pub fn dispose(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}
