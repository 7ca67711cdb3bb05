//! Template manager and refresh task.
//!
//! The manager holds the single current block template under a
//! reader/writer lock. Each publish bumps a version counter and broadcasts
//! it on a `watch` channel; connection tasks turn a version change into a
//! `newjob` notification for their miner, which then fetches its own
//! session-stamped job.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::block::{Block, SessionStamp};
use crate::chain::{BlockTemplate, Blockchain, ChainError};
use crate::credentials::CredentialStore;
use crate::scratchpad::{ScratchpadError, ScratchpadStore};
use crate::tracing::prelude::*;
use crate::types::Difficulty;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template request failed: {0}")]
    Chain(#[from] ChainError),

    #[error("scratchpad resync failed: {0}")]
    Scratchpad(#[from] ScratchpadError),

    #[error("template height {0} leaves no parent block")]
    BadHeight(u64),

    #[error("refresh task failed: {0}")]
    Task(String),
}

/// A template as published to sessions. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedTemplate {
    pub block: Block,
    pub difficulty: Difficulty,
    pub height: u64,
    pub version: u64,
}

pub struct TemplateManager {
    current: RwLock<Option<Arc<PublishedTemplate>>>,
    version_tx: watch::Sender<u64>,
}

impl Default for TemplateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateManager {
    pub fn new() -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            current: RwLock::new(None),
            version_tx,
        }
    }

    /// Store a new template under a fresh version and notify subscribers.
    pub fn publish(&self, template: BlockTemplate) -> Result<Arc<PublishedTemplate>, TemplateError> {
        if template.height == 0 {
            return Err(TemplateError::BadHeight(template.height));
        }

        let published = {
            let mut current = self.current.write();
            let version = current.as_ref().map_or(1, |t| t.version + 1);
            let published = Arc::new(PublishedTemplate {
                block: template.block,
                difficulty: template.difficulty,
                height: template.height,
                version,
            });
            *current = Some(Arc::clone(&published));
            published
        };

        self.version_tx.send_replace(published.version);
        debug!(
            version = published.version,
            height = published.height,
            difficulty = %published.difficulty,
            "Template published"
        );
        Ok(published)
    }

    pub fn current(&self) -> Option<Arc<PublishedTemplate>> {
        self.current.read().clone()
    }

    /// Current version, 0 before the first publish.
    pub fn version(&self) -> u64 {
        self.current.read().as_ref().map_or(0, |t| t.version)
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }
}

/// Everything one refresh touches.
#[derive(Clone)]
pub struct TemplateSource {
    pub chain: Arc<dyn Blockchain>,
    pub templates: Arc<TemplateManager>,
    pub scratchpad: Arc<ScratchpadStore>,
    pub credentials: Arc<CredentialStore>,
}

impl TemplateSource {
    /// Request a template paying the pool owner and publish it.
    pub fn request_template(&self) -> Result<Arc<PublishedTemplate>, TemplateError> {
        let owner = self.credentials.owner_address();
        let template = self
            .chain
            .create_block_template(&owner, &SessionStamp::reserve())?;
        self.templates.publish(template)
    }

    /// Bring the scratchpad to the tip, then publish a template for it.
    pub fn refresh_after_tip_change(&self) -> Result<Arc<PublishedTemplate>, TemplateError> {
        let outcome = self.scratchpad.resync(self.chain.as_ref())?;
        trace!(?outcome, "Scratchpad resynced");
        self.request_template()
    }
}

/// Periodic and tip-driven template refresh.
pub struct TemplateRefresher {
    source: TemplateSource,
    tip_rx: watch::Receiver<u64>,
    interval: Duration,
}

impl TemplateRefresher {
    pub fn new(source: TemplateSource, tip_rx: watch::Receiver<u64>, interval: Duration) -> Self {
        Self {
            source,
            tip_rx,
            interval,
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// A failed refresh cancels `shutdown` itself: without a valid template
    /// there is nothing to hand out, so the miner-facing server stops.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the caller already published.
        interval.tick().await;

        loop {
            let tip_changed = tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = self.tip_rx.changed() => {
                    if changed.is_err() {
                        warn!("Chain tip notifications closed");
                        break;
                    }
                    true
                }
                _ = interval.tick() => false,
            };

            if let Err(e) = self.refresh(tip_changed).await {
                error!(error = %e, "Template refresh failed, stopping pool");
                shutdown.cancel();
                break;
            }
            if tip_changed {
                interval.reset();
            }
        }
        debug!("Template refresher stopped");
    }

    async fn refresh(&self, tip_changed: bool) -> Result<(), TemplateError> {
        let source = self.source.clone();
        let published = tokio::task::spawn_blocking(move || {
            if tip_changed {
                source.refresh_after_tip_change()
            } else {
                source.request_template()
            }
        })
        .await
        .map_err(|e| TemplateError::Task(e.to_string()))??;

        if tip_changed {
            info!(
                height = published.height,
                version = published.version,
                "New chain tip, job template updated"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialSet;
    use crate::devnet::DevChain;

    fn source(chain: Arc<DevChain>) -> TemplateSource {
        let credentials = CredentialStore::new(CredentialSet::new("owner-address", Vec::new()).unwrap());
        TemplateSource {
            chain,
            templates: Arc::new(TemplateManager::new()),
            scratchpad: Arc::new(ScratchpadStore::new(10)),
            credentials: Arc::new(credentials),
        }
    }

    #[test]
    fn test_versions_strictly_increase() {
        let chain = DevChain::with_blocks(2);
        let manager = TemplateManager::new();
        assert!(manager.current().is_none());
        assert_eq!(manager.version(), 0);

        let mut last = 0;
        for _ in 0..5 {
            let template = chain.create_block_template("owner", &[]).unwrap();
            let published = manager.publish(template).unwrap();
            assert!(published.version > last);
            assert_eq!(manager.version(), published.version);
            last = published.version;
        }
    }

    #[test]
    fn test_publish_notifies_subscribers() {
        let chain = DevChain::with_blocks(1);
        let manager = TemplateManager::new();
        let mut rx = manager.subscribe();

        manager
            .publish(chain.create_block_template("owner", &[]).unwrap())
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[test]
    fn test_published_template_is_a_snapshot() {
        let chain = DevChain::with_blocks(1);
        let manager = TemplateManager::new();
        let first = manager
            .publish(chain.create_block_template("owner", &[]).unwrap())
            .unwrap();
        chain.mine_blocks(1);
        manager
            .publish(chain.create_block_template("owner", &[]).unwrap())
            .unwrap();

        // An earlier reader still holds its own copy
        assert_eq!(first.height, 2);
        assert_eq!(manager.current().unwrap().height, 3);
    }

    #[test]
    fn test_request_template_uses_owner_and_reservation() {
        let source = source(Arc::new(DevChain::with_blocks(3)));
        let published = source.request_template().unwrap();

        assert_eq!(published.height, 4);
        assert_eq!(published.block.miner_tx.outputs[0].address, "owner-address");
        assert_eq!(published.block.miner_tx.extra.reserved, SessionStamp::reserve());
    }

    #[test]
    fn test_failed_template_is_not_published() {
        let chain = Arc::new(DevChain::with_blocks(3));
        let source = source(Arc::clone(&chain));
        source.request_template().unwrap();

        chain.fail_templates(true);
        assert!(source.request_template().is_err());
        assert_eq!(source.templates.version(), 1);
    }

    #[tokio::test]
    async fn test_refresher_follows_tip() {
        let chain = Arc::new(DevChain::with_blocks(3));
        let source = source(Arc::clone(&chain));
        source.refresh_after_tip_change().unwrap();
        let mut versions = source.templates.subscribe();
        versions.mark_unchanged();

        let shutdown = CancellationToken::new();
        let refresher =
            TemplateRefresher::new(source.clone(), chain.tip_notifications(), Duration::from_secs(3600));
        let handle = tokio::spawn(refresher.run(shutdown.clone()));

        chain.mine_blocks(1);
        tokio::time::timeout(Duration::from_secs(5), versions.changed())
            .await
            .unwrap()
            .unwrap();

        let current = source.templates.current().unwrap();
        assert_eq!(current.height, 5);
        assert_eq!(source.scratchpad.top(), chain.top());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_refresher_rotates_on_timer() {
        let chain = Arc::new(DevChain::with_blocks(1));
        let source = source(Arc::clone(&chain));
        source.refresh_after_tip_change().unwrap();
        let mut versions = source.templates.subscribe();
        versions.mark_unchanged();

        let shutdown = CancellationToken::new();
        let refresher =
            TemplateRefresher::new(source.clone(), chain.tip_notifications(), Duration::from_millis(20));
        let handle = tokio::spawn(refresher.run(shutdown.clone()));

        tokio::time::timeout(Duration::from_secs(5), versions.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(source.templates.version() >= 2);
        assert_eq!(source.templates.current().unwrap().height, 2);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_refresher_failure_stops_pool() {
        let chain = Arc::new(DevChain::with_blocks(1));
        let source = source(Arc::clone(&chain));
        source.refresh_after_tip_change().unwrap();

        let shutdown = CancellationToken::new();
        let refresher =
            TemplateRefresher::new(source.clone(), chain.tip_notifications(), Duration::from_secs(3600));
        let handle = tokio::spawn(refresher.run(shutdown.clone()));

        chain.fail_templates(true);
        chain.mine_blocks(1);

        tokio::time::timeout(Duration::from_secs(5), shutdown.cancelled())
            .await
            .unwrap();
        handle.await.unwrap();
        assert_eq!(source.templates.version(), 1);
    }
}
