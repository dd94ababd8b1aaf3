use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Something opened during connection that must be closed at shutdown.
#[async_trait]
pub trait Releasable: Send + Sync {
    fn label(&self) -> &str;

    async fn release(&self) -> Result<()>;
}

/// Resources in acquisition order, released newest first.
#[derive(Default)]
pub struct ResourceStack {
    entries: Vec<Box<dyn Releasable>>,
}

impl ResourceStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: Box<dyn Releasable>) {
        self.entries.push(resource);
    }

    /// Moves everything from `other` on top of this stack.
    pub fn absorb(&mut self, mut other: ResourceStack) {
        self.entries.append(&mut other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Releases every resource even if some fail; returns the failures.
    pub async fn release_all(&mut self) -> Vec<(String, anyhow::Error)> {
        let mut failures = Vec::new();

        while let Some(resource) = self.entries.pop() {
            match resource.release().await {
                Ok(()) => debug!("Released {}", resource.label()),
                Err(e) => {
                    warn!("Failed to release {}: {:#}", resource.label(), e);
                    failures.push((resource.label().to_string(), e));
                }
            }
        }

        failures
    }
}
