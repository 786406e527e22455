use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WarmError;
use crate::fetch::Fetch;
use crate::key::CacheKey;

/// A key to keep warm and the upstream call that produces its value
#[derive(Clone)]
pub struct WarmTarget {
    pub key: CacheKey,
    pub fetch: Arc<dyn Fetch>,
    /// Entity the key belongs to. The warmer pauses between entities.
    pub entity: Option<String>,
}

impl WarmTarget {
    pub fn new(key: impl Into<CacheKey>, fetch: Arc<dyn Fetch>) -> Self {
        Self {
            key: key.into(),
            fetch,
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Debug for WarmTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmTarget")
            .field("key", &self.key)
            .field("entity", &self.entity)
            .finish()
    }
}

/// Supplies the key set at the start of every warming cycle.
///
/// The set is asked for anew each cycle, so it may change over time. Sources
/// that derive it from upstream data, such as a team list read from
/// standings, implement this trait directly. Targets of one entity should be
/// adjacent, since pacing applies where the entity changes.
#[async_trait]
pub trait WarmKeySource: Send + Sync {
    async fn warm_targets(&self) -> Result<Vec<WarmTarget>, WarmError>;
}

/// A fixed list of targets
#[derive(Debug, Clone, Default)]
pub struct StaticKeySource {
    targets: Vec<WarmTarget>,
}

impl StaticKeySource {
    pub fn new(targets: Vec<WarmTarget>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl WarmKeySource for StaticKeySource {
    async fn warm_targets(&self) -> Result<Vec<WarmTarget>, WarmError> {
        Ok(self.targets.clone())
    }
}
