//! Apply task: render, enhance, apply and health-gate resources.

use async_trait::async_trait;
use serde::Deserialize;

use super::{parse_config, Context, Task};
use crate::error::{EngineError, Result};
use crate::health;
use crate::models::TaskSpec;

#[derive(Debug, Deserialize)]
pub(crate) struct ResourcesConfig {
    pub resources: Vec<String>,
}

/// Renders the named resource templates and creates/updates every resulting
/// object. Done once every applied object is observed healthy.
#[derive(Debug, Clone)]
pub struct ApplyTask {
    resources: Vec<String>,
}

impl ApplyTask {
    /// Deserializes the kind-specific config.
    pub fn from_spec(name: &str, spec: &TaskSpec) -> Result<Self> {
        let config: ResourcesConfig = parse_config(name, spec)?;
        Ok(Self::new(config.resources))
    }

    /// Builds an apply task over the given resource template names.
    pub fn new(resources: Vec<String>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl Task for ApplyTask {
    async fn run(&self, ctx: &Context<'_>) -> Result<bool> {
        let objects = ctx.render_resources(&self.resources)?;

        let mut all_healthy = true;
        for object in &objects {
            let observed = ctx.client.apply(object).await.map_err(|e| {
                EngineError::transient(format!(
                    "failed to apply {} \"{}\": {e}",
                    object.kind(),
                    object.name()
                ))
            })?;
            if !health::is_healthy(&observed) {
                log::debug!(
                    "{} \"{}\" is not healthy yet",
                    observed.kind(),
                    observed.name()
                );
                all_healthy = false;
            }
        }
        Ok(all_healthy)
    }
}
