//! Delete task: render, enhance and remove resources.

use async_trait::async_trait;

use super::apply::ResourcesConfig;
use super::{parse_config, Context, Task};
use crate::error::{EngineError, Result};
use crate::external::ExternalError;
use crate::models::TaskSpec;

/// Renders the named resource templates and issues foreground-cascading
/// deletes. Deletion is not health-gated: the task is done once the delete
/// calls complete, and "already absent" counts as success.
#[derive(Debug, Clone)]
pub struct DeleteTask {
    resources: Vec<String>,
}

impl DeleteTask {
    /// Deserializes the kind-specific config.
    pub fn from_spec(name: &str, spec: &TaskSpec) -> Result<Self> {
        let config: ResourcesConfig = parse_config(name, spec)?;
        Ok(Self::new(config.resources))
    }

    /// Builds a delete task over the given resource template names.
    pub fn new(resources: Vec<String>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl Task for DeleteTask {
    async fn run(&self, ctx: &Context<'_>) -> Result<bool> {
        let objects = ctx.render_resources(&self.resources)?;

        for object in &objects {
            match ctx.client.delete(&object.key()).await {
                Ok(()) | Err(ExternalError::NotFound) => {}
                Err(e) => {
                    return Err(EngineError::transient(format!(
                        "failed to delete {} \"{}\": {e}",
                        object.kind(),
                        object.name()
                    )));
                }
            }
        }
        Ok(true)
    }
}
