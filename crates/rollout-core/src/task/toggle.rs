//! Toggle task: apply or delete a resource set based on a boolean parameter.

use async_trait::async_trait;
use serde::Deserialize;

use super::{parse_config, ApplyTask, Context, DeleteTask, Task};
use crate::error::{EngineError, Result};
use crate::models::TaskSpec;

#[derive(Debug, Deserialize)]
struct ToggleConfig {
    parameter: String,
    resources: Vec<String>,
}

/// Reads a named instance parameter as a boolean and delegates to an Apply
/// task (true) or a Delete task (false) over the same resource set.
#[derive(Debug, Clone)]
pub struct ToggleTask {
    parameter: String,
    resources: Vec<String>,
}

impl ToggleTask {
    /// Deserializes the kind-specific config.
    pub fn from_spec(name: &str, spec: &TaskSpec) -> Result<Self> {
        let config: ToggleConfig = parse_config(name, spec)?;
        Ok(Self {
            parameter: config.parameter,
            resources: config.resources,
        })
    }

    fn enabled(&self, ctx: &Context<'_>) -> Result<bool> {
        let value = ctx.parameters.get(&self.parameter).ok_or_else(|| {
            EngineError::fatal(format!(
                "toggle parameter \"{}\" is not set",
                self.parameter
            ))
        })?;
        if value.trim().is_empty() {
            return Err(EngineError::fatal(format!(
                "toggle parameter \"{}\" is empty",
                self.parameter
            )));
        }
        value.trim().to_lowercase().parse::<bool>().map_err(|_| {
            EngineError::fatal(format!(
                "toggle parameter \"{}\" is not a boolean: {value:?}",
                self.parameter
            ))
        })
    }
}

#[async_trait]
impl Task for ToggleTask {
    async fn run(&self, ctx: &Context<'_>) -> Result<bool> {
        if self.enabled(ctx)? {
            ApplyTask::new(self.resources.clone()).run(ctx).await
        } else {
            DeleteTask::new(self.resources.clone()).run(ctx).await
        }
    }
}
