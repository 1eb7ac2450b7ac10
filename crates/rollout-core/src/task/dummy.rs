//! Dummy task: a configurable no-op for exercising the engine's control flow.

use async_trait::async_trait;
use serde::Deserialize;

use super::{parse_config, Context, Task};
use crate::error::{EngineError, Result};
use crate::models::TaskSpec;

/// A side-effect-free task configured to succeed, stay not-done, or fail
/// transiently or fatally.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct DummyTask {
    /// Value reported when no error is requested
    pub done: bool,

    /// Whether to report an error
    pub want_err: bool,

    /// Whether the reported error is fatal
    pub fatal: bool,
}

impl DummyTask {
    /// Deserializes the kind-specific config.
    pub fn from_spec(name: &str, spec: &TaskSpec) -> Result<Self> {
        parse_config(name, spec)
    }
}

#[async_trait]
impl Task for DummyTask {
    async fn run(&self, _ctx: &Context<'_>) -> Result<bool> {
        if self.want_err {
            if self.fatal {
                return Err(EngineError::fatal("dummy task failed fatally"));
            }
            return Err(EngineError::transient("dummy task failed"));
        }
        Ok(self.done)
    }
}
