use crate::domain::model::{CommandOutcome, Invocation};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Runs one external command to completion.
///
/// A non-zero exit is still `Ok`: the caller decides what failure means.
/// `Err` is reserved for commands that could not be started or were cut off.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutcome>;
}
