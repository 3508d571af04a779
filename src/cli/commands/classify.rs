//! Classify command
//!
//! Prints how each name is treated by the configured policy tables.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;

/// Arguments for the classify command
#[derive(Parser, Debug, Clone)]
pub struct ClassifyArgs {
    /// Component names to classify
    #[arg(required = true)]
    pub names: Vec<String>,
}

impl ClassifyArgs {
    /// Execute the classify command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let policy = ctx.config.to_policy();
        for name in &self.names {
            ctx.output
                .classification(name, policy.classify(name), policy.is_builtin(name));
        }
        Ok(0)
    }
}
