//! Check command
//!
//! Validates the configuration and its policy tables without dispatching
//! anything.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use lazyinit::policy::Classification;

/// Arguments for the check command
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    /// Print the classified names as well
    #[arg(long)]
    pub list: bool,
}

impl CheckArgs {
    /// Execute the check command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        if let Some(err) = &ctx.config_error {
            ctx.output.error(&format!("Failed to load config: {}", err));
            return Ok(lazyinit::error::Error::Config(err.clone()).exit_code());
        }

        if let Err(e) = ctx.config.validate() {
            ctx.output.error(&e.to_string());
            return Ok(e.exit_code());
        }

        let policy = ctx.config.to_policy();
        ctx.output.info(&format!(
            "policy ok: {} eligible, {} deferred, {} ignored, {} built in ({} mode)",
            policy.names(Classification::Eligible).len(),
            policy.names(Classification::DeferredToEnd).len(),
            policy.names(Classification::Ignored).len(),
            policy.builtin_count(),
            ctx.config.mode(),
        ));

        if self.list {
            for class in [
                Classification::Eligible,
                Classification::DeferredToEnd,
                Classification::Ignored,
            ] {
                for name in policy.names(class) {
                    ctx.output.classification(name, class, policy.is_builtin(name));
                }
            }
        }

        Ok(0)
    }
}
