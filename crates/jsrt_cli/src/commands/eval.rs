use anyhow::Result;
use clap::Parser;
use jsrt_config::RuntimeConfig;
use log::info;

use crate::commands::{runtime, script_error};

#[derive(Debug, Clone, Parser)]
pub struct EvalCmd {
    /// Script source to evaluate
    pub script: String,
}

impl EvalCmd {
    pub(crate) fn handle(&self, cfg: &RuntimeConfig) -> Result<()> {
        let runtime = runtime(cfg)?;
        let context = runtime.create_context()?;
        let value = context
            .execute_with_result(|| runtime.run_script(&self.script, None))?
            .map_err(script_error)?;

        info!("{value}");
        Ok(())
    }
}
