use anyhow::Result;
use clap::Parser;
use jsrt_config::RuntimeConfig;
use log::info;

use crate::commands::{runtime, script_error};
use crate::utils::styles::{fmt_bold, fmt_dimmed};

#[derive(Debug, Clone, Parser)]
pub struct VersionCmd;

impl VersionCmd {
    pub(crate) fn handle(&self, cfg: &RuntimeConfig) -> Result<()> {
        let runtime = runtime(cfg)?;
        let context = runtime.create_context()?;
        let version = context
            .execute_with_result(|| context.engine_version())?
            .map_err(script_error)?;

        info!("{} {version}", fmt_bold("JsRT engine"));
        info!(
            "{}",
            fmt_dimmed(&format!(
                "language version {}, {} bytes in use",
                cfg.version,
                runtime.memory_usage()?
            ))
        );
        Ok(())
    }
}
