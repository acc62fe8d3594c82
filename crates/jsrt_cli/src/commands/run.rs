use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use jsrt::{HostValue, JsError};
use jsrt_config::RuntimeConfig;
use log::{debug, info};

use crate::commands::{runtime, script_error};
use crate::utils::styles::fmt_dimmed;

#[derive(Debug, Clone, Parser)]
pub struct RunCmd {
    /// Script file to run
    pub file: Utf8PathBuf,

    /// Run the script this many times in the same context
    #[arg(long, short = 'n', default_value_t = 1)]
    pub repeat: u32,
}

impl RunCmd {
    pub(crate) async fn handle(&self, cfg: &RuntimeConfig) -> Result<()> {
        let script = tokio::fs::read_to_string(&self.file)
            .await
            .with_context(|| format!("Failed to read script {}", self.file))?;

        let runtime = runtime(cfg)?;
        let context = runtime.create_context()?;
        let value = context
            .execute_async(|| async {
                let mut value = HostValue::Empty;
                for pass in 1..=self.repeat.max(1) {
                    value = runtime.run_script(&script, Some(self.file.as_str()))?;
                    debug!("Pass {pass} of {} finished", self.repeat);
                    tokio::task::yield_now().await;
                }
                Ok::<_, JsError>(value)
            })
            .await?
            .map_err(script_error)?;

        info!("{value}");
        if runtime.cache_parsed_scripts() {
            info!(
                "{}",
                fmt_dimmed(&format!(
                    "{} parsed script(s) cached",
                    runtime.parsed_script_count()
                ))
            );
        }
        Ok(())
    }
}
