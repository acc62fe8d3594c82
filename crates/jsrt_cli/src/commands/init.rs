use anyhow::Result;
use camino::Utf8Path;
use clap::Parser;
use jsrt_config::{RuntimeConfig, RuntimeVersion};
use log::info;

use crate::utils::styles::{fmt_bold, fmt_dimmed, fmt_success};

#[derive(Debug, Clone, Parser)]
pub struct InitCmd {
    /// Overwrite an existing configuration file
    #[arg(long, short)]
    pub force: bool,

    /// Cache parsed scripts per context
    #[arg(long)]
    pub cache: bool,

    /// Memory limit of the runtime in bytes
    #[arg(long)]
    pub memory_limit: Option<u64>,
}

impl InitCmd {
    pub(crate) fn handle(&self, path: &Utf8Path) -> Result<RuntimeConfig> {
        if path.exists() && !self.force {
            anyhow::bail!(
                "A jsrt config already exists at {}, pass --force to overwrite it",
                fmt_dimmed(path.as_str())
            );
        }

        let cfg = RuntimeConfig::default()
            .with_version(RuntimeVersion::Edge)
            .with_cache_parsed_scripts(self.cache)
            .with_memory_limit(self.memory_limit)
            .with_path(path);
        cfg.save()?;

        info!(
            "{}",
            fmt_success(&format!(
                "{name} configuration created: {path}",
                name = fmt_bold("jsrt"),
                path = fmt_dimmed(cfg.path().as_str()),
            ))
        );
        Ok(cfg)
    }
}
