pub mod eval;
pub mod init;
pub mod run;
pub mod version;

use anyhow::{Result, anyhow};
use jsrt::{JsError, JsRuntime, NativeEngine};
use jsrt_config::RuntimeConfig;
use log::debug;
use std::sync::Arc;

#[cfg(windows)]
fn engine() -> Result<Arc<dyn NativeEngine>> {
    Ok(jsrt::ChakraEngine::shared())
}

#[cfg(not(windows))]
fn engine() -> Result<Arc<dyn NativeEngine>> {
    anyhow::bail!("The JsRT engine is only available on Windows")
}

/// A runtime built from `cfg` on the system engine.
pub(crate) fn runtime(cfg: &RuntimeConfig) -> Result<JsRuntime> {
    let runtime = JsRuntime::from_config(engine()?, cfg)?;
    debug!("Runtime ready ({} engine, {})", cfg.version, runtime);
    Ok(runtime)
}

/// Prefixes engine failures with their category.
pub(crate) fn script_error(err: JsError) -> anyhow::Error {
    match err.category() {
        Some(category) => anyhow!("{category} error: {err}"),
        None => err.into(),
    }
}
