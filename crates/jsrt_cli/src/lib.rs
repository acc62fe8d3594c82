pub mod commands;
pub mod utils;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use jsrt_config::RuntimeConfig;

use crate::commands::{eval::EvalCmd, init::InitCmd, run::RunCmd, version::VersionCmd};

#[derive(Parser)]
#[command(name = "jsrt")]
#[command(version)]
#[command(about = "jsrt - JavaScript on the system JsRT engine")]
#[command(
    long_about = "jsrt hosts the JavaScript engine that ships with Windows through its JsRT API. \
Scripts run inside a runtime configured from jsrt.json; results are converted to host values \
and printed."
)]
#[command(after_help = "EXAMPLES:\n  \
    jsrt init\n  \
    jsrt eval \"1 + 2\"\n  \
    jsrt run script.js --repeat 3\n  \
    jsrt version\n\
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path, defaults to ./jsrt.json
    #[arg(long, short = 'c', global = true, default_value_t = RuntimeConfig::default_path())]
    pub config: Utf8PathBuf,

    /// No logging except for errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Verbose logging (-v) or trace logging (-vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Cli {
    #[allow(clippy::missing_errors_doc)]
    pub async fn handle(&self) -> anyhow::Result<()> {
        match &self.command {
            Commands::Init(cmd) => cmd.handle(&self.config).map(|_| ()),
            Commands::Eval(cmd) => cmd.handle(&RuntimeConfig::load(&self.config)?),
            Commands::Run(cmd) => cmd.handle(&RuntimeConfig::load(&self.config)?).await,
            Commands::Version(cmd) => cmd.handle(&RuntimeConfig::load(&self.config)?),
        }
    }
}

#[derive(Debug, Subcommand)]
#[command(styles=utils::styles::get_styles())]
pub enum Commands {
    /// Evaluate a script given on the command line
    #[command(long_about = "Evaluate a script in a fresh context and print its completion value.")]
    Eval(EvalCmd),

    /// Run a script file
    #[command(
        long_about = "Run a script file in a fresh context and print its completion value. \
With --repeat the script runs several times in the same context, which reuses the parsed \
script when cache_parsed_scripts is enabled."
    )]
    Run(RunCmd),

    /// Print the engine version
    #[command(long_about = "Print the script engine version and runtime memory statistics.")]
    Version(VersionCmd),

    /// Initialize configuration file
    #[command(long_about = "Initialize jsrt.json configuration file.")]
    Init(InitCmd),
}
