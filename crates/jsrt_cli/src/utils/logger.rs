use log::{Level, LevelFilter};
use std::io::Write;

/// Crates whose records reach the terminal below trace level.
const HOST_CRATES: [&str; 4] = ["jsrt", "jsrt_variant", "jsrt_config", "jsrt_cli"];

/// `-q` wins over any `-v`.
pub(crate) fn level_filter(quiet: bool, verbose: u8) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

pub fn init_logger(quiet: bool, verbose: u8) {
    let filter = level_filter(quiet, verbose);
    let mut builder = env_logger::builder();

    if filter == LevelFilter::Trace {
        builder.filter_level(filter);
    } else {
        builder.filter_level(LevelFilter::Off);
        for name in HOST_CRATES {
            builder.filter_module(name, filter);
        }
    }

    // Script output and command results print bare; only problems get a tag.
    if filter <= LevelFilter::Info {
        builder.format(|buf, record| {
            if record.level() == Level::Info {
                writeln!(buf, "{}", record.args())
            } else {
                let style = buf.default_level_style(record.level());
                writeln!(buf, "{style}[{}]{style:#} {}", record.level(), record.args())
            }
        });
    }

    let _ = builder.try_init();
}
