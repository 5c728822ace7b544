// SPDX-License-Identifier: GPL-3.0-or-later

use covdata::{args, config, context, modes};
use log::LevelFilter;
use std::process::ExitCode;

/// Driver function of the application.
fn main() -> anyhow::Result<ExitCode> {
    // Parse the command line first, the verbosity decides the log level.
    let matches = args::cli().get_matches();
    init_logging(matches.get_count("verbose"));
    log::info!(
        "{} v{} on {}/{} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::FAMILY,
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    let context = context::Context::capture()?;
    log::info!("{context}");
    let arguments = args::Arguments::try_from(matches)?;
    log::info!("{arguments}");
    let configuration = config::Loader::load(&context, &arguments.config)?;
    log::info!("{configuration}");

    let application = modes::Mode::configure(context, arguments, configuration)?;
    let result = application.run();
    log::debug!("Exit code: {result:?}");

    Ok(result)
}

/// `RUST_LOG` wins over the command line flags when it is set.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();
}
