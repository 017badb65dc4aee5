/// Installs the global logger.
///
/// Logs go to stderr so that rendered notes on stdout stay clean.
/// Level is Debug in development builds and Info in production builds;
/// `RUST_LOG` overrides both.
pub fn init() {
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        // Keep HTTP internals quiet unless asked for
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("hyper", log::LevelFilter::Warn)
        .parse_default_env()
        .try_init();
}
