//! Logging initialization for the seller front-end.

use log::LevelFilter;

/// Initialize logging for the application.
/// Should be called once at the start of main().
pub fn init_logging() {
    // try_init so that tests calling this repeatedly don't panic.
    let _ = env_logger::builder().filter_level(LevelFilter::Info).try_init();
}

/// Log level helper to determine if debug logging is enabled.
pub fn is_debug_enabled() -> bool {
    log::log_enabled!(log::Level::Debug)
}
