use crate::args::LogLevel;

/// Route the `log` facade to stderr. `RUST_LOG`, when set, wins over `--log-level`.
pub fn init(level: LogLevel) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level.filter())
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false);

    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    // Only fails when a logger is already installed (e.g. repeated in tests)
    let _ = builder.try_init();
}
