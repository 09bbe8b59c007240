use tracing_subscriber::EnvFilter;

use crate::report::OutputStyle;

/// Maps `-v` repetitions to a filter directive for this crate.
pub fn directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "sasquatrr=warn",
        1 => "sasquatrr=info",
        2 => "sasquatrr=debug",
        _ => "sasquatrr=trace",
    }
}

/// Installs the global subscriber on stderr. `RUST_LOG` takes precedence over
/// `verbosity`. Returns `false` if a subscriber was already installed.
pub fn init(verbosity: u8, style: OutputStyle) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(style.color)
        .with_target(false)
        .try_init()
        .is_ok()
}
