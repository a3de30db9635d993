//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence; otherwise the level follows debug mode.

use tracing_subscriber::EnvFilter;

/// Default filter directive for the given mode.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug,hyper=info,sqlx=warn"
    } else {
        "info,sqlx=warn"
    }
}

/// Installs the global fmt subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_mode_is_more_verbose() {
        assert!(default_directive(true).starts_with("debug"));
        assert!(default_directive(false).starts_with("info"));
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(false);
        init(true);
    }
}
