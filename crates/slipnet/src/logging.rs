//! Logging setup

use tracing_subscriber::EnvFilter;

/// Pick the filter directive: configured level, else the persisted
/// debug flag. `RUST_LOG` still overrides both in [`init_tracing`].
pub fn filter_directive(configured: Option<&str>, debug_logging: bool) -> String {
    match configured {
        Some(level) if !level.trim().is_empty() => level.trim().to_string(),
        _ if debug_logging => "debug".to_string(),
        _ => "warn,slipnet=info,slipnet_store=info".to_string(),
    }
}

/// Install the global subscriber (compact or JSON)
pub fn init_tracing(directive: &str, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .flatten_event(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .compact()
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(Some("trace"), false), "trace");
        assert_eq!(filter_directive(Some("  "), true), "debug");
        assert_eq!(filter_directive(None, true), "debug");
        assert!(filter_directive(None, false).starts_with("warn"));
    }
}
