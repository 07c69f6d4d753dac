//! Subscriber installation

use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const CRATES: [&str; 3] = ["idmap", "idmap_core", "idmap_store"];

/// Where and how log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines on stderr, debug and up
    Development,
    /// JSON lines on stderr, info and up
    Production,
    /// Nothing installed; tests use the capture layer
    Test,
}

impl Profile {
    /// Filter directive used when `RUST_LOG` is unset
    pub fn default_filter(&self) -> String {
        let level = match self {
            Profile::Development => "debug",
            Profile::Production => "info",
            Profile::Test => return "off".to_string(),
        };
        CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Only the first call in a process has any effect.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        if profile == Profile::Test {
            return;
        }
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(profile.default_filter()));
        let registry = tracing_subscriber::registry().with(filter);

        // try_init: the global slot may already be taken
        let _ = match profile {
            Profile::Production => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            _ => registry
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init(),
        };
    });
}
