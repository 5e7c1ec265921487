//! # Logging
//!
//! tracing setup for the binary and the bridge from core notifications to
//! log events.
//!
//! - `ROLLBOOK_LOG_FORMAT=json` switches to machine-parseable JSON lines
//! - `RUST_LOG` overrides the default filter

use rollbook_core::{Notification, NotificationLevel, NotificationSink};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "rollbook=info,rollbook_core=info,tower_http=debug";

/// Install the global tracing subscriber.
pub fn init_tracing() {
    let log_format = std::env::var("ROLLBOOK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

/// Forwards core notifications to tracing: successes at INFO, failures at WARN.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => {
                tracing::info!(event = "attendance", "{}", notification.message);
            }
            NotificationLevel::Failure => {
                tracing::warn!(event = "attendance", "{}", notification.message);
            }
        }
    }
}
