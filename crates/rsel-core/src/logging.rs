#![forbid(unsafe_code)]

//! Logging facade.
//!
//! Library code logs through `tracing` macros; installing a subscriber is the
//! host's job. With the `tracing-json` feature this module also offers a
//! one-call JSON subscriber for production hosts.
//!
//! Filtering follows `RUST_LOG` when set and falls back to the directive
//! passed by the host otherwise.

#[cfg(feature = "tracing")]
pub use tracing::{debug, debug_span, error, info, info_span, trace, warn};

/// Install a global JSON `tracing` subscriber.
///
/// Returns an error when the filter directive does not parse or a global
/// subscriber is already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging(
    default_directive: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::EnvFilter;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)?,
    };
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .try_init()
}
