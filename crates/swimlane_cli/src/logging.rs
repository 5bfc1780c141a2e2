//! Logging initialization for the swimlane CLI.
//!
//! Filter directives come from the `SWIMLANE_LOG` environment variable and
//! fall back to `info`.
//!
//! ```bash
//! SWIMLANE_LOG=debug swimlane deck steps.xlsx --lane Role --label Step --order Seq --filter Flow
//! SWIMLANE_LOG=swimlane_core=debug,warn swimlane sheets steps.xlsx
//! ```

use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding filter directives.
pub const C_ENV_LOG: &str = "SWIMLANE_LOG";

/// Install the global stderr subscriber. Call once, at startup.
pub fn init() {
    let filter = EnvFilter::try_from_env(C_ENV_LOG).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
