//! Logging setup.
//!
//! Diagnostics go through `tracing` to stderr so they never mix with the
//! pipelines' stdout output. `RUST_LOG` picks the level (default `warn`);
//! `PANDA_LOG_FORMAT=json` switches to one JSON object per line.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let use_json = std::env::var("PANDA_LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
