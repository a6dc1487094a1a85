//! # lith-client
//!
//! Glue between a relay transport and the entity graph: the [`Session`]
//! context, the async connection task, persisted settings and runtime
//! configuration.

pub mod config;
pub mod connection;
pub mod events;
pub mod session;
pub mod settings;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use connection::spawn_connection;
pub use events::{ConnectionCommand, ConnectionNotification};
pub use session::{Session, SkippedFrame};
pub use settings::{Settings, SettingsError, SettingsStore};

/// Install the global subscriber, honouring `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("lith=info,lith_client=info,lith_store=info,lith_proto=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
