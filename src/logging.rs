//! Tracing setup.
//!
//! Logs always go to stderr: in server mode stdout is the protocol stream.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Which role the process runs; the serving role is quieter by default since
/// its stderr is relayed to the driving side's terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

fn level(role: Role, verbosity: u8) -> &'static str {
    let base: u8 = match role {
        Role::Client => 2,
        Role::Server => 1,
    };
    match base.saturating_add(verbosity) {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}

/// Initialize logging. `RUST_LOG` overrides the verbosity flags.
pub fn init_logging(role: Role, verbosity: u8) -> anyhow::Result<()> {
    let level = level(role, verbosity);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("blocksync={}", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= 2)
                .without_time(),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}
