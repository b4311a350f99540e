//! Transport bootstrap: how the driving side reaches a serving role.

pub mod server;

pub use server::{RemoteCommand, ServerSession};

use crate::error::{Result, SyncError};

/// Where the serving role runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Over ssh, `[user@]host[:port]`; IPv6 hosts as `addr` or `[addr]:port`.
    Ssh {
        host: String,
        user: Option<String>,
        port: Option<u16>,
    },
    /// As a local child process, no ssh involved.
    Local,
}

impl Endpoint {
    /// Literal host value selecting [`Endpoint::Local`].
    pub const LOCAL: &'static str = "local";

    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(SyncError::Config("empty destination host".to_string()));
        }
        if spec == Self::LOCAL {
            return Ok(Endpoint::Local);
        }

        let (user, rest) = match spec.split_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
            Some(_) => {
                return Err(SyncError::Config(format!("invalid destination host: {}", spec)))
            }
            None => (None, spec),
        };

        let parse_port = |port: &str| {
            port.parse::<u16>()
                .map_err(|_| SyncError::Config(format!("invalid port in {}", spec)))
        };

        // IPv6 literals take a port only in brackets: `[fe80::1]:2222`.
        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed.split_once(']').ok_or_else(|| {
                SyncError::Config(format!("unterminated '[' in {}", spec))
            })?;
            match after {
                "" => (host, None),
                _ => match after.strip_prefix(':') {
                    Some(port) => (host, Some(parse_port(port)?)),
                    None => {
                        return Err(SyncError::Config(format!(
                            "invalid destination host: {}",
                            spec
                        )))
                    }
                },
            }
        } else if rest.matches(':').count() > 1 {
            (rest, None)
        } else {
            match rest.split_once(':') {
                Some((host, port)) => (host, Some(parse_port(port)?)),
                None => (rest, None),
            }
        };
        if host.is_empty() {
            return Err(SyncError::Config(format!("invalid destination host: {}", spec)));
        }

        Ok(Endpoint::Ssh {
            host: host.to_string(),
            user,
            port,
        })
    }
}
