//! Server session - spawns the serving role `blocksync --server`
//!
//! Provides raw stdin/stdout streams of the child. Protocol handling is done by
//! the driver.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::process::Stdio;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::digest::HashAlgorithm;

/// Command line the serving role is started with.
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    /// Program name (remote) or path (local) of blocksync.
    pub program: String,
    pub dest: String,
    pub block_size: u64,
    pub algorithm: HashAlgorithm,
}

impl RemoteCommand {
    fn args(&self) -> Vec<String> {
        vec![
            "--server".to_string(),
            self.dest.clone(),
            "--block-size".to_string(),
            self.block_size.to_string(),
            "--hash".to_string(),
            self.algorithm.name().to_string(),
        ]
    }
}

/// Quote `arg` for the remote login shell that ssh hands the command to.
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Manages the child process running the serving role.
pub struct ServerSession {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    command_line: String,
}

impl ServerSession {
    /// Start the serving role on a remote host through ssh.
    pub async fn connect_ssh(
        ssh_program: &str,
        ssh_args: &[String],
        host: &str,
        user: Option<&str>,
        port: Option<u16>,
        remote: &RemoteCommand,
    ) -> Result<Self> {
        let mut args: Vec<OsString> = ssh_args.iter().map(OsString::from).collect();

        if let Some(user) = user {
            args.push("-l".into());
            args.push(user.into());
        }
        if let Some(port) = port {
            args.push("-p".into());
            args.push(port.to_string().into());
        }
        args.push(host.into());

        // Remote command: blocksync --server <dest> --block-size <n> --hash <algo>
        args.push(shell_quote(&remote.program).into());
        args.extend(remote.args().iter().map(|a| OsString::from(shell_quote(a))));

        Self::spawn(ssh_program, args).await
    }

    /// Start the serving role as a local child process.
    pub async fn connect_local(remote: &RemoteCommand) -> Result<Self> {
        let args = remote.args().into_iter().map(OsString::from).collect();
        Self::spawn(&remote.program, args).await
    }

    async fn spawn(program: &str, args: Vec<OsString>) -> Result<Self> {
        let command_line = std::iter::once(program.to_string())
            .chain(args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ");

        let mut cmd = Command::new(program);
        cmd.args(&args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {}", program))?;

        let stdin = child.stdin.take().context("Failed to open stdin")?;
        let stdout = child.stdout.take().context("Failed to open stdout")?;

        Ok(Self {
            child,
            stdin,
            stdout,
            command_line,
        })
    }

    /// The command that was spawned, for logging.
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Split into stdin/stdout for protocol handling, keeping the child to
    /// collect its exit status.
    pub fn split(self) -> (ChildStdin, ChildStdout, Child) {
        (self.stdin, self.stdout, self.child)
    }
}
