use crate::config::SyncConfig;
use crate::digest::HashAlgorithm;
use clap::Parser;
use std::path::PathBuf;

/// Mirror a block device or image file to a remote host, sending only the
/// blocks that changed since the last run.
#[derive(Parser, Debug)]
#[command(name = "blocksync")]
#[command(version)]
#[command(about = "Back up block devices over the network, one changed block at a time")]
#[command(after_help = "Examples:\n  \
    sudo blocksync /dev/sda user@backuphost /backup/sda.img\n  \
    blocksync -b 4194304 /dev/vg0/root backuphost:2222 /backup/root.img")]
pub struct Cli {
    /// Source device or file
    #[arg(required_unless_present = "server")]
    pub source: Option<PathBuf>,

    /// Destination host: [user@]host[:port], or "local" to run without ssh
    #[arg(required_unless_present = "server")]
    pub host: Option<String>,

    /// Destination path on the host (defaults to the source path)
    pub dest: Option<String>,

    /// Serve DEST over stdin/stdout (started by the driving side)
    #[arg(long, value_name = "DEST", conflicts_with_all = ["source", "host", "dest", "json"])]
    pub server: Option<String>,

    /// Block size in bytes [default: 1048576]
    #[arg(short, long, env = "BLOCKSYNC_BLOCK_SIZE")]
    pub block_size: Option<u64>,

    /// Block digest algorithm [default: sha1]
    #[arg(long, value_enum)]
    pub hash: Option<HashAlgorithm>,

    /// blocksync executable on the destination host
    #[arg(long, env = "BLOCKSYNC_REMOTE_PROGRAM")]
    pub remote_program: Option<String>,

    /// ssh executable
    #[arg(long)]
    pub ssh_program: Option<String>,

    /// Extra argument for ssh (repeatable)
    #[arg(long = "ssh-option", value_name = "ARG", allow_hyphen_values = true)]
    pub ssh_options: Vec<String>,

    /// Config file [default: <config dir>/blocksync/config.toml]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Verbosity (-v info detail, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Apply command-line overrides on top of `config`.
    pub fn apply(&self, mut config: SyncConfig) -> SyncConfig {
        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if let Some(hash) = self.hash {
            config.hash = hash;
        }
        if let Some(program) = &self.remote_program {
            config.remote_program = program.clone();
        }
        if let Some(program) = &self.ssh_program {
            config.ssh_program = program.clone();
        }
        if !self.ssh_options.is_empty() {
            config.ssh_args = self.ssh_options.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_invocation() {
        let cli = Cli::try_parse_from([
            "blocksync",
            "-b",
            "4096",
            "/dev/sda",
            "root@nas",
            "/backup/sda.img",
        ])
        .unwrap();
        assert_eq!(cli.source, Some(PathBuf::from("/dev/sda")));
        assert_eq!(cli.host.as_deref(), Some("root@nas"));
        assert_eq!(cli.dest.as_deref(), Some("/backup/sda.img"));
        assert_eq!(cli.block_size, Some(4096));
        assert!(cli.server.is_none());
    }

    #[test]
    fn test_parse_server_invocation() {
        let cli = Cli::try_parse_from([
            "blocksync",
            "--server",
            "/backup/sda.img",
            "--block-size",
            "4096",
            "--hash",
            "blake3",
        ])
        .unwrap();
        assert_eq!(cli.server.as_deref(), Some("/backup/sda.img"));
        assert_eq!(cli.hash, Some(HashAlgorithm::Blake3));
    }

    #[test]
    fn test_client_requires_host() {
        assert!(Cli::try_parse_from(["blocksync", "/dev/sda"]).is_err());
    }

    #[test]
    fn test_server_conflicts_with_positionals() {
        assert!(Cli::try_parse_from(["blocksync", "--server", "/a", "/b", "host"]).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::try_parse_from([
            "blocksync",
            "--hash",
            "blake3",
            "--ssh-option",
            "-oCompression=no",
            "src",
            "host",
        ])
        .unwrap();
        let config = cli.apply(SyncConfig::default());
        assert_eq!(config.hash, HashAlgorithm::Blake3);
        assert_eq!(config.ssh_args, vec!["-oCompression=no"]);
        assert_eq!(config.block_size, 1024 * 1024);
    }
}
