use clap::Subcommand;
use std::path::PathBuf;

pub mod generate;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replace secret placeholders in manifests and print them to stdout
    Generate {
        /// Manifest file, directory of manifests, or `-` for standard input
        path: String,

        /// Config file (YAML, JSON or env format) with AVP_* and VAULT_* settings
        #[arg(short = 'c', long)]
        config_path: Option<PathBuf>,

        /// Base directory for decrypted secret files; `GIT_ROOT/...` is
        /// resolved against the repository root
        #[arg(short = 'd', long)]
        secret_dir: Option<String>,

        /// Print debug diagnostics to stderr. May include secret values
        #[arg(long)]
        verbose_sensitive_output: bool,
    },
}

impl Commands {
    /// Whether diagnostic output was requested
    #[must_use]
    pub fn verbose(&self) -> bool {
        match self {
            Commands::Generate {
                verbose_sensitive_output,
                ..
            } => *verbose_sensitive_output,
        }
    }
}
