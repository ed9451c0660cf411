pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lockbox")]
#[command(about = "Encrypted file storage with per-user RSA keys and file sharing")]
pub struct Args {
    /// Path to the lockbox state directory (defaults to ~/.lockbox)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
