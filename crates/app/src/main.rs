// CLI modules
mod args;
mod op;
mod ops;

// State directory, persistence and logging
mod logging;
mod registry;
mod session;
mod state;
mod version;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{Download, Init, Keygen, Lock, Ls, Register, Share, Unlock, Upload, Version};

command_enum! {
    (Init, Init),
    (Register, Register),
    (Upload, Upload),
    (Download, Download),
    (Ls, Ls),
    (Share, Share),
    (Lock, Lock),
    (Unlock, Unlock),
    (Keygen, Keygen),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logging follows the state directory's config when there is one
    let config = state::AppState::load(args.config_path.clone())
        .map(|state| state.config)
        .unwrap_or_default();
    let guards = logging::init_logging(&config);

    let ctx = op::OpContext::new(args.config_path);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            drop(guards);
            std::process::exit(1);
        }
    }
}
