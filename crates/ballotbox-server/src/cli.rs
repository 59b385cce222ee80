use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ballotbox-server", about = "Poll publishing and voting server")]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "ballotbox.toml")]
    pub config: PathBuf,

    /// Override the bind address from the config file.
    #[arg(long)]
    pub bind: Option<String>,
}
