use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "haven", version, about = "Session bring-up and settings store")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the legacy storage migration and print its report.
    Migrate,
    #[command(subcommand)]
    Settings(SettingsCommand),
    #[command(subcommand)]
    Store(StoreCommand),
    #[command(subcommand)]
    Session(SessionCommand),
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Show every known setting with its current value.
    List,
    Get {
        key: String,
    },
    Set {
        key: String,
        value: String,
    },
    /// Switch network tracking between fast and slow.
    ToggleTracking,
}

#[derive(Subcommand, Debug)]
pub enum StoreCommand {
    Keys,
    Get {
        key: String,
    },
    Delete {
        key: String,
    },
    /// Remove every key from the persistent store.
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Bring the session up with the given password.
    Up(SessionUpArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SessionUpArgs {
    #[arg(long, env = "HAVEN_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// After connecting, poll node registration until the identity is ready.
    #[arg(long)]
    pub wait_registration: bool,

    /// Keep the session running until interrupted.
    #[arg(long)]
    pub hold: bool,
}
