pub mod cli;
pub mod migrate;
pub mod output;
pub mod session;
pub mod settings;
pub mod store;

use std::io::Write;

use haven_core::api::{AppContext, CliError, StorageMigrator};

use cli::{Commands, SessionCommand, SettingsCommand, StoreCommand};
use output::Output;

/// Run one command. Everything except `migrate` goes through the normal
/// startup (store open plus migration) first; `migrate` drives the migrator
/// itself so it can report what it did.
pub async fn dispatch<W: Write>(
    command: Commands,
    ctx: &AppContext,
    out: &mut Output<W>,
) -> Result<i32, CliError> {
    if !matches!(command, Commands::Migrate) {
        ctx.startup().await;
    }
    let kv = ctx.store();

    match command {
        Commands::Migrate => {
            let migrator = StorageMigrator::new(kv.clone(), ctx.legacy());
            migrate::run(&migrator, out).await
        }
        Commands::Settings(cmd) => match cmd {
            SettingsCommand::List => settings::list(kv, out).await,
            SettingsCommand::Get { key } => settings::get(kv, &key, out).await,
            SettingsCommand::Set { key, value } => settings::set(kv, &key, &value, out).await,
            SettingsCommand::ToggleTracking => {
                settings::toggle_tracking(&ctx.tracking().await, out).await
            }
        },
        Commands::Store(cmd) => match cmd {
            StoreCommand::Keys => store::keys(kv, out).await,
            StoreCommand::Get { key } => store::get(kv, &key, out).await,
            StoreCommand::Delete { key } => store::delete(kv, &key, out).await,
            StoreCommand::Clear { yes } => store::clear(kv, yes, out).await,
        },
        Commands::Session(SessionCommand::Up(up_args)) => {
            let controller = ctx.session_controller().await;
            session::up(&controller, &ctx.cfg().registration, &up_args, out).await
        }
    }
}
