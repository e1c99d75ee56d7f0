use chrono::Utc;
use clap::Parser;
use color_eyre::eyre::Result;
use log::*;

use release_notes_hook::{
    cli::{Args, Command},
    handler::{AzureConnector, ReleaseNotesHandler},
    server,
};

fn initialize_logger(debug: bool) -> Result<()> {
    let filter = if debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("release_notes_hook")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli_args = Args::parse();

    initialize_logger(cli_args.debug)?;

    let config = cli_args.config()?;
    let handler = ReleaseNotesHandler::new(config, AzureConnector);

    match &cli_args.command {
        Command::Serve { address } => server::serve(address, handler).await?,
        Command::Generate(generate) => {
            let event = generate.load_event().await?;
            let outcome = handler.handle(event, Utc::now()).await?;

            if outcome.stored {
                info!(
                    "release notes written to {}/{}",
                    outcome.document.container, outcome.document.name
                );
            } else {
                println!("{}", outcome.document.content);
            }
        }
    }

    Ok(())
}
