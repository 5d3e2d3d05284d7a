mod cli;
mod commands;
mod output;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};
use output::{print_error, print_notice};
use storefront_client::config::loader;
use storefront_client::observability::{apply_logging_level, init_tracing_from_config};
use storefront_client::{ApiClient, ClientConfig};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();
    let config = load_config(&cli)?;

    init_tracing_from_config(&config.logging);
    if let Some(directives) = &cli.log_level {
        if !apply_logging_level(directives) {
            print_notice(&format!("Ignoring invalid --log-level \"{directives}\""));
        }
    }

    match &cli.command {
        Commands::Config(args) => match args.command {
            ConfigCommands::Show => {
                commands::config::show(&config, cli.config.as_deref(), format)?;
            }
        },
        Commands::Key(args) => {
            let client = make_client(&config, None)?;
            commands::key::key(&client, args)?;
        }
        Commands::Get(args) => {
            let client = make_client(&config, cli.token.as_deref())?;
            commands::get::get(&client, &args.path, &args.query, format).await?;
        }
        Commands::Browse(args) => {
            let client = make_client(&config, cli.token.as_deref())?;
            commands::browse::browse(client, &config.catalog, args, format).await?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = loader::load_config(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
        config.validate().map_err(anyhow::Error::msg)?;
    }
    Ok(config)
}

fn make_client(config: &ClientConfig, token: Option<&str>) -> Result<ApiClient> {
    let client = ApiClient::builder(config.clone()).build()?;
    if let Some(token) = token {
        let lifetime = Duration::from_secs(config.auth.default_token_lifetime_secs);
        client.sign_in(token, lifetime);
    }
    Ok(client)
}
