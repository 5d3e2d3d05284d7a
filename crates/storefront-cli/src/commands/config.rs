use anyhow::Result;
use colored::Colorize;
use storefront_client::ClientConfig;

use crate::cli::OutputFormat;
use crate::output::print_value;

pub fn show(config: &ClientConfig, source: Option<&str>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_value(&serde_json::to_value(config)?, format),
        OutputFormat::Table => {
            println!(
                "{}: {}",
                "Source".cyan(),
                source.unwrap_or(storefront_client::config::loader::DEFAULT_CONFIG_FILE)
            );
            println!("{}", toml::to_string_pretty(config)?);
        }
    }
    Ok(())
}
