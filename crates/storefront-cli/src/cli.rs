use clap::{Parser, Subcommand, ValueEnum};
use storefront_catalog::SortMode;

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Storefront CLI: browse the catalog through the request pipeline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML config file (defaults to ./storefront.toml)
    #[arg(short, long, global = true, env = "STOREFRONT_CONFIG")]
    pub config: Option<String>,

    /// API base URL (overrides the config file)
    #[arg(short, long, global = true, env = "STOREFRONT_BASE_URL")]
    pub base_url: Option<String>,

    /// Access token to sign in with before sending requests
    #[arg(long, global = true, env = "STOREFRONT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Log filter applied over logging.level (a level or EnvFilter directives)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Browse a window of the product catalog
    Browse(BrowseArgs),
    /// GET an API path and print the JSON response
    Get(GetArgs),
    /// Print the deduplication key of a request
    Key(KeyArgs),
    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct BrowseArgs {
    /// Minimum price
    #[arg(long)]
    pub min_price: Option<u64>,
    /// Maximum price
    #[arg(long)]
    pub max_price: Option<u64>,
    /// Category id (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<u64>,
    /// Size (repeatable)
    #[arg(long = "size")]
    pub sizes: Vec<String>,
    /// Color (repeatable)
    #[arg(long = "color")]
    pub colors: Vec<String>,
    /// Sort mode (newest, price-asc, price-desc, best-selling, on-sale)
    #[arg(long, default_value = "newest")]
    pub sort: SortMode,
    /// First item index to show
    #[arg(long, default_value_t = 0)]
    pub from: u64,
    /// Last item index to show (defaults to one page)
    #[arg(long)]
    pub to: Option<u64>,
}

#[derive(clap::Args)]
pub struct GetArgs {
    /// Path relative to the base URL (e.g. /products/42)
    pub path: String,
    /// Query parameters as key=value pairs
    #[arg(short, long = "query", value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,
}

#[derive(clap::Args)]
pub struct KeyArgs {
    /// HTTP method
    #[arg(default_value = "GET")]
    pub method: String,
    /// Path relative to the base URL
    pub path: String,
    /// Query parameters as key=value pairs
    #[arg(short, long = "query", value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,
    /// JSON body
    #[arg(long)]
    pub body: Option<String>,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective config
    Show,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got \"{raw}\"")),
    }
}
