mod catalog;
mod cli;
mod color;
mod config;
mod providers;
mod registry;
mod service;
mod state;
mod store;
mod utils;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cli::{chat::chat_cmd, configure, list::list_cmd, open_service, ColorMode};
use tracing_subscriber::EnvFilter;

#[derive(Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "modelgate")]
#[command(
    about = "Configure, verify, and chat with LLM provider models",
    version = "0.0.1"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
    /// Read settings from this file instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log diagnostics to standard error
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the state of the active model
    Status(StatusArgs),
    /// Replace the configuration with a single model
    Setup(SetupArgs),
    /// Change the model or API key of the active model
    Update(UpdateArgs),
    /// Check that the active model accepts requests
    Verify,
    /// Remove all configured models
    Reset,
    /// Make another configured model the active one
    Activate(ActivateArgs),
    /// Chat with the active model
    Chat(ChatArgs),
    /// List providers, models, or configured entries
    List(ListArgs),
    /// Add a model to the catalog of a provider
    AddModel(AddModelArgs),
}

#[derive(Args)]
pub(crate) struct StatusArgs {
    /// Output the status with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

#[derive(Args)]
pub(crate) struct SetupArgs {
    /// The provider serving the model
    provider: String,
    /// The vendor model identifier
    model: String,
    /// The API key used to authenticate with the provider
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args)]
pub(crate) struct UpdateArgs {
    /// The new vendor model identifier
    #[arg(long)]
    model: Option<String>,
    /// The new API key; a blank key is ignored
    #[arg(long)]
    api_key: Option<String>,
    /// Verify the model once the update is applied
    #[arg(long)]
    verify: bool,
}

#[derive(Args)]
pub(crate) struct ActivateArgs {
    /// The registry id of the model, as shown by `list entries`
    id: String,
}

#[derive(Args)]
pub(crate) struct ChatArgs {
    /// The registry id of the model; it must be the active one
    #[arg(short, long)]
    model_id: Option<String>,
    /// Enter interactive mode
    #[arg(short, long)]
    interactive: bool,
    /// Specify the initial prompt
    prompt: Option<String>,
}

/// Possible listings
#[derive(Subcommand)]
pub(crate) enum ListObject {
    /// Providers which can be set up
    Providers,
    /// Models offered for a provider
    Models(ListModelArgs),
    /// Configured registry entries
    Entries,
}

/// Output formats
#[derive(ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Args)]
pub(crate) struct ListArgs {
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
    /// List the specified object
    #[command(subcommand)]
    object: ListObject,
}

#[derive(Args)]
pub(crate) struct ListModelArgs {
    /// The provider whose models are listed
    #[arg(short, long)]
    provider: String,
}

#[derive(Args)]
pub(crate) struct AddModelArgs {
    /// The provider offering the model
    provider: String,
    /// The vendor model identifier
    id: String,
    /// A human readable name
    name: String,
    /// The endpoint serving the model, for OpenAI-compatible servers
    #[arg(long)]
    base_url: Option<String>,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let color = ColorMode::resolve_auto(cli.color);
    color::configure_color(color);

    let service = open_service(cli.config);

    match &cli.command {
        Commands::Status(args) => configure::status_cmd(&service, args),
        Commands::Setup(args) => configure::setup_cmd(&service, args).await,
        Commands::Update(args) => configure::update_cmd(&service, args).await,
        Commands::Verify => configure::verify_cmd(&service).await,
        Commands::Reset => configure::reset_cmd(&service).await,
        Commands::Activate(args) => configure::activate_cmd(&service, args).await,
        Commands::Chat(args) => chat_cmd(&service, args).await,
        Commands::List(args) => list_cmd(&service, args),
        Commands::AddModel(args) => configure::add_model_cmd(&service, args),
    }
}
