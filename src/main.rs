//! Desktop agent CLI
//!
//! Command-line interface around the polling agent: one-shot commands for
//! auth, dashboard and sells, plus the `poll` loop that services the
//! backend's device command queue.

use clap::{Args, Parser, Subcommand};
use desk_agent::api::{BackendApi, PriceSource, SellAmount, SellIntent};
use desk_agent::commands::render;
use desk_agent::{
    AgentConfig, AgentStateHandle, CommandDispatcher, CommandPoller, ConfirmPolicy, Error,
    HttpBackend, JsonFileStore, Prompter, Result, StdinPrompter,
};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "desk-agent")]
#[command(about = "Desktop companion agent for a crypto portfolio backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show local agent status
    Status,

    /// Log in and store the token for desktop use
    Login {
        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        password: Option<String>,
    },

    /// Log out and remove the stored token
    Logout,

    /// Render the dashboard and sellable holdings
    Dashboard,

    /// Print transaction history
    Transactions,

    /// Sell workflow commands
    #[command(subcommand)]
    Sell(SellCommands),

    /// Poll the backend for device commands
    Poll {
        /// Run a single poll cycle and exit
        #[arg(long)]
        once: bool,

        /// Override poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Execute sell commands without asking
        #[arg(long, conflicts_with = "ask_before_sell")]
        auto_confirm: bool,

        /// Always ask before executing sell commands
        #[arg(long)]
        ask_before_sell: bool,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
enum SellCommands {
    /// List sellable assets
    Overview,

    /// Quote a prospective sell
    Preview(SellArgs),

    /// Execute a sell
    Execute {
        #[command(flatten)]
        args: SellArgs,

        /// Skip the preview + confirmation step
        #[arg(long)]
        skip_preview: bool,
    },
}

#[derive(Args)]
struct SellArgs {
    /// Asset id to sell
    #[arg(long)]
    asset_id: String,

    /// Quantity of the asset to sell
    #[arg(long)]
    quantity: Option<f64>,

    /// Alternatively sell by USD amount
    #[arg(long)]
    amount_usd: Option<f64>,

    /// Price source: coincap or coingecko
    #[arg(long, default_value = "coincap")]
    source: String,
}

impl SellArgs {
    fn into_intent(self) -> Result<SellIntent> {
        let source: PriceSource = self
            .source
            .parse()
            .map_err(|_| Error::Config(format!("unknown price source: {}", self.source)))?;
        let amount = match (self.quantity, self.amount_usd) {
            (Some(q), _) => SellAmount::Quantity(q),
            (None, Some(a)) => SellAmount::Usd(a),
            (None, None) => {
                return Err(Error::Config(
                    "provide --quantity or --amount-usd".to_string(),
                ))
            }
        };
        Ok(SellIntent {
            asset_id: self.asset_id,
            source,
            amount,
        })
    }
}

struct AppContext {
    config: AgentConfig,
    api: Arc<HttpBackend>,
    state: AgentStateHandle,
}

impl AppContext {
    async fn build(config_path: &std::path::Path) -> Result<Self> {
        let config = AgentConfig::load(config_path)?;
        let base_url = config.normalized_base_url()?;
        let state = AgentStateHandle::load(Arc::new(JsonFileStore::new(&config.state_path)));
        let token = state.access_token().await.map(SecretString::from);
        let api = Arc::new(HttpBackend::new(&base_url, token, config.verify_ssl)?);
        Ok(Self { config, api, state })
    }

    /// One-shot commands that need auth fail fast with a hint.
    async fn ensure_authenticated(&self) -> Result<()> {
        match self.state.access_token().await {
            Some(token) if !token.is_empty() => Ok(()),
            _ => Err(Error::command(
                "Desktop agent is not authenticated. Run `desk-agent login` first.",
            )),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let ctx = AppContext::build(&cli.config).await?;

    match cli.command {
        Commands::Status => run_status(&ctx).await,
        Commands::Login { email, password } => run_login(&ctx, email, password).await,
        Commands::Logout => run_logout(&ctx).await,
        Commands::Dashboard => run_dashboard(&ctx).await,
        Commands::Transactions => run_transactions(&ctx).await,
        Commands::Sell(sell) => run_sell(&ctx, sell).await,
        Commands::Poll {
            once,
            interval,
            auto_confirm,
            ask_before_sell,
        } => run_poll(ctx, once, interval, auto_confirm, ask_before_sell).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&ctx.config)?);
            Ok(())
        }
    }
}

async fn run_status(ctx: &AppContext) -> Result<()> {
    let state = ctx.state.snapshot().await;
    println!("Desktop agent status:");
    println!("  API base URL: {}", ctx.config.normalized_base_url()?);
    println!("  Target device: {}", ctx.config.target_device);
    println!("  Device id: {}", ctx.config.device_id);
    println!(
        "  Token stored: {}",
        if state.access_token.is_some() { "yes" } else { "no" }
    );
    if let Some(polled_at) = state.last_polled_at {
        println!("  Last poll: {}", polled_at);
    }
    if let Some(command_id) = state.last_command_id {
        println!("  Last command #: {}", command_id);
    }
    Ok(())
}

async fn run_login(ctx: &AppContext, email: Option<String>, password: Option<String>) -> Result<()> {
    let prompter = StdinPrompter;
    let email = match email {
        Some(email) => email,
        None => prompter.prompt("Email", None).await?,
    };
    let password = match password {
        Some(password) => password,
        None => prompter.prompt("Password", None).await?,
    };

    let result = ctx.api.login(&email, &password).await?;
    ctx.state.set_token(result.access_token).await?;
    println!("Login successful. Token saved for desktop use.");
    Ok(())
}

async fn run_logout(ctx: &AppContext) -> Result<()> {
    ctx.api.logout().await?;
    ctx.state.set_token(None).await?;
    println!("Logged out and local token removed.");
    Ok(())
}

async fn run_dashboard(ctx: &AppContext) -> Result<()> {
    ctx.ensure_authenticated().await?;
    let dashboard = ctx.api.get_dashboard().await?;
    let overview = ctx.api.get_sell_overview().await?;
    render::print_dashboard(&dashboard, &overview);
    Ok(())
}

async fn run_transactions(ctx: &AppContext) -> Result<()> {
    ctx.ensure_authenticated().await?;
    let transactions = ctx.api.get_transactions().await?;
    println!("{}", serde_json::to_string_pretty(&transactions)?);
    Ok(())
}

async fn run_sell(ctx: &AppContext, command: SellCommands) -> Result<()> {
    ctx.ensure_authenticated().await?;
    match command {
        SellCommands::Overview => {
            let overview = ctx.api.get_sell_overview().await?;
            println!("Sellable assets:");
            if overview.holdings.is_empty() {
                println!("  (none)");
            }
            for holding in &overview.holdings {
                println!(
                    "- {} ({}): qty {}, current ${}, value ${}",
                    holding.symbol,
                    holding.id,
                    render::format_quantity(holding.quantity),
                    render::format_money(holding.current_price),
                    render::format_money(holding.current_value),
                );
            }
            Ok(())
        }
        SellCommands::Preview(args) => {
            let intent = args.into_intent()?;
            let preview = ctx.api.preview_sell(&intent).await?;
            render::print_preview(&preview);
            Ok(())
        }
        SellCommands::Execute { args, skip_preview } => {
            let intent = args.into_intent()?;
            if !skip_preview {
                let preview = ctx.api.preview_sell(&intent).await?;
                render::print_preview(&preview);
                let policy = ConfirmPolicy::new(None, ctx.config.auto_confirm_sales);
                let message = format!(
                    "Sell {} {} for {} USD?",
                    render::format_quantity(preview.quantity),
                    preview.symbol,
                    render::format_money(preview.proceeds),
                );
                if !policy.confirm(&StdinPrompter, &message).await? {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            let result = ctx.api.execute_sell(&intent).await?;
            render::print_sell_result(&result);
            Ok(())
        }
    }
}

async fn run_poll(
    ctx: AppContext,
    once: bool,
    interval: Option<u64>,
    auto_confirm: bool,
    ask_before_sell: bool,
) -> Result<()> {
    let override_flag = if auto_confirm {
        Some(true)
    } else if ask_before_sell {
        Some(false)
    } else {
        None
    };
    let policy = ConfirmPolicy::new(override_flag, ctx.config.auto_confirm_sales);

    let api: Arc<dyn BackendApi> = ctx.api.clone();
    let dispatcher = CommandDispatcher::new(
        api.clone(),
        ctx.state.clone(),
        Arc::new(StdinPrompter),
        policy,
    );
    let poller = CommandPoller::new(api, dispatcher, ctx.state.clone(), ctx.config);
    poller.run(once, interval).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_override_flags_are_mutually_exclusive() {
        // Both at once is rejected at parse time, before any run loop.
        assert!(Cli::try_parse_from([
            "desk-agent",
            "poll",
            "--auto-confirm",
            "--ask-before-sell"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["desk-agent", "poll", "--auto-confirm"]).is_ok());
        assert!(Cli::try_parse_from(["desk-agent", "poll", "--ask-before-sell"]).is_ok());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
