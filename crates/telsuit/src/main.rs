//! TelSuit: Telegram channel automation suite.
//!
//! Live-enhances channel posts (custom-emoji substitution + call-to-action
//! link) and reconciles duplicate catalog posts by keyword + SKU.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use telsuit_core::{
    config::{AdminCredentials, Config},
    dedup::DedupEngine,
    delete::{BatchDeleter, DELETE_BATCH_SIZE},
    domain::ChatId,
    logging,
    messaging::port::ChannelClient,
    pipeline::{run_cleaner_monitor, EnhancementPipeline},
};
use telsuit_telegram::{login, TelegramChannelClient};

mod menu;

#[derive(Parser)]
#[command(
    name = "telsuit",
    about = "Telegram channel enhancement and cleanup suite",
    version
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = telsuit_core::config::CONFIG_FILE)]
    config: PathBuf,

    /// Append logs to this file instead of the console (service mode).
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the enhancement pipeline for all configured channels (headless).
    Run {
        /// Admin phone to use; defaults to the first configured account.
        #[arg(long)]
        admin: Option<String>,
    },
    /// Watch for new posts and remove duplicates without enhancing anything.
    Monitor {
        #[arg(long)]
        admin: Option<String>,
    },
    /// Scan one channel for duplicate posts and delete the older copies.
    Sweep {
        #[arg(long)]
        channel: String,
        /// Keyword for SKU extraction; defaults to the first stored keyword.
        #[arg(long)]
        keyword: Option<String>,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Sign in an admin account and store its session file.
    Login {
        #[arg(long)]
        phone: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match &cli.log_file {
        Some(path) => logging::init_to_file("telsuit", path)?,
        None => logging::init("telsuit")?,
    }

    let config = Config::load_from(&cli.config).context("loading configuration")?;

    match cli.command {
        Some(Command::Run { admin }) => run_service(&config, admin).await,
        Some(Command::Monitor { admin }) => run_monitor(&config, admin).await,
        Some(Command::Sweep {
            channel,
            keyword,
            yes,
        }) => run_sweep(&config, &channel, keyword, yes).await,
        Some(Command::Login { phone }) => {
            let creds = admin_credentials(&config, &phone)?;
            login::connect(&phone, &creds).await?;
            menu::print_success(&format!("Signed in as {phone}."));
            Ok(())
        }
        None => menu::main_menu(&cli.config, config).await,
    }
}

fn admin_credentials(config: &Config, phone: &str) -> anyhow::Result<AdminCredentials> {
    config
        .admins
        .get(phone)
        .cloned()
        .with_context(|| format!("admin {phone} is not configured"))
}

/// Pick the given admin, or fall back to the first configured one.
pub(crate) fn pick_admin(
    config: &Config,
    admin: Option<String>,
) -> anyhow::Result<(String, AdminCredentials)> {
    match admin {
        Some(phone) => {
            let creds = admin_credentials(config, &phone)?;
            Ok((phone, creds))
        }
        None => config
            .admins
            .iter()
            .next()
            .map(|(phone, creds)| (phone.clone(), creds.clone()))
            .context("no admins configured"),
    }
}

pub(crate) async fn connect_client(
    config: &Config,
    admin: Option<String>,
) -> anyhow::Result<Arc<TelegramChannelClient>> {
    let (phone, creds) = pick_admin(config, admin)?;
    let client = login::connect(&phone, &creds).await?;
    Ok(Arc::new(TelegramChannelClient::new(client)))
}

pub(crate) fn stop_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

pub(crate) async fn run_service(config: &Config, admin: Option<String>) -> anyhow::Result<()> {
    if config.channels.is_empty() {
        bail!("no channels configured");
    }

    let client = connect_client(config, admin).await?;
    let channels = client.resolve_channels(&config.channels).await?;

    let pipeline = EnhancementPipeline::new(
        client.clone() as Arc<dyn ChannelClient>,
        config.pipeline_settings(),
    );
    let handle = pipeline.start(&channels).await?;
    stop_on_ctrl_c(handle.stop_token());
    handle.wait().await;
    Ok(())
}

pub(crate) async fn run_monitor(config: &Config, admin: Option<String>) -> anyhow::Result<()> {
    if config.channels.is_empty() {
        bail!("no channels configured");
    }

    let client = connect_client(config, admin).await?;
    let channels = client.resolve_channels(&config.channels).await?;

    let cancel = CancellationToken::new();
    stop_on_ctrl_c(cancel.clone());
    run_cleaner_monitor(
        client as Arc<dyn ChannelClient>,
        &channels,
        config.cleaner.keywords.clone(),
        cancel,
    )
    .await?;
    Ok(())
}

pub(crate) async fn run_sweep(
    config: &Config,
    channel: &str,
    keyword: Option<String>,
    skip_confirm: bool,
) -> anyhow::Result<()> {
    let keyword = keyword
        .or_else(|| config.cleaner.keywords.first().cloned())
        .context("no keyword given and none stored")?;

    let client = connect_client(config, None).await?;
    let chat = client.resolve_channel(channel).await?;
    execute_sweep(client, chat, &keyword, config, skip_confirm).await
}

/// Build and surface the deletion plan, then (after confirmation) run it.
/// Nothing is deleted before the operator has seen the whole plan.
pub(crate) async fn execute_sweep(
    client: Arc<TelegramChannelClient>,
    chat: ChatId,
    keyword: &str,
    config: &Config,
    skip_confirm: bool,
) -> anyhow::Result<()> {
    let engine = DedupEngine::with_limits(
        client.clone() as Arc<dyn ChannelClient>,
        config.pacing.scan_limit,
        config.pacing.probe_limit,
    );

    println!("Scanning recent posts and grouping by SKU...");
    let plan = engine.sweep_plan(chat, keyword).await?;
    if plan.is_empty() {
        menu::print_success("All SKUs are unique already. Nothing to delete.");
        return Ok(());
    }

    menu::print_section("Duplicate Summary");
    for entry in &plan.entries {
        println!(
            "SKU {}: delete {}, keep {}",
            entry.sku,
            entry.delete.len(),
            entry.keep.0
        );
    }
    println!("Total posts to delete: {}", plan.total_deletions());

    if !skip_confirm && !menu::confirm("Proceed with deletion?")? {
        println!("Cancelled.");
        return Ok(());
    }

    let deleter = BatchDeleter::with_pacing(
        client as Arc<dyn ChannelClient>,
        DELETE_BATCH_SIZE,
        Duration::from_millis(config.pacing.batch_pause_ms),
    );
    let deleted = deleter.execute(chat, &plan).await;
    menu::print_success(&format!(
        "Deleted {deleted} posts across {} SKUs.",
        plan.entries.len()
    ));
    Ok(())
}
