//! Interactive shell: numbered menus, colored console helpers, pickers and
//! confirmation prompts. The interactive session is the single writer of the
//! configuration file; the service modes only ever read it.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use telsuit_core::{
    config::Config,
    delete::{BatchDeleter, DELETE_BATCH_SIZE},
    domain::{ChatId, PostId},
    messaging::port::ChannelClient,
    pipeline::run_cleaner_monitor,
};
use telsuit_telegram::TelegramChannelClient;

const FORWARD_PAUSE: Duration = Duration::from_millis(300);

pub fn print_section(title: &str) {
    println!("\n{}", format!("--- {title} ---").cyan().bold());
}

pub fn print_success(message: &str) {
    println!("{}", format!("✔ {message}").green());
}

pub fn print_warning(message: &str) {
    println!("{}", format!("⚠ {message}").yellow());
}

pub fn print_error(message: &str) {
    println!("{}", format!("✖ {message}").red());
}

pub fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub fn confirm(message: &str) -> anyhow::Result<bool> {
    Ok(prompt(&format!("{message} [y/N]: "))?.eq_ignore_ascii_case("y"))
}

fn prompt_number(message: &str, default: usize) -> anyhow::Result<usize> {
    let raw = prompt(message)?;
    if raw.is_empty() {
        return Ok(default);
    }
    Ok(raw.parse().unwrap_or(default))
}

pub async fn main_menu(config_path: &Path, mut config: Config) -> anyhow::Result<()> {
    loop {
        println!("\n{}", "==============================".cyan().bold());
        println!("{}", "        TelSuit Main Menu".cyan().bold());
        println!("{}", "==============================".cyan().bold());
        println!("{} Emoji enhancer (live pipeline)", "1.".yellow());
        println!("{} Channel cleaner", "2.".yellow());
        println!("{} Settings", "3.".yellow());
        println!("{} Exit", "4.".yellow());

        match prompt("Select an option: ")?.as_str() {
            "1" => {
                let Some(phone) = pick_admin(&config)? else {
                    continue;
                };
                println!("Starting live enhancement. Ctrl+C to stop.");
                if let Err(e) = crate::run_service(&config, Some(phone)).await {
                    print_error(&format!("{e:#}"));
                }
            }
            "2" => cleaner_menu(config_path, &mut config).await?,
            "3" => settings_menu(config_path, &mut config)?,
            "4" => {
                println!("Exiting TelSuit. Goodbye!");
                break;
            }
            _ => print_error("Invalid selection, please try again."),
        }
    }
    Ok(())
}

fn pick_admin(config: &Config) -> anyhow::Result<Option<String>> {
    if config.admins.is_empty() {
        print_warning("No admins configured.");
        return Ok(None);
    }
    let phones: Vec<&String> = config.admins.keys().collect();

    println!("\n--- Available Admins ---");
    for (i, phone) in phones.iter().enumerate() {
        println!("{}. {phone}", i + 1);
    }
    let choice = prompt("Select which admin to use: ")?;
    match choice.parse::<usize>() {
        Ok(n) if (1..=phones.len()).contains(&n) => Ok(Some(phones[n - 1].clone())),
        _ => {
            print_error("Invalid selection.");
            Ok(None)
        }
    }
}

fn pick_channel(config: &Config) -> anyhow::Result<Option<String>> {
    if config.channels.is_empty() {
        print_warning("No channels configured.");
        return Ok(None);
    }

    println!("\n--- Configured Channels ---");
    for (i, channel) in config.channels.iter().enumerate() {
        println!("{}. {channel}", i + 1);
    }
    let choice = prompt("Select channel: ")?;
    match choice.parse::<usize>() {
        Ok(n) if (1..=config.channels.len()).contains(&n) => {
            Ok(Some(config.channels[n - 1].clone()))
        }
        _ => {
            print_error("Invalid selection.");
            Ok(None)
        }
    }
}

/// Stored keywords, or a custom one typed on the spot.
fn pick_keyword(config: &Config) -> anyhow::Result<Option<String>> {
    let keywords = &config.cleaner.keywords;
    if keywords.is_empty() {
        let value = prompt("Choose keyword for SKU extraction (type keyword): ")?;
        return Ok((!value.is_empty()).then_some(value));
    }

    println!("\n--- Available Keywords ---");
    for (i, keyword) in keywords.iter().enumerate() {
        println!("{}. {keyword}", i + 1);
    }
    println!("0. Enter custom keyword");

    let choice = prompt(&format!("Select keyword [1-{} or 0]: ", keywords.len()))?;
    if choice == "0" {
        let value = prompt("Enter custom keyword: ")?;
        return Ok((!value.is_empty()).then_some(value));
    }
    match choice.parse::<usize>() {
        Ok(n) if (1..=keywords.len()).contains(&n) => Ok(Some(keywords[n - 1].clone())),
        _ => {
            print_error("Invalid selection.");
            Ok(None)
        }
    }
}

async fn cleaner_menu(config_path: &Path, config: &mut Config) -> anyhow::Result<()> {
    let Some(phone) = pick_admin(config)? else {
        return Ok(());
    };
    let client = match crate::connect_client(config, Some(phone)).await {
        Ok(client) => client,
        Err(e) => {
            print_error(&format!("{e:#}"));
            return Ok(());
        }
    };

    loop {
        print_section("Channel Cleaner Menu");
        println!("1. Remove duplicate posts");
        println!("2. Delete by keyword");
        println!("3. Delete by age (older than N days)");
        println!("4. Forward / copy recent posts");
        println!("5. Cleaner settings");
        println!("6. Live monitor (new posts)");
        println!("7. Back");

        match prompt("Select option: ")?.as_str() {
            "1" => {
                let Some(chat) = resolve_picked_channel(&client, config).await? else {
                    continue;
                };
                let Some(keyword) = pick_keyword(config)? else {
                    continue;
                };
                if let Err(e) =
                    crate::execute_sweep(client.clone(), chat, &keyword, config, false).await
                {
                    print_error(&format!("{e:#}"));
                }
            }
            "2" => {
                if let Some(chat) = resolve_picked_channel(&client, config).await? {
                    if let Err(e) = delete_by_keyword(&client, chat, config).await {
                        print_error(&format!("{e:#}"));
                    }
                }
            }
            "3" => {
                if let Some(chat) = resolve_picked_channel(&client, config).await? {
                    if let Err(e) = delete_by_age(&client, chat, config).await {
                        print_error(&format!("{e:#}"));
                    }
                }
            }
            "4" => {
                if let Some(chat) = resolve_picked_channel(&client, config).await? {
                    if let Err(e) = forward_copy(&client, chat).await {
                        print_error(&format!("{e:#}"));
                    }
                }
            }
            "5" => keyword_settings(config_path, config)?,
            "6" => {
                if let Err(e) = live_monitor(client.clone(), config).await {
                    print_error(&format!("{e:#}"));
                }
            }
            "7" => {
                println!("Returning to TelSuit...");
                break;
            }
            _ => print_error("Invalid option."),
        }
    }
    Ok(())
}

async fn resolve_picked_channel(
    client: &Arc<TelegramChannelClient>,
    config: &Config,
) -> anyhow::Result<Option<ChatId>> {
    let Some(channel) = pick_channel(config)? else {
        return Ok(None);
    };
    match client.resolve_channel(&channel).await {
        Ok(chat) => Ok(Some(chat)),
        Err(e) => {
            print_error(&format!("{e}"));
            Ok(None)
        }
    }
}

async fn delete_by_keyword(
    client: &Arc<TelegramChannelClient>,
    chat: ChatId,
    config: &Config,
) -> anyhow::Result<()> {
    let Some(keyword) = pick_keyword(config)? else {
        return Ok(());
    };
    let limit = prompt_number("How many recent posts to scan? [200]: ", 200)?;

    let posts = client.iter_history(chat, limit).await?;
    let needle = keyword.to_lowercase();
    let ids: Vec<PostId> = posts
        .iter()
        .filter(|p| p.text.to_lowercase().contains(&needle))
        .map(|p| p.id)
        .collect();

    if ids.is_empty() {
        print_warning("Nothing matched.");
        return Ok(());
    }

    println!("Matched {} posts containing '{keyword}'.", ids.len());
    if !confirm("Delete them?")? {
        println!("Cancelled.");
        return Ok(());
    }

    let deleted = deleter(client, config).delete_many(chat, &ids).await;
    print_success(&format!("Deleted {deleted} posts containing '{keyword}'."));
    Ok(())
}

async fn delete_by_age(
    client: &Arc<TelegramChannelClient>,
    chat: ChatId,
    config: &Config,
) -> anyhow::Result<()> {
    let days = prompt("Delete posts older than N days: ")?;
    let Ok(days) = days.parse::<i64>() else {
        print_error("Invalid number.");
        return Ok(());
    };

    let cutoff = Utc::now() - chrono::Duration::days(days);
    let posts = client.iter_history(chat, 600).await?;
    let ids: Vec<PostId> = posts
        .iter()
        .filter(|p| p.date < cutoff)
        .map(|p| p.id)
        .collect();

    if ids.is_empty() {
        print_warning("No posts older than that.");
        return Ok(());
    }

    println!("{} posts older than {days} days will be removed.", ids.len());
    if !confirm("Proceed?")? {
        println!("Cancelled.");
        return Ok(());
    }

    let deleted = deleter(client, config).delete_many(chat, &ids).await;
    print_success(&format!("Deleted {deleted} posts older than {days} days."));
    Ok(())
}

async fn forward_copy(client: &Arc<TelegramChannelClient>, from: ChatId) -> anyhow::Result<()> {
    let target = prompt("Target channel (e.g. @mytarget): ")?;
    if target.is_empty() {
        println!("No target provided.");
        return Ok(());
    }
    let count = prompt_number("How many recent posts to send? [10]: ", 10)?;
    let copy_only = prompt("Mode: (F)orward or (C)opy text only? [F/C]: ")?.eq_ignore_ascii_case("c");

    let dest = client.resolve_channel(&target).await?;
    let posts = client.iter_history(from, count).await?;

    let mut sent = 0usize;
    for post in &posts {
        let result = if copy_only {
            if post.text.is_empty() {
                continue;
            }
            client.send_message(dest, &post.text).await.map(|_| 1)
        } else {
            client.forward_posts(dest, from, &[post.id]).await
        };
        match result {
            Ok(n) => sent += n,
            Err(e) => print_error(&format!("Forward/copy failed for {}: {e}", post.id.0)),
        }
        tokio::time::sleep(FORWARD_PAUSE).await;
    }

    print_success(&format!("Sent {sent} posts to {target}."));
    Ok(())
}

async fn live_monitor(client: Arc<TelegramChannelClient>, config: &Config) -> anyhow::Result<()> {
    if config.channels.is_empty() {
        print_warning("No channels configured.");
        return Ok(());
    }
    let channels = client.resolve_channels(&config.channels).await?;

    println!("Starting live monitor for new posts only. Ctrl+C to stop.");
    let cancel = CancellationToken::new();
    crate::stop_on_ctrl_c(cancel.clone());
    run_cleaner_monitor(
        client as Arc<dyn ChannelClient>,
        &channels,
        config.cleaner.keywords.clone(),
        cancel,
    )
    .await?;
    Ok(())
}

fn keyword_settings(config_path: &Path, config: &mut Config) -> anyhow::Result<()> {
    loop {
        print_section("Cleaner Settings");
        println!("1. Add keywords");
        println!("2. Delete keyword");
        println!("3. View keywords");
        println!("4. Back");

        match prompt("Select option: ")?.as_str() {
            "1" => {
                let raw = prompt("Enter keywords (comma-separated): ")?;
                config.add_keywords(&raw);
                config.save_to(config_path)?;
                print_success("Keywords updated.");
            }
            "2" => {
                if config.cleaner.keywords.is_empty() {
                    print_warning("No keywords stored.");
                    continue;
                }
                list_keywords(config);
                let choice = prompt("Select number to delete: ")?;
                match choice.parse::<usize>() {
                    Ok(n) if n >= 1 => match config.remove_keyword(n - 1) {
                        Some(removed) => {
                            config.save_to(config_path)?;
                            print_success(&format!("Deleted keyword '{removed}'."));
                        }
                        None => print_error("Invalid selection."),
                    },
                    _ => print_error("Invalid selection."),
                }
            }
            "3" => {
                if config.cleaner.keywords.is_empty() {
                    println!("No keywords stored.");
                } else {
                    list_keywords(config);
                }
            }
            "4" => break,
            _ => print_error("Invalid option."),
        }
    }
    Ok(())
}

fn list_keywords(config: &Config) {
    println!("\n--- Current Keywords ---");
    for (i, keyword) in config.cleaner.keywords.iter().enumerate() {
        println!("{}. {keyword}", i + 1);
    }
}

fn settings_menu(config_path: &Path, config: &mut Config) -> anyhow::Result<()> {
    loop {
        print_section("Settings");
        println!("1. Add channel");
        println!("2. Remove channel");
        println!("3. Manage keywords");
        println!("4. Show configuration");
        println!("5. Back");

        match prompt("Select option: ")?.as_str() {
            "1" => {
                let channel = prompt("Channel username (e.g. @mychannel): ")?;
                if channel.is_empty() {
                    continue;
                }
                if config
                    .channels
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(&channel))
                {
                    print_warning("Channel already configured.");
                    continue;
                }
                config.channels.push(channel);
                config.save_to(config_path)?;
                print_success("Channel added.");
            }
            "2" => {
                if config.channels.is_empty() {
                    print_warning("No channels configured.");
                    continue;
                }
                for (i, channel) in config.channels.iter().enumerate() {
                    println!("{}. {channel}", i + 1);
                }
                let choice = prompt("Select number to remove: ")?;
                match choice.parse::<usize>() {
                    Ok(n) if (1..=config.channels.len()).contains(&n) => {
                        let removed = config.channels.remove(n - 1);
                        config.save_to(config_path)?;
                        print_success(&format!("Removed channel '{removed}'."));
                    }
                    _ => print_error("Invalid selection."),
                }
            }
            "3" => keyword_settings(config_path, config)?,
            "4" => {
                print_section("Configuration");
                println!("Admins:    {}", config.admins.len());
                println!("Channels:  {}", config.channels.join(", "));
                println!("Glyphs:    {} mapped", config.glyphs.len());
                println!("Keywords:  {}", config.cleaner.keywords.join(", "));
                println!(
                    "CTA:       {}",
                    config
                        .call_to_action
                        .as_ref()
                        .map(|c| c.label.as_str())
                        .unwrap_or("none")
                );
            }
            "5" => break,
            _ => print_error("Invalid option."),
        }
    }
    Ok(())
}

fn deleter(client: &Arc<TelegramChannelClient>, config: &Config) -> BatchDeleter {
    BatchDeleter::with_pacing(
        client.clone() as Arc<dyn ChannelClient>,
        DELETE_BATCH_SIZE,
        Duration::from_millis(config.pacing.batch_pause_ms),
    )
}
