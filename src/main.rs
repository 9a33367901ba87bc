//! Roost - offline-first Mastodon timeline cache
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use roost::api::mastodon::{MastodonClient, oauth};
use roost::{
    Account, Config, Database, LoadType, StatusId, SyncManager, TimelineEntry, TimelineId,
    TimelineSyncEngine, UiStateChange,
};

type Engine = TimelineSyncEngine<MastodonClient>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // RUST_LOG wins over the configured filter
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_filter))
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match parse_args()? {
        Command::Auth { instance } => auth_flow(&config, &instance).await,
        Command::Accounts => list_accounts(),
        Command::Use { handle } => use_account(&handle),
        Command::Logout { handle } => logout(&config, &handle).await,
        Command::Load {
            load,
            timeline,
            resume,
        } => load_cli(&config, load, timeline, resume).await,
        Command::Show { timeline, limit } => show_cli(&config, timeline, limit).await,
        Command::Expand { status_id, timeline } => expand_cli(&config, status_id, timeline).await,
        Command::Prefs {
            spoilers,
            sensitive,
        } => prefs_cli(spoilers, sensitive),
        Command::Cleanup => cleanup_cli(&config).await,
        Command::Reset { timeline } => reset_cli(&config, timeline).await,
        Command::Watch => watch_cli(&config).await,
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            print_version();
            Ok(())
        }
    }
}

/// CLI commands
enum Command {
    Auth {
        instance: String,
    },
    Accounts,
    Use {
        handle: String,
    },
    Logout {
        handle: String,
    },
    Load {
        load: LoadType,
        timeline: Option<TimelineId>,
        resume: bool,
    },
    Show {
        timeline: Option<TimelineId>,
        limit: usize,
    },
    Expand {
        status_id: StatusId,
        timeline: Option<TimelineId>,
    },
    Prefs {
        spoilers: Option<bool>,
        sensitive: Option<bool>,
    },
    Cleanup,
    Reset {
        timeline: Option<TimelineId>,
    },
    Watch,
    Help,
    Version,
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    let Some(command) = args.get(1) else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),

        "auth" => {
            let instance = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing instance\nExample: roost auth mastodon.social"))?
                .clone();
            Ok(Command::Auth { instance })
        }

        "accounts" => Ok(Command::Accounts),

        "use" | "logout" => {
            let handle = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing account handle"))?
                .clone();
            if command == "use" {
                Ok(Command::Use { handle })
            } else {
                Ok(Command::Logout { handle })
            }
        }

        "refresh" | "more" | "newer" => {
            let load = match command.as_str() {
                "refresh" => LoadType::Refresh,
                "more" => LoadType::Append,
                _ => LoadType::Prepend,
            };
            let mut timeline = None;
            let mut resume = false;
            for arg in &args[2..] {
                match arg.as_str() {
                    "--resume" | "-r" if load == LoadType::Refresh => resume = true,
                    other => timeline = Some(parse_timeline(other)?),
                }
            }
            Ok(Command::Load {
                load,
                timeline,
                resume,
            })
        }

        "show" => {
            let mut timeline = None;
            let mut limit = 20;
            let mut i = 2;
            while i < args.len() {
                if args[i] == "--limit" || args[i] == "-l" {
                    limit = args
                        .get(i + 1)
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| anyhow::anyhow!("--limit needs a number"))?;
                    i += 2;
                } else {
                    timeline = Some(parse_timeline(&args[i])?);
                    i += 1;
                }
            }
            Ok(Command::Show { timeline, limit })
        }

        "expand" => {
            let status_id = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing status id"))?;
            let timeline = args.get(3).map(|s| parse_timeline(s)).transpose()?;
            Ok(Command::Expand {
                status_id: StatusId::from(status_id.as_str()),
                timeline,
            })
        }

        "prefs" => {
            let mut spoilers = None;
            let mut sensitive = None;
            let mut i = 2;
            while i < args.len() {
                let value = args.get(i + 1).map(|v| parse_switch(v)).transpose()?;
                match args[i].as_str() {
                    "--spoilers" => spoilers = value,
                    "--sensitive" => sensitive = value,
                    other => return Err(anyhow::anyhow!("Unknown option: {other}")),
                }
                i += 2;
            }
            Ok(Command::Prefs {
                spoilers,
                sensitive,
            })
        }

        "cleanup" => Ok(Command::Cleanup),
        "reset" => {
            let timeline = args.get(2).map(|s| parse_timeline(s)).transpose()?;
            Ok(Command::Reset { timeline })
        }
        "watch" => Ok(Command::Watch),

        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'roost --help' for usage"
        )),
    }
}

fn parse_timeline(s: &str) -> Result<TimelineId> {
    TimelineId::parse(s).with_context(|| {
        format!("Unknown timeline: {s}\nUse home, local, federated, #tag or list:<id>")
    })
}

fn parse_switch(s: &str) -> Result<bool> {
    match s {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => Err(anyhow::anyhow!("Expected on or off, got '{other}'")),
    }
}

fn print_help() {
    let config_path = roost::Config::default_path()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"Roost - offline-first Mastodon timeline cache

USAGE:
    roost [COMMAND]

COMMANDS:
    auth <instance>                    Sign in to a Mastodon instance
      Example:
        roost auth mastodon.social

    accounts                           List signed-in accounts
    use <handle>                       Switch the active account
    logout <handle>                    Remove an account and its cache

    refresh [timeline] [OPTIONS]       Fetch the newest page
      Options:
        -r, --resume                   Only fetch what came after the last refresh
    more [timeline]                    Fetch the next older page
    newer [timeline]                   Fetch statuses newer than the cache
    show [timeline] [OPTIONS]          Print the cached timeline (offline)
      Options:
        -l, --limit <n>                Number of statuses (default: 20)
    expand <status-id> [timeline]      Toggle a content warning

    prefs [OPTIONS]                    Display defaults for new statuses
      Options:
        --spoilers on|off              Open content warnings
        --sensitive on|off             Reveal sensitive media

    cleanup                            Trim cached timelines to cache_limit
    reset [timeline]                   Drop a cached timeline and its cursors
    watch                              Refresh every refresh_interval_secs

TIMELINES:
    home, local, federated, #tag, list:<id>

OPTIONS:
    -h, --help                         Show this help message
    -v, --version                      Show version information

CONFIG:
    {}
"#,
        config_path
    );
}

fn print_version() {
    println!("roost {}", roost::VERSION);
}

async fn auth_flow(config: &Config, instance: &str) -> Result<()> {
    let instance = if instance.starts_with("http") {
        instance.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", instance.trim_end_matches('/'))
    };

    println!("Authenticating with {}...", instance);

    let app = oauth::register_app(&instance).await?;
    println!("✓ App registered");

    let auth_url = oauth::get_auth_url(&instance, &app.client_id);
    println!("\nOpen this URL in your browser:\n\n  {}\n", auth_url);

    println!("Paste the authorization code here:");
    let mut code = String::new();
    std::io::stdin().read_line(&mut code)?;
    let code = code.trim();

    let token = oauth::get_token(&instance, &app.client_id, &app.client_secret, code).await?;

    let profile = MastodonClient::new()
        .verify_credentials(&instance, &token.access_token)
        .await
        .context("Token was issued but could not be verified")?;

    let mut account = Account::new(&profile.username, &instance, &token.access_token);
    account.display_name = profile.display_name;
    account.avatar_url = profile.avatar;

    let db = Database::open()?;
    if db.find_account(&account.full_handle())?.is_some() {
        anyhow::bail!("{} is already signed in", account.full_handle());
    }
    db.insert_account(&account)?;
    db.set_active_account(account.id)?;

    println!("\n✓ Logged in as {}", account.full_handle());
    println!("✓ Account saved");

    let config_path = Config::default_path()?;
    if !config_path.exists() {
        config.save_to(&config_path)?;
        println!("✓ Default config written to {}", config_path.display());
    }
    Ok(())
}

fn list_accounts() -> Result<()> {
    let db = Database::open()?;
    let accounts = db.get_accounts()?;

    if accounts.is_empty() {
        println!("No accounts configured.");
        println!("\nAdd an account with:");
        println!("  roost auth <instance>");
        return Ok(());
    }

    let active = db.active_account()?.map(|a| a.id);
    println!("Configured accounts:\n");

    for account in accounts {
        let marker = if Some(account.id) == active { " (active)" } else { "" };
        println!(
            "  {} {}{}\n    Server: {}  spoilers: {}  sensitive: {}",
            account.display_name,
            account.full_handle(),
            marker,
            account.server,
            on_off(account.always_open_spoiler),
            on_off(account.always_show_sensitive_media)
        );
    }

    Ok(())
}

fn use_account(handle: &str) -> Result<()> {
    let db = Database::open()?;
    let account = find_account(&db, handle)?;
    db.set_active_account(account.id)?;
    println!("✓ Now using {}", account.full_handle());
    Ok(())
}

async fn logout(config: &Config, handle: &str) -> Result<()> {
    let engine = open_engine(config)?;
    let account = find_account(&*engine.database().lock().await, handle)?;
    engine.remove_account(account.id).await?;
    println!("✓ Removed {} and its cached timelines", account.full_handle());
    Ok(())
}

fn find_account(db: &Database, handle: &str) -> Result<Account> {
    db.find_account(handle)?
        .with_context(|| format!("No account matching '{handle}'. Run: roost accounts"))
}

fn open_engine(config: &Config) -> Result<Engine> {
    let db = Database::open()?;
    Ok(TimelineSyncEngine::new(db, MastodonClient::new(), config.page_size))
}

async fn active_account(engine: &Engine) -> Result<Account> {
    engine
        .database()
        .lock()
        .await
        .active_account()?
        .context("No account configured. Run: roost auth <instance>")
}

fn timeline_or_default(config: &Config, timeline: Option<TimelineId>) -> Result<TimelineId> {
    timeline.map_or_else(|| config.timeline(), Ok)
}

async fn load_cli(
    config: &Config,
    load: LoadType,
    timeline: Option<TimelineId>,
    resume: bool,
) -> Result<()> {
    let timeline = timeline_or_default(config, timeline)?;
    let engine = open_engine(config)?;
    let account = active_account(&engine).await?;

    let anchor = if resume {
        engine.refresh_anchor(account.id, &timeline).await?
    } else {
        None
    };
    if let Some(anchor) = &anchor {
        tracing::debug!("Resuming {timeline} after {anchor}");
    }

    let outcome = engine.load(&account, &timeline, load, anchor).await?;

    if outcome.exhausted {
        println!("No more statuses in {} ({})", timeline, load);
    } else {
        let cached = engine.cached_count(account.id, &timeline).await?;
        println!(
            "✓ {} {}: {} fetched, {} cached",
            load, timeline, outcome.fetched, cached
        );
    }
    Ok(())
}

async fn show_cli(config: &Config, timeline: Option<TimelineId>, limit: usize) -> Result<()> {
    let timeline = timeline_or_default(config, timeline)?;
    let engine = open_engine(config)?;
    let account = active_account(&engine).await?;

    let entries = engine.cached(account.id, &timeline, limit).await?;
    println!("\n{} timeline ({})", timeline, account.full_handle());
    println!("{}", "─".repeat(60));

    if entries.is_empty() {
        println!("\nNothing cached yet. Run: roost refresh {}", timeline);
        return Ok(());
    }

    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

fn print_entry(entry: &TimelineEntry) {
    let status = &entry.status;
    let shown = status.actionable();

    println!();
    if let Some(reblog) = &status.reblog {
        println!("🔁 {} boosted", status.author.name());
        println!("@{} · {} · {}", reblog.author.acct, status.relative_time(), shown.id);
    } else {
        println!("@{} · {} · {}", status.author.acct, status.relative_time(), shown.id);
    }

    if status.has_spoiler() {
        println!("CW: {}", shown.spoiler_text);
    }
    if !status.has_spoiler() || entry.ui.expanded {
        if entry.ui.content_collapsed {
            println!("{}", status.preview(280));
        } else {
            println!("{}", status.plain_text());
        }
    } else {
        println!("[hidden, roost expand {}]", shown.id);
    }

    if !shown.media.is_empty() {
        if shown.sensitive && !entry.ui.content_showing {
            println!("[{} sensitive attachment(s)]", shown.media.len());
        } else {
            for media in &shown.media {
                println!("[{:?}] {}", media.media_type, media.url);
            }
        }
    }

    println!(
        "♥ {}  🔁 {}  💬 {}",
        shown.favourites_count, shown.reblogs_count, shown.replies_count
    );
}

async fn expand_cli(
    config: &Config,
    status_id: StatusId,
    timeline: Option<TimelineId>,
) -> Result<()> {
    let timeline = timeline_or_default(config, timeline)?;
    let engine = open_engine(config)?;
    let account = active_account(&engine).await?;

    let entries = engine.cached(account.id, &timeline, config.cache_limit.max(1)).await?;
    let entry = entries
        .iter()
        .find(|e| e.id() == &status_id || e.status.actionable().id == status_id)
        .with_context(|| format!("Status {status_id} is not cached in {timeline}"))?;

    let expanded = !entry.ui.expanded;
    engine
        .set_ui_state(account.id, entry.id(), UiStateChange::Expanded(expanded))
        .await?;

    println!(
        "✓ {} {}",
        if expanded { "Expanded" } else { "Collapsed" },
        status_id
    );
    Ok(())
}

fn prefs_cli(spoilers: Option<bool>, sensitive: Option<bool>) -> Result<()> {
    let db = Database::open()?;
    let account = db
        .active_account()?
        .context("No account configured. Run: roost auth <instance>")?;

    let spoilers = spoilers.unwrap_or(account.always_open_spoiler);
    let sensitive = sensitive.unwrap_or(account.always_show_sensitive_media);
    db.update_account_preferences(account.id, spoilers, sensitive)?;

    println!("{}", account.full_handle());
    println!("  Open content warnings:  {}", on_off(spoilers));
    println!("  Reveal sensitive media: {}", on_off(sensitive));
    Ok(())
}

async fn cleanup_cli(config: &Config) -> Result<()> {
    let timeline = config.timeline()?;
    let engine = open_engine(config)?;
    let accounts = engine.database().lock().await.get_accounts()?;

    for account in accounts {
        let removed = engine.cleanup(account.id, &timeline, config.cache_limit).await?;
        println!("✓ {}: trimmed {} from {}", account.full_handle(), removed, timeline);
    }
    Ok(())
}

async fn reset_cli(config: &Config, timeline: Option<TimelineId>) -> Result<()> {
    let timeline = timeline_or_default(config, timeline)?;
    let engine = open_engine(config)?;
    let account = active_account(&engine).await?;

    let removed = engine.reset(account.id, &timeline).await?;
    println!(
        "✓ {}: dropped {} cached statuses from {}",
        account.full_handle(),
        removed,
        timeline
    );
    Ok(())
}

async fn watch_cli(config: &Config) -> Result<()> {
    let engine = Arc::new(open_engine(config)?);
    let manager = Arc::new(
        SyncManager::new(Arc::clone(&engine), config.timeline()?)
            .with_cache_limit(config.cache_limit),
    );

    let report = manager.refresh_all().await?;
    println!(
        "✓ Refreshed {} account(s), {} statuses, {} failed",
        report.refreshed, report.fetched, report.failed
    );

    if config.refresh_interval_secs == 0 {
        println!("refresh_interval_secs is 0; set it in the config to keep watching");
        return Ok(());
    }

    let mut invalidations = engine.subscribe();
    let background = tokio::spawn(Arc::clone(&manager).start_background_refresh(config.refresh_interval_secs));
    println!("Watching every {}s, Ctrl-C to stop", config.refresh_interval_secs);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            signal = invalidations.recv() => match signal {
                Ok(invalidation) => tracing::debug!(
                    "Invalidated {:?} ({:?})",
                    invalidation.timeline,
                    invalidation.reason
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!("Missed {missed} invalidations");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    background.abort();
    println!("\nStopped");
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
