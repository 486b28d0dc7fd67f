//! taskdeck
//!
//! Local-first to-do list with due reminders, a JSON API and a cache-first
//! offline asset server.

use anyhow::{Result, bail};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskdeck::app::TodoApp;
use taskdeck::cli::{Cli, Command, EditArgs, ListArgs, ServeArgs, Switch};
use taskdeck::clock::SystemClock;
use taskdeck::config::{Config, ConfigLoader, ConfigPaths};
use taskdeck::db::Database;
use taskdeck::format::{format_task_line, format_view};
use taskdeck::logging;
use taskdeck::offline::{CacheStorage, DirFetcher, Fetcher, HttpFetcher, OfflineCacheWorker};
use taskdeck::scheduler::{ConsoleSink, LogSink, NotificationSink};
use taskdeck::types::{NewTask, TaskEdit, split_tags};
use taskdeck::web::{self, WebState};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => {
            ConfigLoader::load_file(ConfigPaths::discover(), PathBuf::from(path))?.into_config()
        }
        None => ConfigLoader::load()?.into_config(),
    };

    // Command-line flags override every tier
    if let Some(ref db_path) = cli.database {
        config.storage.db_path = PathBuf::from(db_path);
    }
    Ok(config)
}

fn open_app(db: &Database, config: &Config, sink: Arc<dyn NotificationSink>) -> TodoApp {
    TodoApp::open(db, config, sink, Arc::new(SystemClock))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, &cli.log)?;

    let config = load_config(&cli)?;
    let db = Database::open(&config.storage.db_path)?;

    match cli.command {
        Some(Command::Watch) => run_watch(&db, &config).await,
        Some(Command::Serve(args)) => run_serve(&db, config, args).await,
        command => {
            // One-shot commands print reminders that are already due
            let app = open_app(&db, &config, Arc::new(ConsoleSink));
            app.refresh();
            let result = run_command(&app, &config, command.unwrap_or(Command::List(ListArgs::default())));
            app.scheduler().flush_alerts().await;
            app.scheduler().cancel_all();
            result
        }
    }
}

fn run_command(app: &TodoApp, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Add(args) => {
            let mut new = NewTask::new(args.text())
                .with_tags(args.tags())
                .with_priority(args.priority);
            if let Some(due) = args.due {
                new = new.with_due(due);
            }
            let task = app.add(new)?;
            println!("Added {}", format_task_line(&task, false));
        }
        Command::List(args) => {
            let view = app.view(&args.params(config.view.params()));
            println!("{}", format_view(&view, args.format));
        }
        Command::Edit(args) => {
            let id = args.id.clone();
            let edit = edit_from_args(args);
            if edit.is_empty() {
                bail!("nothing to change: pass --text, --tags, --due, --clear-due or --priority");
            }
            let task = app.edit(&id, edit)?;
            println!("Updated {}", format_task_line(&task, false));
        }
        Command::Done { id } => {
            let task = app.toggle_done(&id)?;
            println!("{}", format_task_line(&task, false));
        }
        Command::Delete { id } => {
            let handle = app.delete(&id)?;
            println!("Deleted {}", handle.task_id);
        }
        Command::Move { id, before } => {
            app.reorder(&id, before.as_deref())?;
            match before {
                Some(before) => println!("Moved {} before {}", id, before),
                None => println!("Moved {} to the end", id),
            }
        }
        Command::Remind { id, due, clear } => {
            let due = if clear { None } else { due };
            let task = app.set_due(&id, due)?;
            println!("{}", format_task_line(&task, false));
        }
        Command::ClearCompleted => {
            let removed = app.clear_completed();
            println!("Removed {} completed task(s)", removed);
        }
        Command::ClearAll { yes } => {
            let removed = app.clear_all(yes)?;
            println!("Removed all {} task(s)", removed);
        }
        Command::Theme { action } => {
            let theme = match action.map(|a| a.theme()) {
                None => app.theme(),
                Some(None) => app.toggle_theme()?,
                Some(Some(theme)) => {
                    app.set_theme(theme)?;
                    theme
                }
            };
            println!("Theme: {}", theme.as_str());
        }
        Command::Notifications { state } => {
            if let Some(state) = state {
                app.set_notifications_enabled(state == Switch::On)?;
            }
            let enabled = app.notifications_enabled();
            println!("Notifications: {}", if enabled { "on" } else { "off" });
        }
        Command::Watch | Command::Serve(_) => {
            bail!("long-running commands are dispatched in main")
        }
    }
    Ok(())
}

fn edit_from_args(args: EditArgs) -> TaskEdit {
    TaskEdit {
        text: args.text,
        tags: args.tags.as_deref().map(split_tags),
        due: if args.clear_due {
            Some(None)
        } else {
            args.due.map(Some)
        },
        priority: args.priority,
    }
}

/// Run the scheduler in the foreground, printing reminders until Ctrl-C.
async fn run_watch(db: &Database, config: &Config) -> Result<()> {
    let app = open_app(db, config, Arc::new(ConsoleSink));
    let shutdown = CancellationToken::new();
    let listener = app.spawn_listener(shutdown.clone());

    let report = app.refresh();
    info!(
        fired = report.fired.len(),
        armed = report.armed.len(),
        deferred = report.deferred.len(),
        "watching for due tasks"
    );
    println!(
        "Watching {} reminder(s); {} beyond the {}-day horizon. Press Ctrl-C to stop.",
        report.armed.len(),
        report.deferred.len(),
        config.scheduler.horizon_days
    );

    tokio::signal::ctrl_c().await?;
    shutdown.cancel();
    app.scheduler().cancel_all();
    app.scheduler().flush_alerts().await;
    let _ = listener.await;
    Ok(())
}

fn build_fetcher(config: &Config) -> Result<Arc<dyn Fetcher>> {
    match config.cache.upstream {
        Some(ref origin) => Ok(Arc::new(HttpFetcher::new(
            origin,
            Duration::from_millis(config.cache.fetch_timeout_ms),
        )?)),
        None => Ok(Arc::new(DirFetcher::new(config.cache.asset_root.clone()))),
    }
}

/// Serve the JSON API and the offline-cached web app until Ctrl-C.
async fn run_serve(db: &Database, mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(assets) = args.assets {
        config.cache.asset_root = PathBuf::from(assets);
    }
    if args.upstream.is_some() {
        config.cache.upstream = args.upstream;
    }

    let app = open_app(db, &config, Arc::new(LogSink));
    let shutdown = CancellationToken::new();
    let listener = app.spawn_listener(shutdown.clone());
    app.refresh();

    let worker = OfflineCacheWorker::new(CacheStorage::new(db.clone()), build_fetcher(&config)?)
        .with_cache_name(config.cache.name.clone())
        .with_manifest(config.cache.manifest.clone())
        .with_fallback_path(config.cache.fallback_path.clone());
    match worker.start().await {
        Ok(deleted) => info!(cache = %worker.cache_name(), removed_caches = deleted.len(), "offline cache ready"),
        // Requests still reach the origin directly
        Err(e) => warn!(error = %e, "offline cache unavailable"),
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = WebState::new(app.clone(), Arc::new(worker));
    let (server_shutdown, bound) = web::start_server(state, addr).await?;
    println!("Serving on http://{}", bound);

    tokio::signal::ctrl_c().await?;
    let _ = server_shutdown.send(());
    shutdown.cancel();
    app.scheduler().cancel_all();
    let _ = listener.await;
    Ok(())
}
