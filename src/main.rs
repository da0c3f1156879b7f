mod action;
mod app;
mod auth;
mod config;
mod editor;
mod engine;
mod error;
mod event;
mod filter;
mod git;
mod github;
mod remote;
mod review;
mod service;
mod tui;
mod types;
mod ui;
mod worktree;

use std::fs::OpenOptions;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::action::Action;
use crate::app::App;
use crate::config::{Cli, Config};
use crate::editor::EditorCommand;
use crate::engine::{SyncEngine, SyncMsg};
use crate::error::{Result, WatchError};
use crate::event::Event;
use crate::github::GitHub;
use crate::remote::RemoteIdentity;
use crate::service::ReviewService;
use crate::tui::EventHandler;
use crate::ui::theme::Theme;
use crate::worktree::WorktreeManager;

/// Everything startup has to establish before the TUI opens
struct Session {
    repo: RemoteIdentity,
    root: PathBuf,
    user: String,
    service: Arc<dyn ReviewService>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref());
    let config = Config::load().with_cli(&cli);

    let session = match connect(&config).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = tui::restore();
        original_hook(panic_info);
    }));

    let result = run(session, &config).await;

    // Restore terminal
    let _ = tui::restore();

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to a file: the TUI owns the terminal.
fn init_logging(log_file: Option<&Path>) {
    let path = log_file
        .map(Path::to_path_buf)
        .or_else(|| dirs::cache_dir().map(|dir| dir.join("prwatch").join("prwatch.log")));

    let file = path.and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });

    let writer = match file {
        Some(file) => BoxMakeWriter::new(Mutex::new(file)),
        None => BoxMakeWriter::new(std::io::sink),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .init();
}

/// Startup preconditions: a git repository, a parseable remote, a token and
/// a reachable service. Any failure here is fatal.
async fn connect(config: &Config) -> Result<Session> {
    let cwd = std::env::current_dir()?;
    let root = git::repo_root(&cwd)?;
    let url = git::remote_url(&root, &config.general.remote)?;
    let repo = RemoteIdentity::parse(&url)?;

    let (token, source) = auth::token_for_host(&repo.host, config)?;
    tracing::info!(host = %repo.host, %source, "using token");

    let github = GitHub::new(&repo.host, token)?;
    let user = github.current_user().await?;
    tracing::info!(service = github.name(), %repo, %user, root = %root.display(), "connected");

    Ok(Session {
        repo,
        root,
        user,
        service: Arc::new(github),
    })
}

async fn run(session: Session, config: &Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize terminal
    let mut terminal = tui::init()?;

    // Create action channel
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    let engine = SyncEngine::new(session.user, &session.root, config.general.default_filter);
    let worktrees = WorktreeManager::new(&session.root, &config.general.remote);
    let mut app = App::new(engine, session.repo, session.service, worktrees, action_tx);
    let theme = Theme::default();

    let render_rate = Duration::from_millis(16); // ~60fps
    let mut events = Some(EventHandler::new(render_rate));

    // First tick fires immediately and loads the list
    let mut refresh = tokio::time::interval(config.refresh_interval());
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Running editor; the terminal is suspended while this is set
    let mut editor: Option<JoinHandle<Result<()>>> = None;

    // Main loop
    loop {
        tokio::select! {
            Some(event) = next_event(&mut events) => {
                if event.is_quit() {
                    break;
                }

                match event {
                    Event::Render => {
                        terminal.draw(|frame| ui::render(frame, &app, &theme))?;
                    }
                    _ => {
                        let action = app.handle_event(event);
                        if !matches!(action, Action::None) {
                            app.update(action);
                        }
                    }
                }
            }
            Some(action) = action_rx.recv() => {
                app.update(action);
            }
            _ = refresh.tick() => {
                app.update(Action::Refresh);
            }
            result = wait_editor(&mut editor), if editor.is_some() => {
                editor = None;
                tui::resume(&mut terminal)?;
                events = Some(EventHandler::new(render_rate));
                app.update(Action::Sync(SyncMsg::EditorClosed(result)));
            }
        }

        if app.should_quit {
            break;
        }

        if let Some(path) = app.take_editor_request() {
            // Stop reading keys so the editor gets them
            events = None;
            tui::restore()?;
            tracing::info!(path = %path.display(), "opening editor");

            let configured = config.general.editor.clone();
            editor = Some(tokio::task::spawn_blocking(move || {
                EditorCommand::resolve(configured.as_deref())?.open(&path)
            }));
        }
    }

    Ok(())
}

async fn next_event(events: &mut Option<EventHandler>) -> Option<Event> {
    match events {
        Some(handler) => handler.next().await,
        None => std::future::pending().await,
    }
}

async fn wait_editor(task: &mut Option<JoinHandle<Result<()>>>) -> Result<()> {
    match task.as_mut() {
        Some(handle) => handle
            .await
            .unwrap_or_else(|e| Err(WatchError::Editor(format!("editor task failed: {}", e)))),
        None => std::future::pending().await,
    }
}
