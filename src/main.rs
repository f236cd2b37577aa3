mod app;
mod dialog;
mod ui;

use std::path::{Path, PathBuf};
use std::{io, time::Duration};

use anyhow::{Context, Result, anyhow};
use app::{App, Focus, InputMode};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use directories::ProjectDirs;
use keyplate::api::{GithubClient, RemoteRepo};
use keyplate::commands::{self, ABOUT_DISCOVERY, Command};
use keyplate::config::APP_VERSION;
use keyplate::error::ApiError;
use keyplate::loader::{self, FileOutcome};
use keyplate::logging::{self, LogBuffer};
use keyplate::models::Release;
use keyplate::prompt::{Confirm, Decision};
use keyplate::session::Session;
use keyplate::sync;
use keyplate::update::{self, UpdateStatus};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::dialog::TerminalPrompt;
use crate::ui::draw;

/// Log lines kept for the debug pane.
const LOG_CAPACITY: usize = 500;

/// File the rendered output is written to, relative to the working directory.
const OUTPUT_FILE: &str = "keyplate-output.txt";

/// Fill keyword placeholders in text templates.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Directory templates are loaded from and synchronized into.
    #[arg(long, value_name = "DIR")]
    templates: Option<PathBuf>,

    /// Show the debug log pane and log at debug level.
    #[arg(long)]
    debug: bool,

    /// Skip the start-up update check and disable sync.
    #[arg(long)]
    offline: bool,
}

enum AppEvent {
    UpdateChecked(Result<Release, ApiError>),
}

struct TerminalSession {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalSession {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }

    fn terminal_mut(&mut self) -> &mut Terminal<CrosstermBackend<io::Stdout>> {
        &mut self.terminal
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        );
        let _ = self.terminal.show_cursor();
    }
}

fn default_templates_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "keyplate", "keyplate")
        .context("could not determine a data directory for this platform")?;
    Ok(dirs.data_dir().join("templates"))
}

fn reload(app: &mut App, prompt: &mut dyn Confirm) {
    match loader::load_dir(&mut app.session, prompt) {
        Ok(summary) => app.notify(format!(
            "Loaded {} templates ({} configs, {} duplicates, {} rejected).",
            summary.loaded, summary.configs, summary.duplicates, summary.rejected
        )),
        Err(err) => {
            error!("{err}");
            app.fail(err.to_string());
        }
    }
    app.on_store_changed();
}

fn import(app: &mut App, path: &str, prompt: &mut dyn Confirm) {
    let path = PathBuf::from(path.trim());
    match loader::import_file(&mut app.session, &path, prompt) {
        FileOutcome::Loaded(name) => app.notify(format!("Imported template {name}.")),
        FileOutcome::Config(Ok(outcome)) => {
            app.notify(format!("Applied {} config entries.", outcome.applied))
        }
        FileOutcome::Config(Err(err)) => app.fail(err.to_string()),
        FileOutcome::Duplicate(existing) => {
            app.fail(format!("Same content as the loaded template {existing}."))
        }
        FileOutcome::Rejected(err) => app.fail(err.to_string()),
    }
    app.on_store_changed();
}

fn save_draft(app: &mut App, prompt: &mut dyn Confirm) {
    let dir = app.session.templates_dir().to_path_buf();
    let Some(editor) = app.editor.as_mut() else {
        return;
    };
    match editor.draft.save(&dir, prompt) {
        Ok(Some(path)) => {
            reload(app, prompt);
            app.notify(format!("Template saved to {}.", path.display()));
        }
        Ok(None) => app.notify("Save cancelled."),
        Err(err) => {
            error!("{err}");
            app.fail(err.to_string());
        }
    }
}

/// `true` when there is nothing unsaved or the user agrees to drop it.
fn confirm_discard(app: &App, prompt: &mut dyn Confirm) -> bool {
    !app.has_unsaved_draft()
        || prompt.ask_yes_no(
            "Unsaved template",
            "The template has unsaved changes. Discard them?",
            None,
        ) == Decision::Yes
}

async fn run_sync(app: &mut App, client: &GithubClient, prompt: &mut dyn Confirm) {
    let repo = client.repo();
    info!(
        "syncing templates from {}/{} ({}, {})",
        repo.owner, repo.repo, repo.reference, repo.templates_path
    );
    match sync::synchronize(&mut app.session, client, prompt).await {
        Ok(summary) => app.notify(summary.to_string()),
        Err(err) => {
            error!("sync failed: {err}");
            app.fail(format!("Sync failed: {err}"));
        }
    }
    app.on_store_changed();
}

/// Applies a finished release lookup. `manual` reports an up-to-date result
/// as well.
fn apply_update_check(app: &mut App, result: Result<Release, ApiError>, manual: bool) {
    let release = match result {
        Ok(release) => release,
        Err(err) => {
            error!("update check failed: {err}");
            app.fail(format!("Update check failed: {err}"));
            return;
        }
    };
    match update::check(app.session.app_version(), release, &app.session.configs) {
        UpdateStatus::Available(release) => {
            app.notify(format!(
                "Version {} is available. Press 'x' to stop reminding about it.",
                release.tag_name
            ));
            app.pending_update = Some(release);
        }
        UpdateStatus::Ignored(release) if manual => {
            app.notify(format!("Version {} is available but ignored.", release.tag_name));
        }
        UpdateStatus::UpToDate if manual => app.notify("Already on the latest version."),
        UpdateStatus::AheadOfRelease if manual => {
            app.notify("Running a version newer than the latest release.")
        }
        _ => {}
    }
}

fn ignore_pending_update(app: &mut App) {
    let Some(release) = app.pending_update.take() else {
        app.fail("No update to ignore.");
        return;
    };
    match update::ignore_version(&mut app.session, &release.tag_name) {
        Ok(_) => app.notify(format!("Version {} will not be offered again.", release.tag_name)),
        Err(err) => {
            error!("failed to save ignored version: {err}");
            app.fail(format!("Failed to save ignored version: {err}"));
        }
    }
}

async fn run_command(
    app: &mut App,
    command: Command,
    client: &GithubClient,
    offline: bool,
    prompt: &mut dyn Confirm,
) {
    match command {
        Command::EnableDebug => {
            app.show_debug = true;
            app.notify("Debug mode enabled.");
        }
        Command::DisableDebug => {
            app.show_debug = false;
            app.notify("Debug mode disabled.");
        }
        Command::ShowUpdate => {
            let result = client.latest_release().await;
            apply_update_check(app, result, true);
        }
        Command::SyncTemplates if offline => app.fail("Sync is disabled in offline mode."),
        Command::SyncTemplates => run_sync(app, client, prompt).await,
        Command::About => {
            app.output = commands::about_text(APP_VERSION);
            match commands::discover(&mut app.session, ABOUT_DISCOVERY) {
                Ok(true) => app.notify(format!("Discovered [{ABOUT_DISCOVERY}].")),
                Ok(false) => app.clear_status(),
                Err(err) => app.fail(format!("Failed to save discoveries: {err}")),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let logs = LogBuffer::new(LOG_CAPACITY);
    logging::init(logs.clone(), cli.debug).map_err(|e| anyhow!(e))?;

    let templates_dir = match cli.templates {
        Some(dir) => dir,
        None => default_templates_dir()?,
    };
    let client = GithubClient::new(RemoteRepo::default())?;
    info!("keyplate {APP_VERSION} starting, templates in {}", templates_dir.display());

    let mut tui = TerminalSession::new()?;
    let mut app = App::new(Session::new(templates_dir), logs, cli.debug);
    reload(&mut app, &mut TerminalPrompt::new(tui.terminal_mut()));

    let (tx, mut rx) = mpsc::channel(8);
    if !cli.offline {
        let client = client.clone();
        tokio::spawn(async move {
            let result = client.latest_release().await;
            let _ = tx.send(AppEvent::UpdateChecked(result)).await;
        });
    }

    'main_loop: loop {
        tui.terminal_mut().draw(|f| draw(f, &mut app))?;

        while let Ok(ev) = rx.try_recv() {
            match ev {
                AppEvent::UpdateChecked(result) => apply_update_check(&mut app, result, false),
            }
        }

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.input_mode {
            InputMode::Search => match key.code {
                KeyCode::Char(c) => {
                    app.clear_status();
                    app.search_query.push(c);
                    app.apply_filter();
                }
                KeyCode::Backspace => {
                    app.clear_status();
                    app.search_query.pop();
                    app.apply_filter();
                }
                KeyCode::Esc | KeyCode::Enter => {
                    app.input_mode = InputMode::Normal;
                }
                KeyCode::Down => app.next(),
                KeyCode::Up => app.previous(),
                _ => {}
            },
            InputMode::Replacement => match key.code {
                KeyCode::Char(c) => {
                    app.input.push(c);
                    app.update_replacement();
                }
                KeyCode::Backspace => {
                    app.input.pop();
                    app.update_replacement();
                }
                KeyCode::Esc | KeyCode::Enter => {
                    app.input.clear();
                    app.input_mode = InputMode::Normal;
                }
                _ => {}
            },
            InputMode::CustomKeyword => match key.code {
                KeyCode::Char(c) => app.input.push(c),
                KeyCode::Backspace => {
                    app.input.pop();
                }
                KeyCode::Enter => {
                    if let Some(command) = app.submit_custom_keyword() {
                        let mut prompt = TerminalPrompt::new(tui.terminal_mut());
                        run_command(&mut app, command, &client, cli.offline, &mut prompt).await;
                    }
                }
                KeyCode::Esc => {
                    app.input.clear();
                    app.input_mode = InputMode::Normal;
                }
                _ => {}
            },
            InputMode::ImportPath => match key.code {
                KeyCode::Char(c) => app.input.push(c),
                KeyCode::Backspace => {
                    app.input.pop();
                }
                KeyCode::Enter => {
                    let path = std::mem::take(&mut app.input);
                    app.input_mode = InputMode::Normal;
                    if !path.trim().is_empty() {
                        import(&mut app, &path, &mut TerminalPrompt::new(tui.terminal_mut()));
                    }
                }
                KeyCode::Esc => {
                    app.input.clear();
                    app.input_mode = InputMode::Normal;
                }
                _ => {}
            },
            InputMode::OutputEdit => match key.code {
                KeyCode::Char(c) => app.type_into_output(c),
                KeyCode::Backspace => app.output_backspace(),
                KeyCode::Enter => app.type_into_output('\n'),
                KeyCode::Esc => app.input_mode = InputMode::Normal,
                _ => {}
            },
            InputMode::DraftName => match key.code {
                KeyCode::Char(c) => {
                    app.input.push(c);
                    app.update_draft_field();
                }
                KeyCode::Backspace => {
                    app.input.pop();
                    app.update_draft_field();
                }
                KeyCode::Esc | KeyCode::Enter => {
                    app.input.clear();
                    app.input_mode = InputMode::Normal;
                }
                _ => {}
            },
            InputMode::DraftContent => match key.code {
                KeyCode::Char(c) => {
                    app.input.push(c);
                    app.update_draft_field();
                }
                KeyCode::Backspace => {
                    app.input.pop();
                    app.update_draft_field();
                }
                KeyCode::Enter => {
                    app.input.push('\n');
                    app.update_draft_field();
                }
                KeyCode::Esc => {
                    app.input.clear();
                    app.input_mode = InputMode::Normal;
                }
                _ => {}
            },
            InputMode::DraftKeyword | InputMode::DraftDescription => match key.code {
                KeyCode::Char(c) => app.input.push(c),
                KeyCode::Backspace => {
                    app.input.pop();
                }
                KeyCode::Enter => app.submit_draft_keyword(),
                KeyCode::Esc => {
                    if let Some(editor) = app.editor.as_mut() {
                        editor.pending_keyword = None;
                    }
                    app.input.clear();
                    app.input_mode = InputMode::Normal;
                }
                _ => {}
            },
            InputMode::DraftOpenPath => match key.code {
                KeyCode::Char(c) => app.input.push(c),
                KeyCode::Backspace => {
                    app.input.pop();
                }
                KeyCode::Enter => {
                    let path = std::mem::take(&mut app.input);
                    app.input_mode = InputMode::Normal;
                    if !path.trim().is_empty() {
                        app.open_draft_file(Path::new(path.trim()));
                    }
                }
                KeyCode::Esc => {
                    app.input.clear();
                    app.input_mode = InputMode::Normal;
                }
                _ => {}
            },
            InputMode::Normal if app.editor.is_some() => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    if confirm_discard(&app, &mut TerminalPrompt::new(tui.terminal_mut())) {
                        app.close_editor();
                    }
                }
                KeyCode::Char('n') => app.begin_draft_field(InputMode::DraftName),
                KeyCode::Char('c') => app.begin_draft_field(InputMode::DraftContent),
                KeyCode::Char('a') => app.begin_draft_field(InputMode::DraftKeyword),
                KeyCode::Char('d') => app.remove_draft_keyword(),
                KeyCode::Down | KeyCode::Char('j') => app.next_draft_keyword(),
                KeyCode::Up | KeyCode::Char('k') => app.previous_draft_keyword(),
                KeyCode::Char('o') => {
                    if confirm_discard(&app, &mut TerminalPrompt::new(tui.terminal_mut())) {
                        app.begin_draft_field(InputMode::DraftOpenPath);
                    }
                }
                KeyCode::Char('x') => {
                    if confirm_discard(&app, &mut TerminalPrompt::new(tui.terminal_mut())) {
                        app.clear_draft();
                    }
                }
                KeyCode::Char('s') => save_draft(&mut app, &mut TerminalPrompt::new(tui.terminal_mut())),
                _ => {}
            },
            InputMode::Normal => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break 'main_loop,
                KeyCode::Char('/') | KeyCode::Char('i') => {
                    app.clear_status();
                    app.focus = Focus::Templates;
                    app.input_mode = InputMode::Search;
                }
                KeyCode::Down | KeyCode::Char('j') if key.modifiers.contains(KeyModifiers::ALT) => {
                    app.scroll_output(1)
                }
                KeyCode::Up | KeyCode::Char('k') if key.modifiers.contains(KeyModifiers::ALT) => {
                    app.scroll_output(-1)
                }
                KeyCode::PageDown => app.scroll_output(10),
                KeyCode::PageUp => app.scroll_output(-10),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Tab => app.toggle_focus(),
                KeyCode::Enter => match app.focus {
                    Focus::Templates => app.select_highlighted(),
                    Focus::Keywords => app.begin_replacement(),
                },
                KeyCode::Char('e') => app.begin_replacement(),
                KeyCode::Char('c') => app.begin_custom_keyword(),
                KeyCode::Char('r') => app.render(),
                KeyCode::Char('w') => app.write_output(&PathBuf::from(OUTPUT_FILE)),
                KeyCode::Char('n') => app.open_editor(),
                KeyCode::Char('m') => app.begin_output_edit(),
                KeyCode::Char('o') => {
                    app.input.clear();
                    app.input_mode = InputMode::ImportPath;
                }
                KeyCode::F(5) => reload(&mut app, &mut TerminalPrompt::new(tui.terminal_mut())),
                KeyCode::Char('s') if cli.offline => app.fail("Sync is disabled in offline mode."),
                KeyCode::Char('s') => {
                    let mut prompt = TerminalPrompt::new(tui.terminal_mut());
                    run_sync(&mut app, &client, &mut prompt).await;
                }
                KeyCode::Char('u') => {
                    app.notify("Checking for updates...");
                    tui.terminal_mut().draw(|f| draw(f, &mut app))?;
                    let result = client.latest_release().await;
                    apply_update_check(&mut app, result, true);
                }
                KeyCode::Char('x') => ignore_pending_update(&mut app),
                _ => {}
            },
        }
    }

    Ok(())
}
