use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use keyplate::prompt::{Confirm, Decision, Resolution};
use ratatui::{Terminal, backend::CrosstermBackend, style::Color};
use tracing::warn;

use crate::ui::{Dialog, draw_dialog};

/// Asks questions in a modal on the terminal and waits for a key.
pub struct TerminalPrompt<'a> {
    terminal: &'a mut Terminal<CrosstermBackend<io::Stdout>>,
}

impl<'a> TerminalPrompt<'a> {
    pub fn new(terminal: &'a mut Terminal<CrosstermBackend<io::Stdout>>) -> Self {
        Self { terminal }
    }

    /// Draws `dialog` and returns the first key code `pick` accepts.
    ///
    /// A terminal failure gives `None`.
    fn wait_for<T>(&mut self, dialog: &Dialog, pick: impl Fn(KeyCode) -> Option<T>) -> Option<T> {
        loop {
            if let Err(err) = self.terminal.draw(|f| draw_dialog(f, dialog)) {
                warn!("failed to draw dialog: {err}");
                return None;
            }
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if let Some(answer) = pick(key.code) {
                        return Some(answer);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("failed to read key: {err}");
                    return None;
                }
            }
        }
    }
}

impl Confirm for TerminalPrompt<'_> {
    fn ask_yes_no(&mut self, title: &str, message: &str, detail: Option<&str>) -> Decision {
        let dialog = Dialog {
            title,
            message,
            detail,
            options: &[("Y", "Yes", Color::Green), ("N", "No", Color::Red)],
        };
        self.wait_for(&dialog, |code| match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(Decision::Yes),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(Decision::No),
            _ => None,
        })
        .unwrap_or(Decision::No)
    }

    fn ask_resolution(&mut self, title: &str, message: &str, detail: Option<&str>) -> Resolution {
        let dialog = Dialog {
            title,
            message,
            detail,
            options: &[
                ("O", "Overwrite", Color::Red),
                ("R", "Keep both", Color::Green),
                ("S", "Skip", Color::Yellow),
            ],
        };
        self.wait_for(&dialog, |code| match code {
            KeyCode::Char('o') | KeyCode::Char('O') => Some(Resolution::Overwrite),
            KeyCode::Char('r') | KeyCode::Char('R') => Some(Resolution::Rename),
            KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Esc => Some(Resolution::Skip),
            _ => None,
        })
        .unwrap_or(Resolution::Skip)
    }
}
