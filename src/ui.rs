use ratatui::{
    Frame,
    layout::Alignment,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::app::{App, Editor, Focus, InputMode};

/// Lines of log history shown in the debug pane.
const DEBUG_PANE_HEIGHT: u16 = 8;

/// Main entry point for drawing the TUI. Dispatches to individual pane drawers.
pub fn draw(f: &mut Frame, app: &mut App) {
    let mut constraints = vec![
        Constraint::Length(3), // Header
        Constraint::Min(10),   // Main Content (Templates + Keywords + Output)
        Constraint::Length(3), // Input
        Constraint::Length(5), // Status/Shortcuts
    ];
    if app.show_debug {
        constraints.push(Constraint::Length(DEBUG_PANE_HEIGHT + 2));
    }
    let vertical_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.area());

    let header = Paragraph::new(format!("keyplate {}", app.session.app_version()))
        .style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta)),
        )
        .alignment(Alignment::Center);
    f.render_widget(header, vertical_chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage(30),
                Constraint::Percentage(25),
                Constraint::Percentage(45),
            ]
            .as_ref(),
        )
        .split(vertical_chunks[1]);

    match &app.editor {
        Some(editor) => draw_editor(f, editor, vertical_chunks[1]),
        None => {
            draw_template_pane(f, app, main_chunks[0]);
            draw_keyword_pane(f, app, main_chunks[1]);
            draw_output_pane(f, app, main_chunks[2]);
        }
    }
    draw_input_pane(f, app, vertical_chunks[2]);
    draw_status_pane(f, app, vertical_chunks[3]);
    if app.show_debug {
        draw_debug_pane(f, app, vertical_chunks[4]);
    }
}

fn pane_border(focused: bool, color: Color) -> Style {
    if focused {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

/// Renders the list of templates matching the search query.
fn draw_template_pane(f: &mut Frame, app: &App, area: Rect) {
    let selected = app.session.selected_index();
    let visible = app.visible_templates();
    let items: Vec<ListItem> = if app.session.is_loading() {
        vec![ListItem::new("Loading templates...")
            .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))]
    } else if visible.is_empty() {
        vec![ListItem::new("No templates found.").style(Style::default().fg(Color::Yellow))]
    } else {
        visible
            .iter()
            .map(|&(index, name)| {
                if Some(index) == selected {
                    ListItem::new(format!("[X] {name}"))
                        .style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
                } else {
                    ListItem::new(format!("[ ] {name}"))
                }
            })
            .collect()
    };

    let mut state = ListState::default();
    if !visible.is_empty() {
        state.select(Some(app.highlighted_index));
    }

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Templates ({}) ", app.session.store.len()))
                .border_style(pane_border(app.focus == Focus::Templates, Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    f.render_stateful_widget(list, area, &mut state);
}

/// Renders the selected template's keywords with their current replacements.
fn draw_keyword_pane(f: &mut Frame, app: &App, area: Rect) {
    let keywords = app.session.selected().map(|t| t.keywords.as_slice()).unwrap_or_default();
    let items: Vec<ListItem> = if keywords.is_empty() {
        vec![ListItem::new("No keywords.").style(Style::default().fg(Color::DarkGray))]
    } else {
        keywords
            .iter()
            .map(|keyword| {
                let mut spans = vec![
                    Span::styled(keyword.text.clone(), Style::default().add_modifier(Modifier::BOLD)),
                    Span::styled(
                        format!(" ({})", keyword.description),
                        Style::default().fg(Color::DarkGray),
                    ),
                ];
                if let Some(value) = app.session.replacements.get(&keyword.text) {
                    spans.push(Span::styled(format!(" → {value}"), Style::default().fg(Color::Green)));
                }
                ListItem::new(Line::from(spans))
            })
            .collect()
    };

    let mut state = ListState::default();
    if !keywords.is_empty() && app.custom_keyword.is_none() {
        state.select(Some(app.keyword_index));
    }

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Keywords ")
                .border_style(pane_border(app.focus == Focus::Keywords, Color::Cyan)),
        )
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
        .highlight_symbol("▶ ");

    f.render_stateful_widget(list, area, &mut state);
}

fn draw_output_pane(f: &mut Frame, app: &App, area: Rect) {
    let title = match app.session.selected() {
        Some(template) => format!(" Output: {} ", template.name),
        None => " Output ".to_string(),
    };
    let output = Paragraph::new(app.output.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(
                    title,
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ))
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.output_scroll, 0));

    f.render_widget(output, area);
}

/// Renders the single-line input used by search and the text fields.
fn draw_input_pane(f: &mut Frame, app: &App, area: Rect) {
    let (title, text) = match app.input_mode {
        InputMode::Normal => (
            " Search (Press '/' to browse) ".to_string(),
            app.search_query.as_str(),
        ),
        InputMode::Search => (" Search (Typing...) ".to_string(), app.search_query.as_str()),
        InputMode::Replacement => (
            format!(
                " Replacement for {} ",
                app.current_target_label().unwrap_or_default()
            ),
            app.input.as_str(),
        ),
        InputMode::CustomKeyword => (" Custom keyword ".to_string(), app.input.as_str()),
        InputMode::ImportPath => (" Import template file ".to_string(), app.input.as_str()),
        InputMode::OutputEdit => (" Editing output (Esc to finish) ".to_string(), ""),
        InputMode::DraftName => (" Template name ".to_string(), app.input.as_str()),
        InputMode::DraftContent => (
            " Template content (Enter for a new line, Esc to finish) ".to_string(),
            app.input.lines().last().unwrap_or_default(),
        ),
        InputMode::DraftKeyword => (" New keyword ".to_string(), app.input.as_str()),
        InputMode::DraftDescription => (
            format!(
                " Description of {} ",
                app.editor
                    .as_ref()
                    .and_then(|e| e.pending_keyword.as_deref())
                    .unwrap_or_default()
            ),
            app.input.as_str(),
        ),
        InputMode::DraftOpenPath => (" Open template file ".to_string(), app.input.as_str()),
    };
    let typing = app.input_mode != InputMode::Normal;
    let input_style = if typing {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let input = Paragraph::new(text).style(input_style).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(title, input_style))
            .border_style(input_style),
    );
    f.render_widget(input, area);

    if typing {
        let cursor_x = area
            .x
            .saturating_add(1)
            .saturating_add(text.chars().count() as u16);
        let max_x = area.x.saturating_add(area.width.saturating_sub(1));
        f.set_cursor_position((cursor_x.min(max_x), area.y + 1));
    }
}

/// Renders the bottom status bar with the latest message and key shortcuts.
fn draw_status_pane(f: &mut Frame, app: &App, area: Rect) {
    let mut status_lines = Vec::new();

    if let Some(msg) = &app.notification {
        status_lines.push(Line::from(vec![
            Span::styled(
                " OK ",
                Style::default()
                    .bg(Color::Green)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(msg.as_str(), Style::default().fg(Color::LightGreen)),
        ]));
    } else if let Some(err) = &app.error {
        status_lines.push(Line::from(vec![
            Span::styled(
                " ERROR ",
                Style::default()
                    .bg(Color::Red)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(err.as_str(), Style::default().fg(Color::LightRed)),
        ]));
    } else if let Some(release) = &app.pending_update {
        status_lines.push(Line::from(vec![
            Span::styled(
                " UPDATE ",
                Style::default()
                    .bg(Color::Yellow)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::raw(format!("{} is available at {}", release.tag_name, release.html_url)),
        ]));
    } else {
        let replaced = app.session.replacements.len();
        status_lines.push(Line::from(vec![
            Span::styled(
                format!(" REPLACEMENTS ({replaced}) "),
                Style::default()
                    .bg(Color::Cyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(
                app.session.templates_dir().display().to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    }

    status_lines.push(Line::from(""));

    let shortcuts: &[(&str, &str)] = if app.editor.is_some() {
        &[
            ("N", "Name"),
            ("C", "Content"),
            ("A", "Add Keyword"),
            ("D", "Remove Keyword"),
            ("O", "Open"),
            ("X", "Clear"),
            ("S", "Save"),
            ("Q", "Close"),
        ]
    } else {
        &[
            ("/", "Search"),
            ("ENTER", "Select"),
            ("TAB", "Focus"),
            ("E", "Replace"),
            ("C", "Custom"),
            ("M", "Edit Output"),
            ("R", "Render"),
            ("W", "Write"),
            ("N", "Editor"),
            ("O", "Import"),
            ("F5", "Reload"),
            ("S", "Sync"),
            ("U", "Update"),
            ("Q", "Quit"),
        ]
    };

    let mut shortcut_spans = Vec::new();
    for (i, (key, desc)) in shortcuts.iter().enumerate() {
        if i > 0 {
            shortcut_spans.push(Span::raw(" "));
        }
        shortcut_spans.push(Span::styled(
            format!(" {key} "),
            Style::default()
                .bg(Color::DarkGray)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
        shortcut_spans.push(Span::raw(format!(" {desc}")));
    }
    status_lines.push(Line::from(shortcut_spans));

    let status = Paragraph::new(status_lines)
        .block(Block::default().borders(Borders::ALL).title(" Info & Controls "));
    f.render_widget(status, area);
}

/// Renders the template editor in place of the main panes.
fn draw_editor(f: &mut Frame, editor: &Editor, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)].as_ref())
        .split(area);

    let record = editor.draft.to_record();
    let marker = if editor.draft.is_saved() { "" } else { " *" };

    let items: Vec<ListItem> = if record.keywords.is_empty() {
        vec![ListItem::new("No keywords, press 'a' to add one.").style(Style::default().fg(Color::DarkGray))]
    } else {
        record
            .keywords
            .iter()
            .map(|k| {
                ListItem::new(Line::from(vec![
                    Span::styled(k.text.clone(), Style::default().add_modifier(Modifier::BOLD)),
                    Span::styled(format!(" ({})", k.description), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect()
    };
    let mut state = ListState::default();
    if !record.keywords.is_empty() {
        state.select(Some(editor.keyword_index));
    }
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Draft Keywords ")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, chunks[0], &mut state);

    let name = if record.name.is_empty() { "untitled" } else { record.name.as_str() };
    let content = Paragraph::new(record.content.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(
                    format!(" Editing: {name}{marker} "),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ))
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(content, chunks[1]);
}

fn draw_debug_pane(f: &mut Frame, app: &App, area: Rect) {
    let lines = app.logs.lines();
    let skip = lines.len().saturating_sub(DEBUG_PANE_HEIGHT as usize);
    let text: Vec<Line> = lines.into_iter().skip(skip).map(Line::from).collect();
    let pane = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Debug Log ")
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(pane, area);
}

/// Content of a modal question.
pub struct Dialog<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub detail: Option<&'a str>,
    /// Key hint and label for each answer.
    pub options: &'a [(&'a str, &'a str, Color)],
}

/// Renders a centered modal asking the user to pick one of `dialog.options`.
pub fn draw_dialog(f: &mut Frame, dialog: &Dialog) {
    let modal_area = centered_rect(60, 50, f.area());
    f.render_widget(Clear, modal_area);

    let block = Block::default()
        .title(format!(" {} ", dialog.title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let mut text = vec![Line::from(""), Line::from(dialog.message), Line::from("")];
    if let Some(detail) = dialog.detail {
        text.extend(
            detail
                .lines()
                .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::DarkGray)))),
        );
        text.push(Line::from(""));
    }

    let mut options = Vec::new();
    for (i, (key, label, color)) in dialog.options.iter().enumerate() {
        if i > 0 {
            options.push(Span::raw("    "));
        }
        options.push(Span::styled(
            format!(" [{key}] {label} "),
            Style::default().fg(*color).add_modifier(Modifier::BOLD),
        ));
    }
    text.push(Line::from(options));

    let paragraph = Paragraph::new(text)
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, modal_area);
}

/// Helper function to create a centered rectangle for popups/modals.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}
