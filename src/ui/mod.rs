use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::state::{AppState, DraftField, NoteDraft, Screen};

/// Badge palette, indexed by importance level 0..4.
pub const IMPORTANCE_COLORS: [Color; 5] = [
    Color::DarkGray,
    Color::Blue,
    Color::Green,
    Color::Yellow,
    Color::Red,
];

pub fn importance_color(level: u8) -> Color {
    IMPORTANCE_COLORS[usize::from(level) % IMPORTANCE_COLORS.len()]
}

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    match state.screen {
        Screen::List => draw_list_screen(frame, state, list_state),
        Screen::Edit => draw_edit_screen(frame, state),
    }
}

fn draw_list_screen(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(2)])
        .split(frame.size());

    let card_width = vertical[0].width.saturating_sub(4) as usize;
    let mut items = Vec::with_capacity(state.notes.len());
    for note in &state.notes {
        let mut lines = Vec::with_capacity(1 + state.preview_lines);
        lines.push(Line::from(vec![
            Span::styled(
                "● ",
                Style::default()
                    .fg(importance_color(note.importance))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                truncate_to_width(&note.title, card_width),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]));
        for preview_line in preview_lines(&note.content, state.preview_lines, card_width) {
            lines.push(Line::from(Span::styled(
                format!("  {preview_line}"),
                Style::default().fg(Color::Gray),
            )));
        }
        items.push(ListItem::new(lines));
    }
    if items.is_empty() {
        items.push(ListItem::new("No notes yet. Press `a` to create one."));
    }

    let list = List::new(items)
        .block(Block::default().title("Have to do").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, vertical[0], list_state);

    let status = build_list_status(state);
    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(Color::Gray)),
        vertical[1],
    );
}

fn draw_edit_screen(frame: &mut Frame, state: &AppState) {
    let Some(draft) = state.draft() else {
        return;
    };

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let title_block = field_block("Title", draft.focus() == DraftField::Title);
    frame.render_widget(
        Paragraph::new(draft.title().to_string()).block(title_block),
        vertical[0],
    );

    let slider_block = field_block("Importance", draft.focus() == DraftField::Importance);
    frame.render_widget(
        Paragraph::new(Line::from(slider_spans(draft.importance()))).block(slider_block),
        vertical[1],
    );

    let content_block = field_block("Content", draft.focus() == DraftField::Content);
    frame.render_widget(
        Paragraph::new(draft.content().to_string())
            .block(content_block)
            .wrap(Wrap { trim: false }),
        vertical[2],
    );

    if let Some((x, y)) = draft_cursor_position(draft, vertical[0], vertical[2]) {
        frame.set_cursor(x, y);
    }

    let status = build_edit_status(state, draft);
    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(Color::Gray)),
        vertical[3],
    );
}

fn field_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(style)
}

fn slider_spans(importance: u8) -> Vec<Span<'static>> {
    let mut spans = Vec::with_capacity(IMPORTANCE_COLORS.len() * 2 + 1);
    for level in 0..IMPORTANCE_COLORS.len() as u8 {
        if level > 0 {
            spans.push(Span::styled("──", Style::default().fg(Color::DarkGray)));
        }
        if level == importance {
            spans.push(Span::styled(
                "●",
                Style::default()
                    .fg(importance_color(level))
                    .add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled("○", Style::default().fg(Color::DarkGray)));
        }
    }
    spans.push(Span::styled(
        format!("  level {importance}"),
        Style::default().fg(importance_color(importance)),
    ));
    spans
}

fn draft_cursor_position(
    draft: &NoteDraft,
    title_area: Rect,
    content_area: Rect,
) -> Option<(u16, u16)> {
    match draft.focus() {
        DraftField::Title => {
            let prefix = &draft.title()[..draft.cursor()];
            let x = title_area.x + 1 + prefix.width() as u16;
            Some((
                x.min(title_area.right().saturating_sub(2)),
                title_area.y + 1,
            ))
        }
        DraftField::Content => {
            let prefix = &draft.content()[..draft.cursor()];
            let row = prefix.matches('\n').count() as u16;
            let line = prefix.rsplit('\n').next().unwrap_or("");
            let x = content_area.x + 1 + line.width() as u16;
            let y = content_area.y + 1 + row;
            if y < content_area.bottom().saturating_sub(1) {
                Some((x.min(content_area.right().saturating_sub(2)), y))
            } else {
                None
            }
        }
        DraftField::Importance => None,
    }
}

fn build_list_status(state: &AppState) -> Text<'static> {
    let total = state.len();
    let position = if state.is_empty() {
        "0/0".to_string()
    } else {
        format!("{}/{}", state.selected + 1, total)
    };

    let mut spans = vec![
        Span::raw(format!("Total: {total}")),
        Span::raw(" | Selected: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | j/k move • Enter edit • a add • q quit"),
    ];
    if let Some(message) = &state.status_message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Cyan),
        ));
    }
    Text::from(Line::from(spans))
}

fn build_edit_status(state: &AppState, draft: &NoteDraft) -> Text<'static> {
    let mode = if draft.is_insert() { "NEW" } else { "EDIT" };
    let mut spans = vec![
        Span::raw("Mode: "),
        Span::styled(
            mode,
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Tab field • Ctrl-s save • Ctrl-d delete • Esc back"),
    ];
    if let Some(message) = &state.status_message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Cyan),
        ));
    }
    Text::from(Line::from(spans))
}

/// First `max_lines` content lines, each cut to `max_width` columns, with
/// an ellipsis when anything was dropped.
pub fn preview_lines(content: &str, max_lines: usize, max_width: usize) -> Vec<String> {
    if max_lines == 0 {
        return Vec::new();
    }
    let mut lines = content.lines();
    let mut collected = Vec::with_capacity(max_lines);
    for _ in 0..max_lines {
        match lines.next() {
            Some(line) => collected.push(truncate_to_width(line.trim_end(), max_width)),
            None => break,
        }
    }
    if lines.next().is_some() {
        match collected.last_mut() {
            Some(last) => last.push('…'),
            None => collected.push("…".to_string()),
        }
    }
    collected
}

fn truncate_to_width(line: &str, max_width: usize) -> String {
    if line.width() <= max_width {
        return line.to_string();
    }
    let limit = max_width.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for ch in line.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > limit {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_cuts_lines_and_marks_the_rest() {
        let content = "first line\nsecond line\nthird line";
        let preview = preview_lines(content, 2, 80);
        assert_eq!(preview, vec!["first line", "second line…"]);
    }

    #[test]
    fn preview_of_short_content_is_untouched() {
        let preview = preview_lines("only line", 3, 80);
        assert_eq!(preview, vec!["only line"]);
    }

    #[test]
    fn wide_lines_are_cut_to_the_column_limit() {
        let cut = truncate_to_width("abcdefgh", 5);
        assert_eq!(cut, "abcd…");
        assert!(cut.width() <= 5);
    }

    #[test]
    fn every_importance_level_has_a_badge_color() {
        let colors: Vec<Color> = (0u8..5).map(importance_color).collect();
        assert_eq!(colors.len(), 5);
        for pair in colors.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }
}
