use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::storage::StorageHandle;
use crate::ui;

mod actions;
pub mod state;

pub use state::{AppState, DraftField, NoteDraft, Screen};

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    AddNote,
    EditSelected,
    Refresh,
}

pub struct App {
    pub config: Arc<AppConfig>,
    pub storage: StorageHandle,
    state: AppState,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, storage: StorageHandle) -> Result<Self> {
        let preview_lines = config.preview_lines as usize;
        let state = AppState::load(&storage, preview_lines)
            .context("loading notes for initial state")?;
        let mut list_state = ListState::default();
        if !state.is_empty() {
            list_state.select(Some(state.selected));
        }
        Ok(Self {
            config,
            storage,
            state,
            list_state,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal
                .draw(|frame| {
                    if !self.state.is_empty() {
                        self.list_state.select(Some(self.state.selected));
                    } else {
                        self.list_state.select(None);
                    }
                    ui::draw_app(frame, &self.state, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            if event::poll(self.tick_rate).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {
                        // no-op: next draw will naturally adapt to the new size
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.state.is_editing() {
            self.handle_editor_key(key);
            return;
        }

        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Refresh)
            }
            KeyCode::Char('a')
                if !key.modifiers.intersects(
                    KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                ) =>
            {
                Some(Action::AddNote)
            }
            KeyCode::Enter => Some(Action::EditSelected),
            KeyCode::Char('e')
                if !key.modifiers.intersects(
                    KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                ) =>
            {
                Some(Action::EditSelected)
            }
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::AddNote => {
                self.state.open_insert_editor();
                self.state.set_status_message(Some(
                    "New note: Tab switches fields • Ctrl-s save • Esc discard",
                ));
            }
            Action::EditSelected => {
                if self.state.open_edit_selected() {
                    self.state.set_status_message(Some(
                        "Editing: Tab switches fields • Ctrl-s save • Ctrl-d delete • Esc back",
                    ));
                } else {
                    self.state.set_status_message(Some("No note selected"));
                }
            }
            Action::Refresh => {
                if let Err(err) = self.state.refresh(&self.storage) {
                    tracing::error!(?err, "failed to refresh notes from storage");
                    self.state
                        .set_status_message(Some("Could not refresh notes"));
                }
            }
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('s') => self.handle_save(),
                KeyCode::Char('d') => self.handle_delete(),
                KeyCode::Char('c') => self.should_quit = true,
                _ => {}
            }
            return;
        }

        if key.code == KeyCode::Esc {
            self.handle_back();
            return;
        }

        let Some(draft) = self.state.draft_mut() else {
            return;
        };

        match key.code {
            KeyCode::Tab => draft.focus_next(),
            KeyCode::BackTab => draft.focus_previous(),
            KeyCode::Enter => {
                if !draft.insert_newline() {
                    draft.focus_next();
                }
            }
            KeyCode::Backspace => {
                draft.backspace();
            }
            KeyCode::Delete => {
                draft.delete();
            }
            KeyCode::Left => {
                if draft.focus() == DraftField::Importance {
                    draft.step_importance(-1);
                } else {
                    draft.move_left();
                }
            }
            KeyCode::Right => {
                if draft.focus() == DraftField::Importance {
                    draft.step_importance(1);
                } else {
                    draft.move_right();
                }
            }
            KeyCode::Up => {
                draft.move_up();
            }
            KeyCode::Down => {
                draft.move_down();
            }
            KeyCode::Home => {
                draft.move_home();
            }
            KeyCode::End => {
                draft.move_end();
            }
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::ALT | KeyModifiers::SUPER) =>
            {
                if draft.focus() == DraftField::Importance {
                    match ch {
                        'h' => draft.step_importance(-1),
                        'l' => draft.step_importance(1),
                        '0'..='4' => draft.set_importance(ch as u8 - b'0'),
                        _ => {}
                    }
                } else {
                    draft.insert_char(ch);
                }
            }
            _ => {}
        }
    }

    fn handle_save(&mut self) {
        let Some(draft) = self.state.draft() else {
            return;
        };
        if draft.title().trim().is_empty() {
            self.state.set_status_message(Some("Title cannot be empty"));
            return;
        }
        let mut note = draft.to_note();

        let dispatcher = actions::ActionDispatcher::new(&self.storage);
        match dispatcher.save_note(&mut note) {
            Ok(()) => {
                self.state.close_editor();
                if let Err(err) = self.state.refresh(&self.storage) {
                    tracing::error!(?err, "failed to refresh after save");
                    self.state
                        .set_status_message(Some("Saved, refresh failed"));
                } else {
                    self.state.select_note_by_id(note.id);
                    self.state.set_status_message(Some("Note saved"));
                }
            }
            Err(err) => {
                tracing::error!(?err, title = %note.title, "failed to save note");
                self.state
                    .set_status_message(Some("Failed to save note (is the title unique?)"));
            }
        }
    }

    fn handle_delete(&mut self) {
        let Some(draft) = self.state.draft() else {
            return;
        };
        if draft.is_insert() {
            // Nothing persisted yet; the draft is simply abandoned.
            self.state.close_editor();
            self.state.set_status_message(Some("Draft discarded"));
            return;
        }

        // Deletes the row the draft was opened from, so a just-edited
        // title cannot make the delete miss.
        let note_id = draft.note_id();
        let dispatcher = actions::ActionDispatcher::new(&self.storage);
        match dispatcher.delete_note(note_id) {
            Ok(_) => {
                self.state.close_editor();
                if let Err(err) = self.state.refresh(&self.storage) {
                    tracing::error!(?err, "failed to refresh after delete");
                    self.state
                        .set_status_message(Some("Deleted, refresh failed"));
                } else {
                    self.state.set_status_message(Some("Note deleted"));
                }
            }
            Err(err) => {
                tracing::error!(?err, note_id, "failed to delete note");
                self.state.set_status_message(Some("Failed to delete note"));
            }
        }
    }

    fn handle_back(&mut self) {
        self.state.close_editor();
        self.state.set_status_message(None::<String>);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}
