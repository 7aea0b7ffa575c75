use anyhow::Result;
use unicode_segmentation::UnicodeSegmentation;

use crate::storage::{Note, StorageHandle, IMPORTANCE_LEVELS};

/// Which of the two mutually exclusive screens is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    List,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Content,
    Importance,
}

impl DraftField {
    pub fn next(self) -> Self {
        match self {
            DraftField::Title => DraftField::Content,
            DraftField::Content => DraftField::Importance,
            DraftField::Importance => DraftField::Title,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            DraftField::Title => DraftField::Importance,
            DraftField::Content => DraftField::Title,
            DraftField::Importance => DraftField::Content,
        }
    }
}

/// Working copy of the note under edit. The list entry it was copied from
/// is never touched; save writes the draft back through the gateway and
/// discard simply drops it.
#[derive(Debug, Clone)]
pub struct NoteDraft {
    note: Note,
    focus: DraftField,
    cursor: usize,
}

impl NoteDraft {
    pub fn blank() -> Self {
        Self {
            note: Note::new("", "", 0),
            focus: DraftField::Title,
            cursor: 0,
        }
    }

    pub fn from_note(note: &Note) -> Self {
        Self {
            note: note.clone(),
            focus: DraftField::Title,
            cursor: note.title.len(),
        }
    }

    /// True while the draft has no backing row yet.
    pub fn is_insert(&self) -> bool {
        !self.note.is_persisted()
    }

    pub fn note_id(&self) -> i64 {
        self.note.id
    }

    pub fn title(&self) -> &str {
        &self.note.title
    }

    pub fn content(&self) -> &str {
        &self.note.content
    }

    pub fn importance(&self) -> u8 {
        self.note.importance
    }

    pub fn to_note(&self) -> Note {
        self.note.clone()
    }

    pub fn focus(&self) -> DraftField {
        self.focus
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn focus_next(&mut self) {
        self.set_focus(self.focus.next());
    }

    pub fn focus_previous(&mut self) {
        self.set_focus(self.focus.previous());
    }

    fn set_focus(&mut self, field: DraftField) {
        self.focus = field;
        self.cursor = match field {
            DraftField::Title => self.note.title.len(),
            DraftField::Content => self.note.content.len(),
            DraftField::Importance => 0,
        };
    }

    /// Moves the importance slider one step, stopping at the ends.
    pub fn step_importance(&mut self, delta: i8) {
        let level = i16::from(self.note.importance) + i16::from(delta);
        self.note.importance = level.clamp(0, i16::from(IMPORTANCE_LEVELS) - 1) as u8;
    }

    pub fn set_importance(&mut self, level: u8) {
        self.note.importance = level.min(IMPORTANCE_LEVELS - 1);
    }

    fn focused_text(&mut self) -> Option<&mut String> {
        match self.focus {
            DraftField::Title => Some(&mut self.note.title),
            DraftField::Content => Some(&mut self.note.content),
            DraftField::Importance => None,
        }
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        let cursor = self.cursor;
        let Some(text) = self.focused_text() else {
            return false;
        };
        let mut scratch = [0u8; 4];
        let encoded = ch.encode_utf8(&mut scratch);
        text.insert_str(cursor, encoded);
        self.cursor = cursor + encoded.len();
        true
    }

    pub fn insert_newline(&mut self) -> bool {
        if self.focus != DraftField::Content {
            return false;
        }
        self.note.content.insert(self.cursor, '\n');
        self.cursor += 1;
        true
    }

    pub fn backspace(&mut self) -> bool {
        let cursor = self.cursor;
        if cursor == 0 {
            return false;
        }
        let Some(text) = self.focused_text() else {
            return false;
        };
        let prev = prev_grapheme_boundary(text, cursor);
        text.drain(prev..cursor);
        self.cursor = prev;
        true
    }

    pub fn delete(&mut self) -> bool {
        let cursor = self.cursor;
        let Some(text) = self.focused_text() else {
            return false;
        };
        if cursor >= text.len() {
            return false;
        }
        let next = next_grapheme_boundary(text, cursor);
        if next == cursor {
            return false;
        }
        text.drain(cursor..next);
        true
    }

    pub fn move_left(&mut self) -> bool {
        let cursor = self.cursor;
        if cursor == 0 {
            return false;
        }
        let Some(text) = self.focused_text() else {
            return false;
        };
        let prev = prev_grapheme_boundary(text, cursor);
        self.cursor = prev;
        true
    }

    pub fn move_right(&mut self) -> bool {
        let cursor = self.cursor;
        let Some(text) = self.focused_text() else {
            return false;
        };
        if cursor >= text.len() {
            return false;
        }
        let next = next_grapheme_boundary(text, cursor);
        if next == cursor {
            return false;
        }
        self.cursor = next;
        true
    }

    pub fn move_home(&mut self) -> bool {
        let cursor = self.cursor;
        let Some(text) = self.focused_text() else {
            return false;
        };
        let start = line_start(text, cursor);
        if cursor == start {
            return false;
        }
        self.cursor = start;
        true
    }

    pub fn move_end(&mut self) -> bool {
        let cursor = self.cursor;
        let Some(text) = self.focused_text() else {
            return false;
        };
        let end = line_end(text, cursor);
        if cursor == end {
            return false;
        }
        self.cursor = end;
        true
    }

    pub fn move_up(&mut self) -> bool {
        if self.focus != DraftField::Content {
            return false;
        }
        let text = &self.note.content;
        let current_start = line_start(text, self.cursor);
        if current_start == 0 {
            if self.cursor == 0 {
                return false;
            }
            self.cursor = 0;
            return true;
        }
        let column = column_at(text, current_start, self.cursor);
        let prev_start = line_start(text, current_start - 1);
        self.cursor = position_for_column(text, prev_start, column);
        true
    }

    pub fn move_down(&mut self) -> bool {
        if self.focus != DraftField::Content {
            return false;
        }
        let text = &self.note.content;
        let current_end = line_end(text, self.cursor);
        if current_end == text.len() {
            if self.cursor == text.len() {
                return false;
            }
            self.cursor = text.len();
            return true;
        }
        let current_start = line_start(text, self.cursor);
        let column = column_at(text, current_start, self.cursor);
        self.cursor = position_for_column(text, current_end + 1, column);
        true
    }
}

/// Central state container. The render path only reads it; mutation
/// happens through these methods, driven by dispatched key actions.
#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub selected: usize,
    pub preview_lines: usize,
    pub notes: Vec<Note>,
    pub status_message: Option<String>,
    draft: Option<NoteDraft>,
}

impl AppState {
    pub fn load(storage: &StorageHandle, preview_lines: usize) -> Result<Self> {
        let notes = storage.list_all()?;
        Ok(Self {
            screen: Screen::List,
            selected: 0,
            preview_lines,
            notes,
            status_message: None,
            draft: None,
        })
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.notes.get(self.selected)
    }

    /// Re-fetches the whole list from the gateway. Called at startup and
    /// after a write completes, never per render.
    pub fn refresh(&mut self, storage: &StorageHandle) -> Result<()> {
        self.notes = storage.list_all()?;
        self.normalize_selection();
        Ok(())
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.notes.is_empty() {
            return;
        }
        let len = self.notes.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1);
        self.selected = next as usize;
    }

    pub fn select_note_by_id(&mut self, note_id: i64) {
        if let Some(idx) = self.notes.iter().position(|note| note.id == note_id) {
            self.selected = idx;
        } else {
            self.normalize_selection();
        }
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    pub fn draft(&self) -> Option<&NoteDraft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut NoteDraft> {
        self.draft.as_mut()
    }

    /// LIST -> EDIT with a blank draft (insert mode).
    pub fn open_insert_editor(&mut self) {
        self.draft = Some(NoteDraft::blank());
        self.screen = Screen::Edit;
    }

    /// LIST -> EDIT with a draft copied from the selected note. Returns
    /// false when nothing is selected.
    pub fn open_edit_selected(&mut self) -> bool {
        let Some(note) = self.selected_note() else {
            return false;
        };
        self.draft = Some(NoteDraft::from_note(note));
        self.screen = Screen::Edit;
        true
    }

    /// EDIT -> LIST, dropping the draft.
    pub fn close_editor(&mut self) {
        self.draft = None;
        self.screen = Screen::List;
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    fn normalize_selection(&mut self) {
        if self.notes.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.notes.len() {
            self.selected = self.notes.len() - 1;
        }
    }
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut last = 0;
    for (idx, _) in text[..cursor].grapheme_indices(true) {
        last = idx;
    }
    last
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor >= text.len() {
        return text.len();
    }
    let mut iter = text[cursor..].graphemes(true);
    if let Some(grapheme) = iter.next() {
        cursor + grapheme.len()
    } else {
        text.len()
    }
}

fn line_start(text: &str, cursor: usize) -> usize {
    text[..cursor].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

fn line_end(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .find('\n')
        .map(|idx| cursor + idx)
        .unwrap_or_else(|| text.len())
}

fn column_at(text: &str, line_start: usize, cursor: usize) -> usize {
    text[line_start..cursor].graphemes(true).count()
}

fn position_for_column(text: &str, line_start: usize, column: usize) -> usize {
    let line_end = line_end(text, line_start);
    let mut position = line_start;
    let mut count = 0;
    for grapheme in text[line_start..line_end].graphemes(true) {
        if count >= column {
            break;
        }
        position += grapheme.len();
        count += 1;
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NOT_FOUND;

    fn persisted_note(id: i64, title: &str, importance: i64) -> Note {
        let mut note = Note::new(title, "body", importance);
        note.id = id;
        note
    }

    fn state_with_notes(notes: Vec<Note>) -> AppState {
        AppState {
            screen: Screen::List,
            selected: 0,
            preview_lines: 2,
            notes,
            status_message: None,
            draft: None,
        }
    }

    #[test]
    fn add_opens_an_insert_draft_and_close_returns_to_list() {
        let mut state = state_with_notes(vec![]);
        state.open_insert_editor();
        assert_eq!(state.screen, Screen::Edit);
        let draft = state.draft().expect("draft");
        assert!(draft.is_insert());
        assert_eq!(draft.note_id(), NOT_FOUND);

        state.close_editor();
        assert_eq!(state.screen, Screen::List);
        assert!(state.draft().is_none());
    }

    #[test]
    fn editing_copies_the_note_instead_of_aliasing_it() {
        let mut state = state_with_notes(vec![persisted_note(7, "Original", 2)]);
        assert!(state.open_edit_selected());

        let draft = state.draft_mut().expect("draft");
        draft.insert_char('!');
        assert_eq!(draft.title(), "Original!");

        // The list entry stays untouched until a save reloads it.
        assert_eq!(state.notes[0].title, "Original");
    }

    #[test]
    fn open_edit_without_selection_is_rejected() {
        let mut state = state_with_notes(vec![]);
        assert!(!state.open_edit_selected());
        assert_eq!(state.screen, Screen::List);
    }

    #[test]
    fn slider_stops_at_both_ends() {
        let mut draft = NoteDraft::blank();
        draft.step_importance(-1);
        assert_eq!(draft.importance(), 0);
        for _ in 0..10 {
            draft.step_importance(1);
        }
        assert_eq!(draft.importance(), 4);
    }

    #[test]
    fn focus_cycles_through_all_three_fields() {
        let mut draft = NoteDraft::blank();
        assert_eq!(draft.focus(), DraftField::Title);
        draft.focus_next();
        assert_eq!(draft.focus(), DraftField::Content);
        draft.focus_next();
        assert_eq!(draft.focus(), DraftField::Importance);
        draft.focus_next();
        assert_eq!(draft.focus(), DraftField::Title);
        draft.focus_previous();
        assert_eq!(draft.focus(), DraftField::Importance);
    }

    #[test]
    fn backspace_removes_whole_graphemes() {
        let mut draft = NoteDraft::from_note(&persisted_note(1, "cafe\u{301}", 0));
        assert!(draft.backspace());
        assert_eq!(draft.title(), "caf");
    }

    #[test]
    fn newline_only_applies_to_content() {
        let mut draft = NoteDraft::blank();
        assert!(!draft.insert_newline());
        draft.focus_next();
        assert!(draft.insert_newline());
        assert_eq!(draft.content(), "\n");
    }

    #[test]
    fn content_cursor_moves_between_lines() {
        let mut draft = NoteDraft::blank();
        draft.focus_next();
        for ch in "ab".chars() {
            draft.insert_char(ch);
        }
        draft.insert_newline();
        for ch in "cdef".chars() {
            draft.insert_char(ch);
        }

        assert!(draft.move_up());
        assert_eq!(draft.cursor(), 2); // end of "ab"
        assert!(draft.move_down());
        assert_eq!(draft.cursor(), 5); // column 2 of "cdef"
    }

    #[test]
    fn typing_in_the_importance_field_is_ignored() {
        let mut draft = NoteDraft::blank();
        draft.focus_next();
        draft.focus_next();
        assert_eq!(draft.focus(), DraftField::Importance);
        assert!(!draft.insert_char('x'));
        assert!(!draft.backspace());
    }

    #[test]
    fn selection_clamps_to_list_bounds() {
        let mut state = state_with_notes(vec![
            persisted_note(1, "a", 0),
            persisted_note(2, "b", 1),
        ]);
        state.move_selection(-3);
        assert_eq!(state.selected, 0);
        state.move_selection(10);
        assert_eq!(state.selected, 1);
    }
}
