use std::fmt::Write as _;
use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::app::App;
use crate::storage::{Note, StorageHandle, NOT_FOUND};

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the note (prompted if omitted)
    #[arg()]
    pub title: Option<String>,
    /// Provide the note content inline. If omitted, reads from stdin.
    #[arg(long)]
    pub content: Option<String>,
    /// Importance level 0-4; values outside the range wrap into it
    #[arg(long, default_value_t = 0)]
    pub importance: i64,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Exact title of the note to delete
    pub title: String,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn new_note(storage: StorageHandle, args: NewArgs) -> Result<()> {
    let mut title = match args.title {
        Some(t) => t,
        None => prompt("Title")?,
    };
    title = title.trim().to_owned();
    if title.is_empty() {
        bail!("note title cannot be empty");
    }
    let content = if let Some(content) = args.content {
        content
    } else {
        read_stdin()?.unwrap_or_default()
    };

    let mut note = Note::new(title, content, args.importance);
    storage.upsert(&mut note).context("creating note")?;
    println!(
        "Created note #{} '{}' (importance {})",
        note.id, note.title, note.importance
    );
    Ok(())
}

pub fn list_notes(storage: StorageHandle) -> Result<()> {
    let notes = storage.list_all().context("listing notes")?;
    print!("{}", format_note_list(&notes));
    Ok(())
}

pub fn delete_note(storage: StorageHandle, args: DeleteArgs) -> Result<()> {
    let title = args.title.trim();
    if title.is_empty() {
        bail!("note title cannot be empty");
    }

    let id = storage
        .find_id_by_title(title)
        .with_context(|| format!("looking up note '{title}'"))?;
    if id == NOT_FOUND {
        println!("No note titled '{title}'; nothing to delete.");
        return Ok(());
    }

    storage
        .delete_by_id(id)
        .with_context(|| format!("deleting note #{id}"))?;
    println!("Deleted note #{id} ('{title}')");
    Ok(())
}

fn format_note_list(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "No notes yet.\n".to_string();
    }
    let mut out = String::new();
    for note in notes {
        let _ = writeln!(&mut out, "#{}  [{}] {}", note.id, note.importance, note.title);
        if let Some(line) = note.content.lines().find(|line| !line.trim().is_empty()) {
            let _ = writeln!(&mut out, "    {}", line.trim());
        }
    }
    out
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, StorageOptions};
    use crate::storage;
    use tempfile::TempDir;

    fn setup_storage() -> Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new().context("creating temp dir")?;
        let root = temp.path();
        let paths = ConfigPaths {
            config_dir: root.join("config"),
            config_file: root.join("config/config.toml"),
            data_dir: root.join("data"),
            database_path: root.join("data/notes.db"),
        };
        let mut storage_opts = StorageOptions::default();
        storage_opts.database_path = paths.database_path.clone();

        let handle = storage::init(&paths, &storage_opts)?;
        Ok((temp, handle))
    }

    #[test]
    fn cli_new_wraps_importance_into_range() -> Result<()> {
        let (_temp, storage) = setup_storage()?;
        new_note(
            storage.clone(),
            NewArgs {
                title: Some("Wrapped".into()),
                content: Some("body".into()),
                importance: 9,
            },
        )?;

        let notes = storage.list_all()?;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].importance, 4);
        Ok(())
    }

    #[test]
    fn cli_new_rejects_blank_titles() -> Result<()> {
        let (_temp, storage) = setup_storage()?;
        let result = new_note(
            storage.clone(),
            NewArgs {
                title: Some("   ".into()),
                content: Some("body".into()),
                importance: 0,
            },
        );
        assert!(result.is_err());
        assert!(storage.list_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn cli_delete_removes_the_titled_note() -> Result<()> {
        let (_temp, storage) = setup_storage()?;
        let mut note = Note::new("Doomed", "body", 1);
        storage.upsert(&mut note)?;

        delete_note(
            storage.clone(),
            DeleteArgs {
                title: "Doomed".into(),
            },
        )?;

        assert!(storage.list_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn cli_delete_of_missing_title_is_a_noop() -> Result<()> {
        let (_temp, storage) = setup_storage()?;
        let mut note = Note::new("Keeper", "body", 1);
        storage.upsert(&mut note)?;

        delete_note(
            storage.clone(),
            DeleteArgs {
                title: "Absent".into(),
            },
        )?;

        assert_eq!(storage.list_all()?.len(), 1);
        Ok(())
    }

    #[test]
    fn note_list_shows_id_importance_and_first_content_line() -> Result<()> {
        let (_temp, storage) = setup_storage()?;
        let mut urgent = Note::new("Urgent", "\ncall back today\nmore", 4);
        storage.upsert(&mut urgent)?;
        let mut minor = Note::new("Minor", "", 0);
        storage.upsert(&mut minor)?;

        let output = format_note_list(&storage.list_all()?);
        let urgent_pos = output.find("Urgent").expect("urgent listed");
        let minor_pos = output.find("Minor").expect("minor listed");
        assert!(urgent_pos < minor_pos, "higher importance prints first");
        assert!(output.contains("[4] Urgent"));
        assert!(output.contains("call back today"));
        Ok(())
    }

    #[test]
    fn empty_store_prints_a_hint() {
        assert_eq!(format_note_list(&[]), "No notes yet.\n");
    }
}
