use anyhow::Result;

fn main() -> Result<()> {
    havetodo_tui::cli::run()
}
