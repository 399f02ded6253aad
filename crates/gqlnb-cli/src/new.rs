//! New command: create an empty notebook.

use crate::colors;

/// Create a new notebook with one empty GraphQL cell.
pub fn execute(name: &str) -> anyhow::Result<()> {
    let path = gqlnb_sync::notebook_path(name);
    if path.exists() {
        anyhow::bail!("File {} already exists", path.display());
    }

    let document = gqlnb_sync::create_notebook(&path)?;
    println!(
        "{}Created new notebook:{} {}",
        colors::GREEN,
        colors::RESET,
        document.path.display()
    );
    Ok(())
}
