pub mod simulate;
pub mod validate;

use deckhand_plan::ElementSnapshot;

/// Print a plan snapshot as indented text or pretty JSON.
pub fn print_snapshot(snapshot: &ElementSnapshot, format: &str) -> anyhow::Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(snapshot)?),
        _ => print!("{}", snapshot.render()),
    }
    Ok(())
}
