//! Replay a driver trace and print the resulting changes

use anyhow::{Context, Result};
use cli_lib::{parse_trace, replay, Config, ReplayOptions};
use ml_core::{ChangeRecord, LargeChange, Position, SmallChange};
use owo_colors::OwoColorize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub fn run(
    trace: &Path,
    config_path: Option<&Path>,
    since_mark: Option<String>,
    since_token: Option<String>,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let file = File::open(trace).with_context(|| format!("Failed to open trace {}", trace.display()))?;
    let lines = parse_trace(BufReader::new(file))?;

    let since = since_token
        .map(|token| Position::from_hex(token.trim()).context("Invalid --since token"))
        .transpose()?;
    let options = ReplayOptions { since_mark, since };
    let outcome = replay(&lines, &config, &options)?;

    for (name, position) in &outcome.marks {
        println!("{} {} {}", "mark".dimmed(), name.bold(), position.to_hex().dimmed());
    }
    if !outcome.marks.is_empty() {
        println!();
    }

    println!(
        "{} {} ({})",
        "Changes since".bold(),
        outcome.from,
        outcome.from.to_hex().dimmed()
    );
    if outcome.result.changes.is_empty() {
        println!("  {}", "(no changes)".dimmed());
    }
    for change in &outcome.result.changes {
        println!("  {}", colorize(change));
    }

    println!(
        "\n{} {} ({})",
        "Now at".bold(),
        outcome.result.to_position,
        outcome.result.to_position.to_hex().dimmed()
    );
    Ok(())
}

fn colorize(change: &ChangeRecord) -> String {
    let text = change.to_string();
    match change {
        ChangeRecord::Small(SmallChange::Added { .. }) => text.green().to_string(),
        ChangeRecord::Small(SmallChange::Removed { .. }) => text.red().to_string(),
        ChangeRecord::Small(SmallChange::Modified { .. }) => text.yellow().to_string(),
        ChangeRecord::Small(SmallChange::Renamed { .. } | SmallChange::Replaced { .. }) => {
            text.cyan().to_string()
        }
        ChangeRecord::Large(LargeChange::LostChanges { .. }) => text.red().bold().to_string(),
        ChangeRecord::Large(_) => text.magenta().to_string(),
    }
}
