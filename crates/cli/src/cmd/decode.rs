//! Decode a position token

use anyhow::{Context, Result};
use ml_core::Position;
use owo_colors::OwoColorize;

pub fn run(token: &str) -> Result<()> {
    let position = Position::from_hex(token.trim())
        .with_context(|| format!("Not a position token: {}", token))?;

    println!("{}", "Journal Position".bold());
    println!("  {}: {}", "generation".cyan(), position.generation());
    println!("  {}: {}", "sequence".cyan(), position.sequence());
    Ok(())
}
