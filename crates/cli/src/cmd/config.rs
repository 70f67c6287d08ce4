//! Show the effective configuration

use anyhow::Result;
use cli_lib::Config;
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(path: Option<&Path>) -> Result<()> {
    let config = Config::load(path)?;

    println!("{}", "Mountlog Configuration".bold());
    match path {
        Some(path) => println!("{}: {}\n", "Location".dimmed(), path.display().dimmed()),
        None => println!("{}\n", "(defaults, no config file)".dimmed()),
    }
    print!("{}", config.to_toml_string()?);

    let caps = config.watcher.capabilities();
    println!(
        "\n{} rename detection: {}, replace detection: {}",
        "Backend".yellow(),
        caps.rename_detection,
        caps.replace_detection
    );
    Ok(())
}
