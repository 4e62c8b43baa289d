use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

#[derive(Debug, Serialize, Deserialize)]
pub struct Config
{
    /// Repair stale patch paths by basename/suffix match
    pub fuzzy_repair: bool,

    /// Apply independent file chains in parallel
    pub parallel: bool,

    /// Extra ignore patterns for the workspace snapshot
    /// (in addition to .gitignore)
    pub ignore_patterns: Vec<String>,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            fuzzy_repair: true,
            parallel: true,
            ignore_patterns: vec![
                "target/".to_string(),
                "node_modules/".to_string(),
                "dist/".to_string(),
                "build/".to_string(),
                ".git/".to_string(),
                "*.lock".to_string(),
                ".DS_Store".to_string(),
            ],
        }
    }
}

pub fn load_config() -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_paths = [
        "pastedown.toml",
        "pastedown.yaml",
        "pastedown.json",
        ".pastedown.toml",
    ];

    let mut found = false;

    for path in &config_paths
    {
        if Path::new(path).exists()
        {
            builder = builder.add_source(config::File::with_name(path));
            found = true;
            break;
        }
    }

    if !found
    {
        return Ok(Config::default());
    }

    // Add environment variables with PASTEDOWN_ prefix
    builder = builder.add_source(config::Environment::with_prefix("PASTEDOWN").separator("_"));

    let defaults = Config::default();
    let cfg = builder
        .set_default("fuzzy_repair", defaults.fuzzy_repair)?
        .set_default("parallel", defaults.parallel)?
        .set_default("ignore_patterns", defaults.ignore_patterns)?
        .build()
        .context("Failed to load configuration")?;

    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("pastedown.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml()
    {
        let config = Config::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed.fuzzy_repair, config.fuzzy_repair);
        assert_eq!(parsed.parallel, config.parallel);
        assert_eq!(parsed.ignore_patterns, config.ignore_patterns);
    }
}
