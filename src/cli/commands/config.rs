use crate::config::{ConfigFile, ConfigLoader};
use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

#[derive(Args)]
pub struct ConfigArgs {
    /// Output format: toml, json
    #[arg(short, long, default_value = "toml")]
    pub format: String,
}

/// Print the merged, validated configuration with `parallelism` resolved
pub async fn execute(args: ConfigArgs, custom_config: Option<&str>) -> Result<()> {
    let loader = ConfigLoader::load_with_custom_config(custom_config.map(Path::new));
    let config = loader.batch_config().context("Failed to load configuration")?;
    let effective = ConfigFile::from(&config);

    let rendered = match args.format.to_lowercase().as_str() {
        "toml" => toml::to_string_pretty(&effective)?,
        "json" => serde_json::to_string_pretty(&effective)?,
        other => anyhow::bail!("Unsupported format: {}. Use toml or json", other),
    };

    println!("{}", rendered.trim_end());
    Ok(())
}
