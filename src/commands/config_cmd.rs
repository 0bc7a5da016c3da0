use clap::{Args, Subcommand};
use std::fmt::Write;

use super::OutputFormat;
use coursedeck::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        let mut value = serde_json::to_value(config)?;
                        if let Some(key) = config.api.masked_api_key() {
                            value["api"]["api_key"] = serde_json::Value::String(key);
                        }
                        println!("{}", serde_json::to_string_pretty(&value)?);
                    }
                    OutputFormat::Text => print!("{}", render_text(config)?),
                }
                Ok(())
            }
        }
    }
}

fn render_text(config: &Config) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Configuration")?;
    writeln!(out, "=============\n")?;

    match &config.config_file {
        Some(path) => {
            writeln!(out, "Config file: {}", path.display())?;
        }
        None => {
            writeln!(
                out,
                "Config file: {} (not found)",
                Config::default_config_path().display()
            )?;
        }
    }
    writeln!(out)?;

    let sources = &config.api_sources;
    let rows = [
        (
            "database_path",
            config.database_path.value.display().to_string(),
            &config.database_path.source,
        ),
        (
            "api.base_url",
            config
                .api
                .base_url
                .clone()
                .unwrap_or_else(|| "(not set)".to_string()),
            &sources.base_url,
        ),
        (
            "api.api_key",
            config
                .api
                .masked_api_key()
                .unwrap_or_else(|| "(not set)".to_string()),
            &sources.api_key,
        ),
        (
            "api.timeout_secs",
            config.api.timeout_secs.to_string(),
            &sources.timeout_secs,
        ),
    ];
    for (name, value, source) in rows {
        writeln!(out, "{}: {}", name, value)?;
        writeln!(out, "  source: {}", source)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn test_text_shows_api_sources_and_masks_key() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "api:").unwrap();
        writeln!(file, "  base_url: https://api.example.com/v1").unwrap();
        writeln!(file, "  api_key: secret-key-1234").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        let text = render_text(&config).unwrap();

        assert!(text.contains("api.base_url: https://api.example.com/v1\n  source: file\n"));
        assert!(text.contains("api.api_key: ****1234\n  source: file\n"));
        assert!(text.contains("api.timeout_secs: 30\n  source: default\n"));
        assert!(!text.contains("secret-key"));
    }

    #[test]
    fn test_json_includes_api_sources() {
        let temp_dir = tempdir().unwrap();
        let config = Config::load(Some(temp_dir.path().join("missing.yaml"))).unwrap();

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["api_sources"]["base_url"], "default");
        assert_eq!(value["api_sources"]["timeout_secs"], "default");
    }
}
