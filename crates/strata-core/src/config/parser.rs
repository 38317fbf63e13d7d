//! TOML parser with helpful error messages

use super::ConfigError;
use super::schema::StrataConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse strata.toml with detailed error messages
pub fn parse_strata_toml(path: &Path) -> Result<StrataConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_strata_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse strata.toml content from string
pub fn parse_strata_toml_str(content: &str) -> Result<StrataConfig> {
    let config: StrataConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;
    config.validate()?;
    Ok(config)
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> ConfigError {
    let message = error.message().to_string();
    let line_num = error
        .span()
        .and_then(|span| content.get(..span.start))
        .map(|before| before.matches('\n').count() + 1);

    match line_num {
        Some(line_num) => ConfigError::Parse(format!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            get_line_context(content, line_num),
            message
        )),
        None => ConfigError::Parse(format!("TOML parsing error: {}", message)),
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2).min(lines.len());
    let end = (line_num + 2).min(lines.len());

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &StrataConfig) -> Result<String> {
    toml::to_string_pretty(config).with_context(|| "Failed to serialize configuration to TOML")
}
