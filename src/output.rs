/// Output formatting for CLI results
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Render a value in the requested format
pub fn render<T: Serialize + ?Sized>(data: &T, format: OutputFormat) -> anyhow::Result<String> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
    };
    Ok(text.trim_end().to_string())
}

/// Print a value to stdout in the requested format
pub fn print<T: Serialize + ?Sized>(data: &T, format: OutputFormat) -> anyhow::Result<()> {
    println!("{}", render(data, format)?);
    Ok(())
}
