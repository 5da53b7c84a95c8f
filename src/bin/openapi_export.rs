use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use pizza_pantry::openapi::ApiDocV1;
use utoipa::OpenApi;

/// Writes the OpenAPI document for the v1 API to disk.
#[derive(Debug, Parser)]
#[command(name = "openapi-export", version)]
struct Cli {
    /// Destination file
    #[arg(long, default_value = "openapi/pizza-pantry.v1.json")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let document = ApiDocV1::openapi()
        .to_pretty_json()
        .context("failed to render OpenAPI document")?;

    if let Some(parent) = cli.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&cli.output, document)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    println!("OpenAPI document written to {}", cli.output.display());
    Ok(())
}
