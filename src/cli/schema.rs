use crate::cli::SchemaArgs;
use crate::config::Config;
use schemars::schema_for;
use std::fs;
use tracing::info;

/// Emit the config JSON Schema to stdout, or to a file for editor tooling
pub fn execute(args: SchemaArgs) -> anyhow::Result<()> {
    let schema = schema_for!(Config);
    let rendered = serde_json::to_string_pretty(&schema)?;

    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, format!("{}\n", rendered))?;
            info!("Wrote config schema to {:?}", path);
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
