use anyhow::Context;
use followup_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing follow-up in: {}", root.display());

    let state_dir = paths::state_dir(root);
    io::ensure_dir(&state_dir)
        .with_context(|| format!("failed to create {}", state_dir.display()))?;

    let yaml = serde_yaml::to_string(&Config::default())?;
    let written = io::write_if_missing(&paths::config_path(root), yaml.as_bytes())
        .with_context(|| format!("failed to write {}", paths::CONFIG_FILE))?;
    let verb = if written { "created:" } else { "exists: " };
    println!("  {verb} {}", paths::CONFIG_FILE);

    println!("\nSet RETAILCRM_BASE_URL, RETAILCRM_API_KEY and OPENAI_API_KEY, then run 'followup run'.");
    Ok(())
}
