//! `init` and `config` commands

use crate::config::paths::SnapshotPaths;
use crate::config::settings::Settings;
use crate::error::{SnapshotError, SnapshotResult};

/// Write a default settings file
pub fn handle_init_command(paths: &SnapshotPaths, force: bool) -> SnapshotResult<()> {
    if paths.is_initialized() && !force {
        return Err(SnapshotError::Config(format!(
            "{} already exists (use --force to overwrite)",
            paths.settings_file().display()
        )));
    }

    println!("Initializing db-snapshot at: {}", paths.base_dir().display());
    Settings::default().save(paths)?;
    println!("Settings written to {}", paths.settings_file().display());
    println!();
    println!("Edit the storage and database sections before creating snapshots.");
    println!("Values starting with '$' are read from the environment, e.g.");
    println!("  \"secret_key\": \"$DB_SNAPSHOT_SECRET_KEY\"");
    Ok(())
}

/// Show resolved paths and the effective settings
pub fn handle_config_command(paths: &SnapshotPaths) -> SnapshotResult<()> {
    println!("db-snapshot Configuration");
    println!("=========================");
    println!("Base directory:  {}", paths.base_dir().display());
    println!("Settings file:   {}", paths.settings_file().display());
    println!("Temp workspace:  {}", paths.workspace_dir().display());
    println!("Operator log:    {}", paths.log_file().display());
    println!();

    if !paths.is_initialized() {
        println!("Not initialized. Run 'db-snapshot init' to create a settings file.");
        return Ok(());
    }

    match Settings::load(paths) {
        Ok(settings) => {
            println!("Settings:");
            println!("{}", serde_json::to_string_pretty(&masked(settings))?);
        }
        Err(e) => println!("Settings are not usable yet: {}", e),
    }
    Ok(())
}

/// Copy of `settings` safe to print
fn masked(mut settings: Settings) -> Settings {
    settings.storage.access_key = mask_secret(&settings.storage.access_key);
    settings.storage.secret_key = mask_secret(&settings.storage.secret_key);
    settings
}

/// Keep the first four characters of a secret and hide the rest
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    if visible.len() == secret.len() {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}
