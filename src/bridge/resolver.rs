//! Locate the companion helper binary (no system PATH lookup — the helper
//! carries the accessibility/screen-recording entitlements, so only known
//! install locations are trusted).

use anyhow::Result;
use std::path::PathBuf;

pub const HELPER_ENV: &str = "MIRA_HELPER";
pub const HELPER_NAME: &str = "mira-helper";

pub fn find_helper() -> Result<PathBuf> {
    let mut checked = Vec::new();

    // 1. Explicit override
    if let Ok(path) = std::env::var(HELPER_ENV) {
        let path = PathBuf::from(path);
        checked.push(format!("{}: {:?}", HELPER_ENV, path));
        if path.exists() {
            return Ok(path);
        }
    }

    // 2. Next to the current executable
    if let Ok(exe) = std::env::current_exe() {
        let sibling = exe.with_file_name(HELPER_NAME);
        checked.push(format!("Sibling: {:?}", sibling));
        if sibling.exists() {
            return Ok(sibling);
        }
    }

    // 3. Install directory
    if let Some(home) = dirs::home_dir() {
        let installed = home.join(".mira-tester").join(HELPER_NAME);
        checked.push(format!("Install dir: {:?}", installed));
        if installed.exists() {
            return Ok(installed);
        }
    }

    Err(anyhow::anyhow!(
        "Could not find the '{}' helper binary. Checked:\n{}\nInstall it to ~/.mira-tester/ or set {}.",
        HELPER_NAME,
        checked.join("\n"),
        HELPER_ENV
    ))
}
