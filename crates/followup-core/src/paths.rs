use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const STATE_DIR: &str = ".followup";
pub const CONFIG_FILE: &str = "followup.yaml";

pub const AGING_FILE: &str = ".followup/aging.json";
pub const CADENCE_FILE: &str = ".followup/cadence.json";
pub const LEDGER_FILE: &str = ".followup/ledger.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

pub fn aging_path(root: &Path) -> PathBuf {
    root.join(AGING_FILE)
}

pub fn cadence_path(root: &Path) -> PathBuf {
    root.join(CADENCE_FILE)
}

pub fn ledger_path(root: &Path) -> PathBuf {
    root.join(LEDGER_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_files_live_in_state_dir() {
        let root = Path::new("/srv/followup");
        for path in [aging_path(root), cadence_path(root), ledger_path(root)] {
            assert_eq!(path.parent().unwrap(), state_dir(root));
        }
    }
}
