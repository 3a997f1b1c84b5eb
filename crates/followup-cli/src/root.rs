use followup_core::paths::{CONFIG_FILE, STATE_DIR};
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// `--root` / `FOLLOWUP_ROOT` wins; otherwise the nearest ancestor of the
/// working directory holding `followup.yaml` or `.followup/`; otherwise the
/// working directory itself, so `followup init` lands where it was invoked.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_project(&cwd).unwrap_or(cwd)
}

fn find_project(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(CONFIG_FILE).is_file() || dir.join(STATE_DIR).is_dir())
        .map(Path::to_path_buf)
}
