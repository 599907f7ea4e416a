use directories::ProjectDirs;
use std::path::PathBuf;

/// Where the progress database lives. Prefers `~/.local/state/taktik` so the
/// database sits next to other mutable state; falls back to the platform's
/// local data dir when HOME is unset.
pub fn progress_db_path() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("HOME") {
        return Some(
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("taktik")
                .join("progress.db"),
        );
    }
    ProjectDirs::from("", "", "taktik").map(|dirs| dirs.data_local_dir().join("progress.db"))
}
