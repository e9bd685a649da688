use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub output_dir: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let user_data_dir = discover_user_data_dir(&project_root);
        Self::rooted(project_root, user_data_dir)
    }

    /// Lays out every path under a single directory (used by tests and one-shot runs).
    pub fn under(dir: &Path) -> Self {
        Self::rooted(dir.to_path_buf(), dir.to_path_buf())
    }

    fn rooted(project_root: PathBuf, user_data_dir: PathBuf) -> Self {
        let log_dir = user_data_dir.join("logs");
        let output_dir = user_data_dir.join("outputs");
        let secrets_path = user_data_dir.join("secrets.yaml");

        for dir in [&user_data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            project_root,
            user_data_dir,
            log_dir,
            output_dir,
            secrets_path,
        }
    }

    /// Resolves a configured path: absolute paths win, relative ones land in the data dir.
    pub fn resolve(&self, configured: &Path) -> PathBuf {
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.user_data_dir.join(configured)
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("EDVEST_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("config.yml").exists() {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}

fn discover_user_data_dir(project_root: &Path) -> PathBuf {
    if let Ok(dir) = env::var("EDVEST_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return project_root.to_path_buf();
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("Edvest");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("Edvest");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("edvest")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_creates_data_and_log_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::under(dir.path());

        assert!(paths.user_data_dir.exists());
        assert!(paths.log_dir.exists());
        assert_eq!(paths.output_dir, dir.path().join("outputs"));
        assert_eq!(paths.secrets_path, dir.path().join("secrets.yaml"));
    }

    #[test]
    fn resolve_keeps_absolute_and_roots_relative() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::under(dir.path());

        assert_eq!(paths.resolve(Path::new("data")), dir.path().join("data"));
        let absolute = dir.path().join("elsewhere");
        assert_eq!(paths.resolve(&absolute), absolute);
    }
}
