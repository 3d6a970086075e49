use directories::ProjectDirs;
use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "posturesup.toml";

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/posturesup").join(CONFIG_FILE_NAME)
}

pub fn system_models_dir() -> PathBuf {
    PathBuf::from("/usr/share/posturesup/models")
}

pub fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("com", "posturesup", "PostureSup")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Config files in lookup order: working copy, per-user, system-wide.
pub fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("configs").join(CONFIG_FILE_NAME)];
    if let Some(user) = user_config_file() {
        candidates.push(user);
    }
    candidates.push(system_config_file());
    candidates
}

/// Local `./models` wins over the system directory when it exists.
pub fn models_dir() -> PathBuf {
    let local = PathBuf::from("models");
    if local.is_dir() {
        local
    } else {
        system_models_dir()
    }
}
