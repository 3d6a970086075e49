use std::path::PathBuf;
use std::fs;
use crate::common::error::Result;

#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base_dir(enabled, PathBuf::from("./dev_data"))
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        if enabled {
            fs::create_dir_all(base_dir.join("captures"))?;
            fs::create_dir_all(base_dir.join("debug"))?;

            tracing::info!("Development mode enabled - snapshots go to {}", base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get_capture_path(&self, prefix: &str) -> PathBuf {
        if self.enabled {
            self.base_dir.join("captures").join(timestamped(prefix))
        } else {
            PathBuf::from(format!("{}.jpg", prefix))
        }
    }

    pub fn get_debug_path(&self, prefix: &str) -> PathBuf {
        if self.enabled {
            self.base_dir.join("debug").join(timestamped(prefix))
        } else {
            PathBuf::from(format!("{}_debug.jpg", prefix))
        }
    }
}

fn timestamped(prefix: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
    format!("{}_{}.jpg", prefix, timestamp)
}
