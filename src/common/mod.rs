pub mod config;
pub mod dev_mode;
pub mod error;
pub mod paths;

pub use config::Config;
pub use dev_mode::DevMode;
pub use error::{PipelineError, Result};
pub use paths::{config_candidates, models_dir, system_config_file, system_models_dir};
