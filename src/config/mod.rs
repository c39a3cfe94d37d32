pub mod loader;

pub use loader::{load_config, load_config_with_env, ENV_PREFIX};
