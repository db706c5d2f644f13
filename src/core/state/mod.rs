pub mod config;
pub mod settings_store;

pub use config::{ReconcileStrategy, UpdaterConfig};
pub use settings_store::{keys, SettingsStore};
