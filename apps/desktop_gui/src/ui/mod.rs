//! UI layer for the to-do window: app shell, widgets, and themes.

pub mod app;
pub mod config_error;
pub mod theme;
pub mod widgets;

pub use app::{DesktopGuiApp, PersistedDesktopSettings, SETTINGS_STORAGE_KEY};
pub use config_error::ConfigErrorApp;
