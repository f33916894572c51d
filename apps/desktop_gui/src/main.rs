use std::path::PathBuf;

mod backend_bridge;
mod controller;
mod ui;

use anyhow::anyhow;
use clap::Parser;
use client_core::{load_settings, resolve_settings_path, ClientError, TodoClient};
use crossbeam_channel::bounded;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use crate::backend_bridge::{commands::BackendCommand, runtime};
use crate::controller::events::UiEvent;
use crate::ui::{ConfigErrorApp, DesktopGuiApp, PersistedDesktopSettings, SETTINGS_STORAGE_KEY};

const APP_NAME: &str = "To-do";

#[derive(Parser, Debug)]
#[command(name = "todo_desktop", about = "Personal to-do list")]
struct Args {
    /// Backend settings file produced by the deployment.
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config_dir = dirs::config_dir();
    let settings_path = resolve_settings_path(args.settings.as_deref(), config_dir.as_deref());

    let client = load_settings(&settings_path)
        .map_err(ClientError::from)
        .and_then(|settings| TodoClient::from_settings(&settings));
    let client = match client {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(path = %settings_path.display(), "backend configuration unusable: {err}");
            return run_config_error(&err);
        }
    };

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    runtime::launch(client, cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_inner_size([880.0, 760.0])
            .with_min_inner_size([520.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        APP_NAME,
        options,
        Box::new(|cc| {
            let persisted_settings = cc.storage.and_then(|storage| {
                storage
                    .get_string(SETTINGS_STORAGE_KEY)
                    .and_then(|text| serde_json::from_str::<PersistedDesktopSettings>(&text).ok())
            });
            Ok(Box::new(DesktopGuiApp::new(
                cmd_tx,
                ui_rx,
                persisted_settings,
            )))
        }),
    )
    .map_err(|err| anyhow!("desktop window failed: {err}"))
}

fn run_config_error(err: &ClientError) -> anyhow::Result<()> {
    let remediation = match err {
        ClientError::Config(config) => config.remediation(),
        _ => "Check the endpoints in the settings file and restart.".to_string(),
    };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_inner_size([640.0, 360.0]),
        ..Default::default()
    };
    let detail = err.to_string();
    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |_cc| Ok(Box::new(ConfigErrorApp::new(detail, remediation)))),
    )
    .map_err(|err| anyhow!("desktop window failed: {err}"))
}
