//! Runtime bridge between UI command queue and backend event intake.

use std::sync::Arc;

use client_core::TodoClient;
use crossbeam_channel::{Receiver, Sender};

use crate::backend_bridge::{commands::BackendCommand, worker};
use crate::controller::events::UiEvent;

pub fn launch(client: Arc<TodoClient>, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    worker::spawn_backend_thread(client, cmd_rx, ui_tx);
}
