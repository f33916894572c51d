//! Backend bridge: command queue, worker thread and its tokio runtime.

pub mod commands;
pub mod runtime;
mod worker;
