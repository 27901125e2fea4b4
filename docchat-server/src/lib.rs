//! `docchat-server` exposes document upload and question answering over HTTP.
//! The pipelines themselves live in `docchat-rag`.

pub mod config;
pub mod protocol;
pub mod server;

pub use config::ServiceConfig;
pub use server::{AppState, app_router, bind_listener, run_server};
