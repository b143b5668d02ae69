//! HTTP backend: the sheet store behind the `/api/submit` contract.

pub mod app;
pub mod config;
pub mod middleware;
pub mod sheet;

pub use app::{build_app, build_app_with};
pub use config::ApiConfig;
pub use sheet::SheetStore;
