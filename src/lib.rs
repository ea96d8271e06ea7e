pub mod backend;
pub mod cache;
pub mod calendar;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod handlers;
pub mod health;
pub mod history;
pub mod middleware;
pub mod models;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod sheet_lock;
pub mod validation;

pub use config::Config;
pub use error::{AppError, Result};
pub use handlers::{AppState, SharedState};
pub use server::{create_app, Server};
