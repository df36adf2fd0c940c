pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod schema;
pub mod state;
pub mod storage;
pub mod table;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use ledger::{compute_new_row, update_global_state};
pub use schema::{migrate, reconcile_schema};
pub use state::AppState;
pub use storage::DataDir;
