use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod memory_repo;
pub mod pg_repo;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod validation;

pub use memory_repo::MemoryUserStore;
pub use pg_repo::PgUserStore;
pub use services::AccountService;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes())
        .merge(handlers::protected_routes())
}
