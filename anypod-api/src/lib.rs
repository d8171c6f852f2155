pub mod admin;
pub mod error;
pub mod public;
pub mod router;
pub mod state;

pub use error::{AppError, AppResult};
pub use router::{admin_router, public_router};
pub use state::AppState;
