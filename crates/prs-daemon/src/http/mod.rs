pub mod error;
pub mod handlers;
pub mod paths;
pub mod routes;
pub mod server;

pub use error::{HttpError, HttpResult};
pub use routes::create_router;
