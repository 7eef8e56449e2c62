pub mod admin;
pub mod error;
pub mod handlers;
pub mod manhwa;
pub mod routes;

pub use routes::create_router;
