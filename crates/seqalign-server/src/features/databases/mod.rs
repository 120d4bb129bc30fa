pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::databases_routes;
