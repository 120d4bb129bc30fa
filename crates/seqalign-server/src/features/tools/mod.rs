pub mod routes;

pub use routes::{tools_routes, ToolInfo};
