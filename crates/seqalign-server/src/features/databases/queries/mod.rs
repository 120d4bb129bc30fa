pub mod list;

pub use list::{DatabaseInfo, ListDatabasesError};
