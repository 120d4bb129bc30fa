pub mod delete;
pub mod index;
pub mod update;
pub mod upload;

pub use delete::{DeleteDatabaseCommand, DeleteDatabaseError, DeleteDatabaseResponse};
pub use index::{IndexDatabaseCommand, IndexDatabaseError};
pub use update::{UpdateDatabaseCommand, UpdateDatabaseError, UpdateDatabaseResponse};
pub use upload::{UploadFileCommand, UploadFileError, UploadTarget};
