pub mod submit;

pub use submit::{SubmitAlignmentCommand, SubmitAlignmentError};
