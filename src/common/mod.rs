// Common constants and the crate-wide error type

pub mod constants;
pub mod error;

pub use error::{FetchError, Result, RevizeError};
