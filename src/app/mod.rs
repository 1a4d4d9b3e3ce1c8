pub mod error;
pub mod uncaught;

pub use error::{Result, ScopeError};
pub use uncaught::{clear_uncaught_hook, set_uncaught_hook, ErrorSink};
