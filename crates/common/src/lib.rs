//! Types shared by the Threads/Zapier adapter crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
