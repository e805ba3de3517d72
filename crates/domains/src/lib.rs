//! domains
//!
//! The central domain model and port definitions of the sözlük data layer.

pub mod clock;
pub mod error;
pub mod models;
pub mod text;
pub mod traits;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use error::*;
pub use models::*;
pub use traits::*;
