pub mod config;
pub mod entity;
pub mod error;
pub mod types;

pub use config::*;
pub use entity::*;
pub use error::*;
pub use types::*;
