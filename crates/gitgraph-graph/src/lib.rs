pub mod generator;
pub mod queries;
pub mod snapshot;
pub mod store;
pub mod validation;

pub use generator::*;
pub use queries::*;
pub use snapshot::*;
pub use store::*;
pub use validation::*;
