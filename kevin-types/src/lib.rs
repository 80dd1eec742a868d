pub mod enums;
pub mod identity;
pub mod models;
pub mod validation;

pub use enums::*;
pub use identity::*;
pub use models::*;
pub use validation::*;
