pub mod error;
pub mod mock;
pub mod sanitize;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::*;
pub use sanitize::sanitize;
pub use stats::StatValue;
pub use traits::*;
pub use types::*;
