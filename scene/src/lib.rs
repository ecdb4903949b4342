pub mod error;
pub mod flags;
pub mod instance;
pub mod top_level;

pub use error::*;
pub use flags::*;
pub use instance::*;
pub use top_level::*;
