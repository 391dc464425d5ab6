pub mod env;
pub mod payload;
pub mod redact;

pub use env::*;
pub use payload::*;
pub use redact::*;
