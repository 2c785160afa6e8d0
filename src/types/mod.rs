mod codeset;
mod extension;
mod runnable;
pub mod timestamp;
pub mod validation;
pub mod version;
mod workflow;

pub use codeset::*;
pub use extension::*;
pub use runnable::*;
pub use version::{Version, VersionConstraint, parse_version};
pub use workflow::*;
