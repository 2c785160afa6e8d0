mod blocking;
pub mod body;
mod codesets;
mod extensions;
pub mod openapi;
pub mod response;
mod router;
mod runnables;
mod workflows;

pub use router::{AppState, create_router};
