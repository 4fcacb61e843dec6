//! Type definitions

pub mod import;
pub mod lead;
pub mod messages;
pub mod user;

pub use import::*;
pub use lead::*;
pub use messages::*;
pub use user::*;
