pub mod classify;
mod entity;
pub mod script;

pub use classify::*;
pub use entity::*;
pub use script::*;
