//! Domain entities - Core business objects with no external dependencies

pub mod bot;
pub mod callable;

pub use bot::BotInfo;
pub use callable::{Callable, Callables, Tag};
