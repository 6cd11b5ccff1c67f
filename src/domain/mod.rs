//! Domain layer - Core business logic with no external dependencies
//!
//! This layer contains:
//! - Entities: Callable tags and the bot identity shared with plugins

pub mod entities;
