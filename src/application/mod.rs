//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Services: Plugin discovery and loading orchestration
//! - Errors: Domain-specific errors

pub mod errors;
pub mod services;
