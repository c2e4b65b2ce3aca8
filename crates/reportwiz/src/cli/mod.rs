//! CLI module for reportwiz

pub mod error;
pub mod output;
pub mod replay;
pub mod tape;
pub mod validate;
