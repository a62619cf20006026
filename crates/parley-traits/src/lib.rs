//! Parley Traits - Shared tool abstractions.
//!
//! This crate provides the interfaces the turn executor consumes for tools:
//! - Tool trait, ToolSchema, ToolOutput
//! - ToolError and the crate-local Result alias
//! - ToolRegistry, constructed explicitly and handed to the executor
//! - FnTool adapters that lift plain closures onto the async Tool contract

pub mod error;
pub mod function;
pub mod registry;
pub mod tool;

pub use error::{Result as ToolResult, ToolError};
pub use function::FnTool;
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolOutput, ToolSchema};
