//! Tool abstraction, invocation pipeline, and the built-in task tools.

pub mod core;
pub mod invoke;
pub mod tasks;

pub use core::{Tool, ToolFuture, ToolRegistry};
pub use invoke::{Invocation, InvocationStatus, invoke};
