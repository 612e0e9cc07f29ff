// src/lib.rs

//! Declarative, permission-aware command dispatch.
//!
//! Commands are declared as flat [`CommandDefinition`]s naming their parent
//! by label; registration wires them into trees, and a [`Registry`] routes
//! raw command lines to the deepest matching node, extracts typed
//! parameters, and dispatches the bound handler synchronously or through
//! the platform [`Adapter`]'s async executor. The same trees back tab
//! completion.
//!
//! ```no_run
//! use cmdtree::{CommandDefinition, CommandSet, Registry};
//! # use std::sync::Arc;
//! # fn adapter() -> Arc<dyn cmdtree::Adapter> { unimplemented!() }
//!
//! # fn main() -> anyhow::Result<()> {
//! let registry = Registry::new();
//! registry.set_adapter(adapter())?;
//!
//! let set = CommandSet::new()
//!     .command(
//!         CommandDefinition::new("ban")
//!             .permission("admin.ban")
//!             .usage("<player> <reason> [duration]"),
//!         |_, _, params| {
//!             println!("banning {}", params.get(0).unwrap_or("nobody"));
//!             Ok(())
//!         },
//!     );
//! registry.register(vec![set])?.execute()?;
//!
//! let result = registry.execute_line(None, "/ban Alice spam");
//! assert!(result.passed());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod core;
pub mod errors;
pub mod models;

pub use crate::adapter::{Adapter, CommandContext};
pub use crate::core::node::{CommandHandler, CommandNode, TabProvider};
pub use crate::core::parameters::{EnumParameter, ParameterSet, retrieve_arguments};
pub use crate::core::reader::CommandSet;
pub use crate::core::registry::{RegisterProcess, Registry};
pub use crate::core::types::TypeRegistry;
pub use crate::core::usage::{UsageSlot, UsageSpec};
pub use crate::errors::RegistryError;
pub use crate::models::{
    CommandDefinition, CommandType, CompletionHandle, ExecutionCode, ExecutionResult, Source,
};
