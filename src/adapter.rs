// src/adapter.rs

use crate::core::node::CommandNode;
use crate::core::parameters::ParameterSet;
use crate::models::Source;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// The host-implemented capability set the engine delegates to: permission
/// checks, asynchronous execution, source-type identity and registration
/// hooks. The core never assumes a specific threading model; whatever
/// `run_async` does with the task is the host's business.
pub trait Adapter: Send + Sync {
    /// Called once per newly inserted root after a registration batch
    /// completes (e.g. to mirror the command into a platform command table).
    fn handle_register(&self, node: &Arc<CommandNode>);

    /// Authorization oracle, consulted before every tree step. Expected to
    /// be side-effect free.
    fn check_permission(&self, source: Option<&Source>, node: &CommandNode) -> bool;

    /// Must eventually invoke `task` exactly once, on any thread. Dropping
    /// it silently breaks asynchronous commands.
    fn run_async(&self, task: Box<dyn FnOnce() + Send>);

    /// The concrete source type commands target by default; used for the
    /// wrong-source check when a definition declares no target of its own.
    fn source_type(&self) -> TypeId;

    /// Builds the context handed to command handlers. Hosts needing more
    /// than source + command attach an opaque payload; the default is a
    /// plain context.
    fn construct_context(
        &self,
        source: Option<Source>,
        node: &Arc<CommandNode>,
        parameters: &ParameterSet,
    ) -> CommandContext {
        let _ = parameters;
        CommandContext::new(source, Arc::clone(node))
    }
}

/// The third argument passed to command handlers: the source, the resolved
/// command and an optional host-specific payload.
pub struct CommandContext {
    source: Option<Source>,
    command: Arc<CommandNode>,
    payload: Option<Box<dyn Any + Send + Sync>>,
}

impl CommandContext {
    pub fn new(source: Option<Source>, command: Arc<CommandNode>) -> Self {
        Self {
            source,
            command,
            payload: None,
        }
    }

    pub fn with_payload(
        source: Option<Source>,
        command: Arc<CommandNode>,
        payload: impl Any + Send + Sync,
    ) -> Self {
        Self {
            source,
            command,
            payload: Some(Box::new(payload)),
        }
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn command(&self) -> &Arc<CommandNode> {
        &self.command
    }

    /// Downcasts the host payload, if one was attached.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref())
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("command", &self.command.path())
            .field("has_source", &self.source.is_some())
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}
