// src/models.rs

use crate::core::node::CommandNode;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// The value executing a command. Hosts pick any concrete type (a user
/// struct, a console marker, a test string) and hand it over behind an
/// `Arc` so asynchronous handlers can keep it alive across threads.
pub type Source = Arc<dyn Any + Send + Sync>;

/// Whether a command sits at the top of a tree or below another command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    /// A command with no parent; the unit of top-level registration.
    Root,
    /// A command reachable only via path traversal under its root.
    Sub,
}

/// The declarative description of a single command. Immutable once handed
/// to a registration batch; trees are wired from these flat definitions.
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    label: String,
    aliases: Vec<String>,
    parent: String,
    description: String,
    permission: String,
    usage: String,
    target: Option<TypeId>,
    run_async: bool,
}

impl CommandDefinition {
    /// Starts a definition for the given label. The label must be non-empty
    /// by registration time, otherwise the batch fails with
    /// [`crate::errors::RegistryError::EmptyLabel`].
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            aliases: Vec::new(),
            parent: String::new(),
            description: String::new(),
            permission: String::new(),
            usage: String::new(),
            target: None,
            run_async: false,
        }
    }

    /// Adds an alias. Aliases are stored lower-cased; empty ones are dropped.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into().to_ascii_lowercase();
        if !alias.is_empty() {
            self.aliases.push(alias);
        }
        self
    }

    /// Sets the parent label. An empty parent makes this a root command.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the permission string. Empty means unrestricted.
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = permission.into();
        self
    }

    /// Sets the usage template, e.g. `"<player> <reason> [duration]"`.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Restricts the command to sources of the concrete type `T`. Without
    /// this, the adapter's default source type applies.
    pub fn target<T: Any + Send + Sync>(mut self) -> Self {
        self.target = Some(TypeId::of::<T>());
        self
    }

    /// Marks the handler for asynchronous dispatch through the adapter.
    pub fn run_async(mut self, flag: bool) -> Self {
        self.run_async = flag;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn parent_label(&self) -> &str {
        &self.parent
    }

    pub fn description_text(&self) -> &str {
        &self.description
    }

    pub fn permission_node(&self) -> &str {
        &self.permission
    }

    pub fn usage_template(&self) -> &str {
        &self.usage
    }

    pub fn target_type(&self) -> Option<TypeId> {
        self.target
    }

    pub fn is_async(&self) -> bool {
        self.run_async
    }

    pub fn command_type(&self) -> CommandType {
        if self.parent.is_empty() {
            CommandType::Root
        } else {
            CommandType::Sub
        }
    }

    /// Case-insensitive match against the label or any alias.
    pub fn matches(&self, label: &str) -> bool {
        self.label.eq_ignore_ascii_case(label)
            || self.aliases.iter().any(|a| a == &label.to_ascii_lowercase())
    }
}

/// Outcome code of a dispatch attempt. Dispatch never raises; every failure
/// mode is reported through one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionCode {
    Passed,
    CommandNotFound,
    TooFewArguments,
    WrongSource,
    NoPermission,
}

/// What came out of routing and executing one command line.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    command: Option<Arc<CommandNode>>,
    code: ExecutionCode,
    handle: Option<CompletionHandle>,
}

impl ExecutionResult {
    pub(crate) fn new(
        command: Option<Arc<CommandNode>>,
        code: ExecutionCode,
        handle: Option<CompletionHandle>,
    ) -> Self {
        Self { command, code, handle }
    }

    /// The resolved leaf, when routing got far enough to identify one.
    pub fn command(&self) -> Option<&Arc<CommandNode>> {
        self.command.as_ref()
    }

    pub fn code(&self) -> ExecutionCode {
        self.code
    }

    pub fn passed(&self) -> bool {
        self.code == ExecutionCode::Passed
    }

    /// Completion handle of the (possibly asynchronous) handler invocation.
    /// Present only on [`ExecutionCode::Passed`].
    pub fn handle(&self) -> Option<&CompletionHandle> {
        self.handle.as_ref()
    }
}

enum HandleSlot {
    Pending,
    Done(Option<Source>),
}

struct HandleInner {
    slot: Mutex<HandleSlot>,
    done: Condvar,
}

/// A one-shot completion latch for handler invocations. Settled exactly
/// once, after the handler returns or fails, carrying only the source;
/// later completions are ignored.
#[derive(Clone)]
pub struct CompletionHandle {
    inner: Arc<HandleInner>,
}

impl CompletionHandle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                slot: Mutex::new(HandleSlot::Pending),
                done: Condvar::new(),
            }),
        }
    }

    pub(crate) fn complete(&self, source: Option<Source>) {
        let mut slot = self
            .inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(*slot, HandleSlot::Pending) {
            *slot = HandleSlot::Done(source);
            self.inner.done.notify_all();
        }
    }

    pub fn is_complete(&self) -> bool {
        let slot = self
            .inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        matches!(*slot, HandleSlot::Done(_))
    }

    /// Blocks until the handler invocation has finished and returns the
    /// source it ran with.
    pub fn wait(&self) -> Option<Source> {
        let mut slot = self
            .inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            match &*slot {
                HandleSlot::Done(source) => return source.clone(),
                HandleSlot::Pending => {
                    slot = self
                        .inner
                        .done
                        .wait(slot)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}

impl fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_builder_normalizes_aliases() {
        let definition = CommandDefinition::new("ban")
            .alias("BanHammer")
            .alias("")
            .alias("b");
        assert_eq!(definition.aliases(), &["banhammer", "b"]);
        assert!(definition.matches("BAN"));
        assert!(definition.matches("BanHammer"));
        assert!(!definition.matches("pardon"));
    }

    #[test]
    fn test_definition_command_type_from_parent() {
        assert_eq!(
            CommandDefinition::new("ban").command_type(),
            CommandType::Root
        );
        assert_eq!(
            CommandDefinition::new("list").parent("ban").command_type(),
            CommandType::Sub
        );
    }

    #[test]
    fn test_completion_handle_completes_once() {
        let handle = CompletionHandle::new();
        assert!(!handle.is_complete());

        let source: Source = Arc::new("steve".to_string());
        handle.complete(Some(source));
        assert!(handle.is_complete());

        // A second completion must not overwrite the settled value.
        handle.complete(None);
        let settled = handle.wait().expect("source was settled");
        assert_eq!(
            settled.downcast_ref::<String>().map(String::as_str),
            Some("steve")
        );
    }

    #[test]
    fn test_completion_handle_wait_across_threads() {
        let handle = CompletionHandle::new();
        let waiter = handle.clone();
        let join = std::thread::spawn(move || waiter.wait());

        handle.complete(None);
        assert!(join.join().expect("waiter thread").is_none());
    }
}
