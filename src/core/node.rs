// src/core/node.rs

use crate::adapter::{Adapter, CommandContext};
use crate::core::parameters::ParameterSet;
use crate::core::{read_guard, write_guard};
use crate::core::types::TypeRegistry;
use crate::core::usage::UsageSpec;
use crate::models::{
    CommandDefinition, CommandType, CompletionHandle, ExecutionCode, ExecutionResult, Source,
};
use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, Weak};

/// The callable bound to one command definition at registration time.
pub type CommandHandler =
    Box<dyn Fn(Option<Source>, &CommandContext, &ParameterSet) -> Result<()> + Send + Sync>;

/// A result-handler callable, invoked after every dispatch through the
/// root it is attached to.
pub type ResultCallback =
    dyn Fn(Option<&Source>, &Arc<CommandNode>, &ExecutionResult) -> Result<()> + Send + Sync;

type TabCompleterFn = dyn Fn(Option<&Source>, usize) -> Result<Vec<String>> + Send + Sync;

/// A tab-completion provider. The target label scopes it: empty applies to
/// every tree it is attached to, otherwise only to the root with that label.
pub struct TabProvider {
    command: String,
    complete: Box<TabCompleterFn>,
}

impl TabProvider {
    pub fn new<F>(command: impl Into<String>, complete: F) -> Self
    where
        F: Fn(Option<&Source>, usize) -> Result<Vec<String>> + Send + Sync + 'static,
    {
        Self {
            command: command.into(),
            complete: Box::new(complete),
        }
    }

    fn applies_to(&self, root_label: &str) -> bool {
        self.command.is_empty() || self.command.eq_ignore_ascii_case(root_label)
    }
}

impl fmt::Debug for TabProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabProvider")
            .field("command", &self.command)
            .finish()
    }
}

/// One node of a command tree: its definition, the owned children keyed by
/// label, and non-owning back-references to parent and root.
///
/// Children are the only owning edges; `parent` and `root` are weak, so a
/// tree never forms a reference cycle. `path` is the dot-joined label chain
/// from the root down to this node, computed once during registration.
/// Tab providers and result handlers live on root nodes only; descendants
/// reach them through `root`.
pub struct CommandNode {
    definition: CommandDefinition,
    usage: UsageSpec,
    handler: CommandHandler,
    children: RwLock<HashMap<String, Arc<CommandNode>>>,
    parent: OnceLock<Weak<CommandNode>>,
    root: OnceLock<Weak<CommandNode>>,
    path: OnceLock<String>,
    tab_providers: RwLock<Vec<Arc<TabProvider>>>,
    result_handlers: RwLock<Vec<Arc<ResultCallback>>>,
}

impl CommandNode {
    pub(crate) fn new(definition: CommandDefinition, handler: CommandHandler) -> Self {
        let usage = UsageSpec::parse(definition.label(), definition.usage_template());
        Self {
            definition,
            usage,
            handler,
            children: RwLock::new(HashMap::new()),
            parent: OnceLock::new(),
            root: OnceLock::new(),
            path: OnceLock::new(),
            tab_providers: RwLock::new(Vec::new()),
            result_handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn definition(&self) -> &CommandDefinition {
        &self.definition
    }

    pub fn label(&self) -> &str {
        self.definition.label()
    }

    pub fn usage(&self) -> &UsageSpec {
        &self.usage
    }

    pub fn command_type(&self) -> CommandType {
        self.definition.command_type()
    }

    /// The dot-joined label chain from the root to this node. A node that
    /// never went through tree building answers with its own label.
    pub fn path(&self) -> &str {
        self.path
            .get()
            .map_or_else(|| self.definition.label(), String::as_str)
    }

    /// Depth within the tree, `1` at the root.
    pub fn depth(&self) -> usize {
        self.path().split('.').count()
    }

    pub fn parent(&self) -> Option<Arc<CommandNode>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    pub fn root(&self) -> Option<Arc<CommandNode>> {
        self.root.get().and_then(Weak::upgrade)
    }

    /// The root of this tree, or the node itself when it is the top.
    pub fn root_or_self(self: &Arc<Self>) -> Arc<CommandNode> {
        self.root().unwrap_or_else(|| Arc::clone(self))
    }

    /// Snapshot of the direct children.
    pub fn children(&self) -> Vec<Arc<CommandNode>> {
        read_guard(&self.children).values().cloned().collect()
    }

    /// Children, children of children, and so on.
    pub fn children_recursively(&self) -> Vec<Arc<CommandNode>> {
        let mut all = self.children();
        let mut index = 0;
        while let Some(node) = all.get(index).cloned() {
            all.extend(node.children());
            index += 1;
        }
        all
    }

    /// Direct child matched case-insensitively by label or alias.
    pub fn child(&self, label: &str) -> Option<Arc<CommandNode>> {
        read_guard(&self.children)
            .values()
            .find(|child| child.definition.matches(label))
            .cloned()
    }

    pub(crate) fn set_parent(&self, parent: &Arc<CommandNode>) {
        let _ = self.parent.set(Arc::downgrade(parent));
    }

    pub(crate) fn set_root(&self, root: &Arc<CommandNode>) {
        let _ = self.root.set(Arc::downgrade(root));
    }

    pub(crate) fn set_path(&self, path: String) {
        let _ = self.path.set(path);
    }

    pub(crate) fn path_is_set(&self) -> bool {
        self.path.get().is_some()
    }

    pub(crate) fn insert_child(&self, child: Arc<CommandNode>) {
        write_guard(&self.children)
            .entry(child.definition.label().to_string())
            .or_insert(child);
    }

    pub(crate) fn add_tab_providers(&self, providers: &[Arc<TabProvider>]) {
        write_guard(&self.tab_providers).extend(providers.iter().cloned());
    }

    pub(crate) fn add_result_handlers(&self, callbacks: &[Arc<ResultCallback>]) {
        write_guard(&self.result_handlers).extend(callbacks.iter().cloned());
    }

    pub(crate) fn has_result_handlers(&self) -> bool {
        !read_guard(&self.result_handlers).is_empty()
    }

    /// Walks from this node towards the deepest child reachable by
    /// consuming leading argument tokens, one child label-or-alias match
    /// per step. `permitted` is evaluated on every visited node, this one
    /// included; a denial aborts the whole walk with `None`; there is no
    /// partial match. Tokens that match no child become argument data of
    /// the returned leaf.
    pub fn resolve_leaf<P>(self: &Arc<Self>, args: &[String], permitted: P) -> Option<Arc<CommandNode>>
    where
        P: Fn(&Arc<CommandNode>) -> bool,
    {
        let mut current = Arc::clone(self);
        let mut remaining = args;
        loop {
            if !permitted(&current) {
                return None;
            }
            let Some(head) = remaining.first() else {
                return Some(current);
            };
            match current.child(head) {
                Some(child) => {
                    current = child;
                    remaining = remaining.get(1..).unwrap_or(&[]);
                }
                None => return Some(current),
            }
        }
    }

    /// Routes `args` below this node and dispatches the resolved leaf.
    ///
    /// The outcome is always an [`ExecutionResult`]; permission, source and
    /// arity failures come back as codes, and a failing handler body is
    /// logged without ever reaching the caller.
    pub fn execute(
        self: &Arc<Self>,
        adapter: &Arc<dyn Adapter>,
        types: &Arc<TypeRegistry>,
        source: Option<Source>,
        args: &[String],
    ) -> ExecutionResult {
        // Master permission of the entry node first.
        if !self.definition.permission_node().is_empty()
            && !adapter.check_permission(source.as_ref(), self)
        {
            return ExecutionResult::new(None, ExecutionCode::NoPermission, None);
        }

        let leaf = self.resolve_leaf(args, |node| {
            node.definition.permission_node().is_empty()
                || adapter.check_permission(source.as_ref(), node)
        });
        let Some(leaf) = leaf else {
            return ExecutionResult::new(None, ExecutionCode::NoPermission, None);
        };

        // Everything past the consumed path is argument data.
        let tail = args.get(leaf.depth() - 1..).unwrap_or(&[]);
        let line = tail.join(" ");
        let parameters = ParameterSet::from_line(line.trim(), Arc::clone(types));

        if let Some(src) = &source {
            let target = leaf
                .definition
                .target_type()
                .unwrap_or_else(|| adapter.source_type());
            if (**src).type_id() != target {
                return ExecutionResult::new(Some(leaf), ExecutionCode::WrongSource, None);
            }
        }

        if parameters.len() < leaf.usage.needed_size() {
            return ExecutionResult::new(Some(leaf), ExecutionCode::TooFewArguments, None);
        }

        let handle = CompletionHandle::new();
        if leaf.definition.is_async() {
            let task_leaf = Arc::clone(&leaf);
            let task_adapter = Arc::clone(adapter);
            let task_handle = handle.clone();
            let task_source = source.clone();
            adapter.run_async(Box::new(move || {
                task_leaf.invoke_handler(task_adapter.as_ref(), task_source.clone(), &parameters);
                task_handle.complete(task_source);
            }));
        } else {
            leaf.invoke_handler(adapter.as_ref(), source.clone(), &parameters);
            handle.complete(source);
        }

        ExecutionResult::new(Some(leaf), ExecutionCode::Passed, Some(handle))
    }

    fn invoke_handler(
        self: &Arc<Self>,
        adapter: &dyn Adapter,
        source: Option<Source>,
        parameters: &ParameterSet,
    ) {
        let context = adapter.construct_context(source.clone(), self, parameters);
        if let Err(err) = (self.handler)(source, &context, parameters) {
            log::error!("handler of command '{}' failed: {err:#}", self.path());
        }
    }

    /// Collects suggestions for the argument at `index` from the providers
    /// attached to this tree's root. Index `0` is the root label itself and
    /// never completes. Provider failures are logged and swallowed.
    pub fn tab_suggestions(self: &Arc<Self>, source: Option<&Source>, index: usize) -> Vec<String> {
        if index == 0 {
            log::warn!("tab completion at index 0 requested for '{}'", self.path());
            return Vec::new();
        }

        let root = self.root_or_self();
        let providers: Vec<Arc<TabProvider>> = read_guard(&root.tab_providers).clone();

        let mut suggestions = Vec::new();
        for provider in providers {
            if !provider.applies_to(root.definition.label()) {
                continue;
            }
            match (provider.complete)(source, index) {
                Ok(mut list) => suggestions.append(&mut list),
                Err(err) => log::warn!(
                    "tab provider of '{}' failed at index {index}: {err:#}",
                    root.definition.label()
                ),
            }
        }
        suggestions
    }

    /// Feeds `result` to every result handler attached to this tree's
    /// root. Handler failures are logged and swallowed; a broken handler
    /// must not break dispatch for anyone else.
    pub fn handle_result(self: &Arc<Self>, source: Option<&Source>, result: &ExecutionResult) {
        let root = self.root_or_self();
        let callbacks: Vec<Arc<ResultCallback>> = read_guard(&root.result_handlers).clone();
        let command = result
            .command()
            .cloned()
            .unwrap_or_else(|| Arc::clone(self));

        for callback in callbacks {
            if let Err(err) = callback(source, &command, result) {
                log::warn!(
                    "result handler of '{}' failed: {err:#}",
                    root.definition.label()
                );
            }
        }
    }
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("path", &self.path())
            .field("type", &self.command_type())
            .field("children", &read_guard(&self.children).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(definition: CommandDefinition) -> Arc<CommandNode> {
        Arc::new(CommandNode::new(definition, Box::new(|_, _, _| Ok(()))))
    }

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    /// Hand-wires `fly` -> `change` -> `mode` the way the reader would.
    fn sample_tree() -> (Arc<CommandNode>, Arc<CommandNode>, Arc<CommandNode>) {
        let fly = node(CommandDefinition::new("fly"));
        let change = node(CommandDefinition::new("change").parent("fly").alias("ch"));
        let mode = node(CommandDefinition::new("mode").parent("change"));

        change.set_parent(&fly);
        mode.set_parent(&change);
        fly.insert_child(Arc::clone(&change));
        change.insert_child(Arc::clone(&mode));

        fly.set_path("fly".to_string());
        change.set_path("fly.change".to_string());
        mode.set_path("fly.change.mode".to_string());
        change.set_root(&fly);
        mode.set_root(&fly);

        (fly, change, mode)
    }

    #[test]
    fn test_path_and_depth() {
        let (fly, change, mode) = sample_tree();
        assert_eq!(fly.depth(), 1);
        assert_eq!(change.depth(), 2);
        assert_eq!(mode.depth(), 3);
        assert_eq!(mode.path(), "fly.change.mode");
        assert_eq!(mode.path().split('.').count(), mode.depth());
    }

    #[test]
    fn test_root_or_self() {
        let (fly, _, mode) = sample_tree();
        assert!(Arc::ptr_eq(&mode.root_or_self(), &fly));
        assert!(Arc::ptr_eq(&fly.root_or_self(), &fly));
    }

    #[test]
    fn test_child_lookup_by_label_and_alias() {
        let (fly, change, _) = sample_tree();
        assert!(fly.child("CHANGE").is_some_and(|c| Arc::ptr_eq(&c, &change)));
        assert!(fly.child("ch").is_some_and(|c| Arc::ptr_eq(&c, &change)));
        assert!(fly.child("delete").is_none());
    }

    #[test]
    fn test_resolve_leaf_descends_and_keeps_tail() {
        let (fly, _, mode) = sample_tree();

        let leaf = fly
            .resolve_leaf(&args(&["change", "mode", "creative"]), |_| true)
            .expect("leaf");
        assert!(Arc::ptr_eq(&leaf, &mode));

        // Unmatched tokens stop the descent; the current node is the leaf.
        let leaf = fly
            .resolve_leaf(&args(&["Alice", "spam"]), |_| true)
            .expect("leaf");
        assert!(Arc::ptr_eq(&leaf, &fly));
    }

    #[test]
    fn test_resolve_leaf_exhausted_args_returns_current() {
        let (fly, change, _) = sample_tree();
        let leaf = fly.resolve_leaf(&args(&["ch"]), |_| true).expect("leaf");
        assert!(Arc::ptr_eq(&leaf, &change));
        let leaf = fly.resolve_leaf(&[], |_| true).expect("leaf");
        assert!(Arc::ptr_eq(&leaf, &fly));
    }

    #[test]
    fn test_resolve_leaf_denial_aborts_without_partial_match() {
        let (fly, _, _) = sample_tree();
        let leaf = fly.resolve_leaf(&args(&["change", "mode"]), |node| {
            node.label() != "change"
        });
        assert!(leaf.is_none());
    }

    #[test]
    fn test_children_recursively() {
        let (fly, _, _) = sample_tree();
        let all = fly.children_recursively();
        assert_eq!(all.len(), 2);
        let mut paths: Vec<&str> = all.iter().map(|n| n.path()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["fly.change", "fly.change.mode"]);
    }
}
