// src/core/reader.rs
//
// Turns flat batches of command definitions into wired trees: parents
// resolved, paths computed, tab providers and result handlers broadcast
// to the roots.

use crate::core::node::{CommandHandler, CommandNode, ResultCallback, TabProvider};
use crate::core::registry::Registry;
use crate::errors::RegistryError;
use std::sync::Arc;

/// One batch of related command definitions, handlers and tree-level
/// callbacks, registered together.
#[derive(Default)]
pub struct CommandSet {
    commands: Vec<(crate::models::CommandDefinition, CommandHandler)>,
    tab_providers: Vec<Arc<TabProvider>>,
    result_handlers: Vec<Arc<ResultCallback>>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one command definition with its handler body.
    pub fn command<F>(mut self, definition: crate::models::CommandDefinition, handler: F) -> Self
    where
        F: Fn(
                Option<crate::models::Source>,
                &crate::adapter::CommandContext,
                &crate::core::parameters::ParameterSet,
            ) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.commands.push((definition, Box::new(handler)));
        self
    }

    pub fn tab_provider(mut self, provider: TabProvider) -> Self {
        self.tab_providers.push(Arc::new(provider));
        self
    }

    pub fn result_handler<F>(mut self, callback: F) -> Self
    where
        F: Fn(
                Option<&crate::models::Source>,
                &Arc<CommandNode>,
                &crate::models::ExecutionResult,
            ) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.result_handlers.push(Arc::new(callback));
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl std::fmt::Debug for CommandSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSet")
            .field("commands", &self.commands.len())
            .field("tab_providers", &self.tab_providers.len())
            .field("result_handlers", &self.result_handlers.len())
            .finish()
    }
}

/// Reads the batches into wired trees and returns the new roots, in
/// definition order.
///
/// With `capsulated` set, parent labels only resolve inside the batch;
/// otherwise an unresolved parent falls back to the registry's existing
/// trees, so a batch can hang subcommands below commands registered
/// earlier. Definitions whose parent chain never reaches a root are
/// dropped with a debug log.
pub(crate) fn read_sets(
    registry: &Registry,
    sets: Vec<CommandSet>,
    capsulated: bool,
) -> Result<Vec<Arc<CommandNode>>, RegistryError> {
    let mut nodes: Vec<Arc<CommandNode>> = Vec::new();
    let mut tab_providers: Vec<Arc<TabProvider>> = Vec::new();
    let mut result_handlers: Vec<Arc<ResultCallback>> = Vec::new();

    for set in sets {
        for (definition, handler) in set.commands {
            if definition.label().is_empty() {
                return Err(RegistryError::EmptyLabel);
            }
            nodes.push(Arc::new(CommandNode::new(definition, handler)));
        }
        tab_providers.extend(set.tab_providers);
        result_handlers.extend(set.result_handlers);
    }

    // On duplicate labels within one registration the last definition wins.
    let survivors: Vec<Arc<CommandNode>> = nodes
        .iter()
        .enumerate()
        .filter(|(index, node)| {
            !nodes
                .iter()
                .skip(index + 1)
                .any(|later| later.label().eq_ignore_ascii_case(node.label()))
        })
        .map(|(_, node)| Arc::clone(node))
        .collect();

    // Resolve parents: batch first, then (when not capsulated) the trees
    // already held by the registry.
    for node in &survivors {
        let parent_label = node.definition().parent_label();
        if parent_label.is_empty() {
            continue;
        }
        let in_batch = survivors
            .iter()
            .find(|&candidate| {
                !Arc::ptr_eq(candidate, node)
                    && candidate.label().eq_ignore_ascii_case(parent_label)
            })
            .cloned();
        let parent = match in_batch {
            Some(parent) => Some(parent),
            None if !capsulated => registry.get_command_unwound(parent_label),
            None => None,
        };
        if let Some(parent) = parent {
            node.set_parent(&parent);
            parent.insert_child(Arc::clone(node));
        }
    }

    let mut batch_roots: Vec<Arc<CommandNode>> = Vec::new();
    for node in &survivors {
        if wire_path(node) {
            if node.parent().is_none() {
                batch_roots.push(Arc::clone(node));
            }
        } else {
            log::debug!(
                "dropping command '{}': parent '{}' not found",
                node.label(),
                node.definition().parent_label()
            );
        }
    }

    // Callbacks live on roots. Broadcast to the roots this batch produced;
    // pre-existing trees that merely adopted a subcommand are left alone.
    for root in &batch_roots {
        root.add_tab_providers(&tab_providers);
        root.add_result_handlers(&result_handlers);
        if !root.has_result_handlers() {
            if let Some(fallback) = registry.default_result_handler() {
                root.add_result_handlers(&[fallback]);
            }
        }
    }

    Ok(batch_roots)
}

/// Settles path and root for `node` by walking its ancestor chain, and
/// answers whether the chain reached a tree. Ancestors are settled along
/// the way; a cyclic chain is treated as unreachable.
fn wire_path(node: &Arc<CommandNode>) -> bool {
    let mut chain: Vec<Arc<CommandNode>> = vec![Arc::clone(node)];
    loop {
        let current = chain.last().map(Arc::clone);
        let Some(current) = current else { return false };
        if current.path_is_set() {
            chain.pop();
            break;
        }
        match current.parent() {
            Some(parent) => {
                if chain.iter().any(|seen| Arc::ptr_eq(seen, &parent)) {
                    log::warn!("cyclic parent chain at command '{}'", parent.label());
                    return false;
                }
                chain.push(parent);
            }
            None => {
                if !current.definition().parent_label().is_empty() {
                    return false;
                }
                current.set_path(current.label().to_string());
                chain.pop();
                break;
            }
        }
    }

    // Remaining entries are ordered deepest-last; settle them top-down.
    while let Some(current) = chain.pop() {
        let parent = match current.parent() {
            Some(parent) => parent,
            None => continue,
        };
        current.set_path(format!("{}.{}", parent.path(), current.label()));
        current.set_root(&parent.root_or_self());
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommandDefinition;

    fn registry() -> Registry {
        Registry::new()
    }

    fn set_of(definitions: Vec<CommandDefinition>) -> CommandSet {
        let mut set = CommandSet::new();
        for definition in definitions {
            set = set.command(definition, |_, _, _| Ok(()));
        }
        set
    }

    #[test]
    fn test_paths_follow_parent_chain() {
        let roots = read_sets(
            &registry(),
            vec![set_of(vec![
                CommandDefinition::new("fly"),
                CommandDefinition::new("change").parent("fly"),
                CommandDefinition::new("mode").parent("change"),
            ])],
            true,
        )
        .expect("read");

        assert_eq!(roots.len(), 1);
        let fly = &roots[0];
        assert_eq!(fly.path(), "fly");
        for child in fly.children_recursively() {
            let parent = child.parent().expect("parent");
            assert_eq!(child.path(), format!("{}.{}", parent.path(), child.label()));
            assert!(Arc::ptr_eq(&child.root_or_self(), fly));
        }
    }

    #[test]
    fn test_orphans_are_dropped() {
        let roots = read_sets(
            &registry(),
            vec![set_of(vec![
                CommandDefinition::new("fly"),
                CommandDefinition::new("lost").parent("nowhere"),
                CommandDefinition::new("deeper").parent("lost"),
            ])],
            true,
        )
        .expect("read");

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].label(), "fly");
        assert!(roots[0].children().is_empty());
    }

    #[test]
    fn test_duplicate_labels_last_definition_wins() {
        let roots = read_sets(
            &registry(),
            vec![set_of(vec![
                CommandDefinition::new("fly").description("first"),
                CommandDefinition::new("FLY").description("second"),
            ])],
            true,
        )
        .expect("read");

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].definition().description_text(), "second");
    }

    #[test]
    fn test_empty_label_is_rejected() {
        let outcome = read_sets(
            &registry(),
            vec![set_of(vec![CommandDefinition::new("")])],
            true,
        );
        assert!(matches!(outcome, Err(RegistryError::EmptyLabel)));
    }

    #[test]
    fn test_multi_root_batch_assigns_own_roots() {
        let roots = read_sets(
            &registry(),
            vec![set_of(vec![
                CommandDefinition::new("fly"),
                CommandDefinition::new("walk"),
                CommandDefinition::new("fast").parent("walk"),
            ])],
            true,
        )
        .expect("read");

        assert_eq!(roots.len(), 2);
        let walk = roots.iter().find(|r| r.label() == "walk").expect("walk");
        let fast = walk.child("fast").expect("fast");
        assert!(Arc::ptr_eq(&fast.root_or_self(), walk));
    }

    #[test]
    fn test_callbacks_broadcast_to_batch_roots() {
        let set = set_of(vec![
            CommandDefinition::new("fly"),
            CommandDefinition::new("walk"),
        ])
        .result_handler(|_, _, _| Ok(()));

        let roots = read_sets(&registry(), vec![set], true).expect("read");
        assert_eq!(roots.len(), 2);
        for root in &roots {
            assert!(root.has_result_handlers());
        }
    }
}
