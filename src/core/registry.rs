// src/core/registry.rs

use crate::adapter::Adapter;
use crate::core::node::{CommandNode, ResultCallback};
use crate::core::reader::{self, CommandSet};
use crate::core::types::TypeRegistry;
use crate::core::{read_guard, write_guard};
use crate::errors::RegistryError;
use crate::models::{ExecutionCode, ExecutionResult, Source};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

/// The command registry: owns every registered tree, the parameter type
/// registry, and the platform adapter, and drives both dispatch and tab
/// completion.
///
/// All of its state sits behind locks, so a single `Arc<Registry>` can be
/// shared across threads and registered into from any of them.
pub struct Registry {
    roots: RwLock<Vec<Arc<CommandNode>>>,
    unwound_cache: RwLock<Option<Arc<Vec<Arc<CommandNode>>>>>,
    types: Arc<TypeRegistry>,
    adapter: OnceLock<Arc<dyn Adapter>>,
    default_result_handler: RwLock<Option<Arc<ResultCallback>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            roots: RwLock::new(Vec::new()),
            unwound_cache: RwLock::new(None),
            types: Arc::new(TypeRegistry::with_defaults()),
            adapter: OnceLock::new(),
            default_result_handler: RwLock::new(None),
        }
    }

    /// Installs the platform adapter. Settable exactly once.
    pub fn set_adapter(&self, adapter: Arc<dyn Adapter>) -> Result<(), RegistryError> {
        self.adapter
            .set(adapter)
            .map_err(|_| RegistryError::AdapterAlreadySet)
    }

    pub fn adapter(&self) -> Result<Arc<dyn Adapter>, RegistryError> {
        self.adapter
            .get()
            .cloned()
            .ok_or(RegistryError::AdapterMissing)
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Registers a parser for parameter type `T`, rejecting duplicates.
    pub fn register_type<T, F>(&self, parser: F) -> Result<(), RegistryError>
    where
        T: Any + Send + Sync,
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        self.types.register::<T, F>(parser)
    }

    /// Fallback result handler for trees registered without one of their
    /// own. Applies to future registrations only.
    pub fn set_default_result_handler<F>(&self, callback: F)
    where
        F: Fn(Option<&Source>, &Arc<CommandNode>, &ExecutionResult) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        *write_guard(&self.default_result_handler) = Some(Arc::new(callback));
    }

    pub(crate) fn default_result_handler(&self) -> Option<Arc<ResultCallback>> {
        read_guard(&self.default_result_handler).clone()
    }

    /// Starts a registration of one or more command sets. Fails fast when
    /// no adapter has been installed yet.
    pub fn register(&self, sets: Vec<CommandSet>) -> Result<RegisterProcess<'_>, RegistryError> {
        if self.adapter.get().is_none() {
            return Err(RegistryError::AdapterMissing);
        }
        Ok(RegisterProcess {
            registry: self,
            sets,
            capsulated: true,
            separated: false,
        })
    }

    /// Root command matched case-insensitively by label or alias.
    /// Subcommands are not found here; see [`Registry::get_command_unwound`].
    pub fn get_command(&self, label: &str) -> Option<Arc<CommandNode>> {
        if label.is_empty() {
            return None;
        }
        read_guard(&self.roots)
            .iter()
            .find(|root| root.definition().matches(label))
            .cloned()
    }

    /// Every registered node, roots and descendants alike, behind a shared
    /// memoized snapshot. Rebuilt after each registration.
    pub fn get_commands_unwound(&self) -> Arc<Vec<Arc<CommandNode>>> {
        if let Some(cached) = read_guard(&self.unwound_cache).clone() {
            return cached;
        }
        let mut all: Vec<Arc<CommandNode>> = Vec::new();
        for root in read_guard(&self.roots).iter() {
            all.push(Arc::clone(root));
            all.extend(root.children_recursively());
        }
        let snapshot = Arc::new(all);
        *write_guard(&self.unwound_cache) = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Any node matched case-insensitively by label, alias or full dotted
    /// path.
    pub fn get_command_unwound(&self, label: &str) -> Option<Arc<CommandNode>> {
        if label.is_empty() {
            return None;
        }
        self.get_commands_unwound()
            .iter()
            .find(|node| node.definition().matches(label) || node.path().eq_ignore_ascii_case(label))
            .cloned()
    }

    pub(crate) fn clear_unwound_cache(&self) {
        *write_guard(&self.unwound_cache) = None;
    }

    /// Dispatches one command as a root label plus pre-split argument
    /// tokens. A single leading `/` on the label is tolerated. The outcome
    /// is also fed to the matched tree's result handlers before returning.
    pub fn execute_command(
        &self,
        source: Option<Source>,
        label: &str,
        args: &[String],
    ) -> ExecutionResult {
        let adapter = match self.adapter() {
            Ok(adapter) => adapter,
            Err(err) => {
                log::error!("dispatch of '{label}' impossible: {err}");
                return ExecutionResult::new(None, ExecutionCode::CommandNotFound, None);
            }
        };

        let label = label.strip_prefix('/').unwrap_or(label);
        let Some(root) = self.get_command(label) else {
            return ExecutionResult::new(None, ExecutionCode::CommandNotFound, None);
        };

        let result = root.execute(&adapter, &self.types, source.clone(), args);
        root.handle_result(source.as_ref(), &result);
        result
    }

    /// Dispatches one raw command line: first token is the root label, the
    /// rest are arguments. Routing splits on plain spaces; quoting only
    /// matters once the leaf re-parses its argument tail.
    pub fn execute_line(&self, source: Option<Source>, command_line: &str) -> ExecutionResult {
        let mut tokens: Vec<String> = command_line.split(' ').map(str::to_string).collect();
        while tokens.last().is_some_and(String::is_empty) {
            tokens.pop();
        }
        let Some(first) = tokens.first() else {
            return ExecutionResult::new(None, ExecutionCode::CommandNotFound, None);
        };
        self.execute_command(source, first, tokens.get(1..).unwrap_or(&[]))
    }

    /// Suggestions for the token the cursor sits on. A line holding only
    /// the root label completes nothing; a trailing space opens the next
    /// argument position.
    pub fn execute_tab_completion(&self, source: Option<Source>, command_line: &str) -> Vec<String> {
        let adapter = match self.adapter() {
            Ok(adapter) => adapter,
            Err(err) => {
                log::error!("tab completion of '{command_line}' impossible: {err}");
                return Vec::new();
            }
        };

        let tokens = crate::core::parameters::retrieve_arguments(command_line, false);
        if tokens.len() < 2 {
            return Vec::new();
        }
        let Some(first) = tokens.first() else {
            return Vec::new();
        };
        let label = first.strip_prefix('/').unwrap_or(first);
        let Some(root) = self.get_command(label) else {
            return Vec::new();
        };

        let args = tokens.get(1..).unwrap_or(&[]);
        let leaf = root.resolve_leaf(args, |node| {
            adapter.check_permission(source.as_ref(), node)
        });
        let Some(leaf) = leaf else {
            return Vec::new();
        };

        let index = tokens.len() - 1;
        let mut suggestions = leaf.tab_suggestions(source.as_ref(), index);

        // A partially typed token narrows the suggestions down,
        // case-sensitively.
        if let Some(last) = tokens.last() {
            if !last.trim().is_empty() {
                suggestions.retain(|s| s.starts_with(last.as_str()));
            }
        }
        suggestions
    }

    fn install_roots(&self, new_roots: &[Arc<CommandNode>]) -> Result<(), RegistryError> {
        let adapter = self.adapter()?;
        {
            let mut roots = write_guard(&self.roots);
            for root in new_roots {
                // The earliest registration of a label keeps it.
                if roots.iter().any(|held| held.label() == root.label()) {
                    log::warn!("root command '{}' already registered, skipping", root.label());
                    continue;
                }
                roots.push(Arc::clone(root));
                adapter.handle_register(root);
            }
        }
        self.clear_unwound_cache();
        // Rebuild eagerly so the first lookup after registration is warm.
        let _ = self.get_commands_unwound();
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("roots", &read_guard(&self.roots).len())
            .field("adapter", &self.adapter.get().is_some())
            .finish()
    }
}

/// Builder for one registration run, started via [`Registry::register`].
#[derive(Debug)]
pub struct RegisterProcess<'a> {
    registry: &'a Registry,
    sets: Vec<CommandSet>,
    capsulated: bool,
    separated: bool,
}

impl RegisterProcess<'_> {
    /// Capsulated registrations (the default) resolve parent labels inside
    /// the batch only; turn this off to hang subcommands below trees
    /// registered earlier.
    pub fn capsulated(mut self, flag: bool) -> Self {
        self.capsulated = flag;
        self
    }

    /// Separated registrations read each set as its own batch, so tab
    /// providers and result handlers stay scoped to the set they came with.
    pub fn separated(mut self, flag: bool) -> Self {
        self.separated = flag;
        self
    }

    /// Builds the trees and installs their roots. Returns the new roots in
    /// definition order.
    pub fn execute(self) -> Result<Vec<Arc<CommandNode>>, RegistryError> {
        let mut installed = Vec::new();
        if self.separated {
            for set in self.sets {
                if set.is_empty() {
                    continue;
                }
                let roots = reader::read_sets(self.registry, vec![set], self.capsulated)?;
                self.registry.install_roots(&roots)?;
                installed.extend(roots);
            }
        } else {
            let roots = reader::read_sets(self.registry, self.sets, self.capsulated)?;
            self.registry.install_roots(&roots)?;
            installed = roots;
        }
        Ok(installed)
    }
}
