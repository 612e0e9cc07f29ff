// src/core/parameters.rs

use crate::core::types::TypeRegistry;
use lazy_static::lazy_static;
use regex::Regex;
use std::any::Any;
use std::cell::Cell;
use std::sync::Arc;

lazy_static! {
    /// One token is either a double-quoted run or a maximal run of
    /// non-space, non-quote characters.
    /// Example: `arg0 arg1 "arg2 arg2.1" arg3` tokenizes to
    /// `arg0`, `arg1`, `arg2 arg2.1`, `arg3`.
    static ref PARAMETER_PATTERN: Regex = Regex::new(r#"("[^"]*")|([^" ]+)"#).unwrap();
}

/// Tokenizes a raw command-argument string, honoring quoted groups.
///
/// An empty input produces zero tokens. An input ending in a space gains
/// one trailing empty token unless `ignore_empty` is set; that empty token
/// models the in-progress next argument during tab completion.
pub fn retrieve_arguments(command_line: &str, ignore_empty: bool) -> Vec<String> {
    if command_line.is_empty() {
        return Vec::new();
    }

    let mut arguments: Vec<String> = PARAMETER_PATTERN
        .find_iter(command_line)
        .map(|token| token.as_str().replace('"', ""))
        .collect();

    if (command_line.ends_with(' ') && !ignore_empty) || arguments.is_empty() {
        arguments.push(String::new());
    }
    arguments
}

/// An enum usable as a typed command argument. Rust has no runtime variant
/// table, so implementors declare one explicitly:
///
/// ```
/// use cmdtree::EnumParameter;
///
/// #[derive(Clone, Copy, PartialEq, Debug)]
/// enum Gamemode { Survival, Creative }
///
/// impl EnumParameter for Gamemode {
///     const VARIANTS: &'static [Self] = &[Self::Survival, Self::Creative];
///     fn name(&self) -> &'static str {
///         match self {
///             Self::Survival => "survival",
///             Self::Creative => "creative",
///         }
///     }
/// }
/// ```
pub trait EnumParameter: Copy + 'static {
    /// All variants, in ordinal order.
    const VARIANTS: &'static [Self];

    fn name(&self) -> &'static str;
}

/// The ordered argument tokens of one command invocation, with typed
/// accessors backed by a [`TypeRegistry`].
///
/// Carries a read cursor for sequential access (`next`/`current`) that is
/// independent of the positional, index-based accessors.
#[derive(Debug)]
pub struct ParameterSet {
    parameters: Vec<String>,
    cursor: Cell<usize>,
    types: Arc<TypeRegistry>,
}

impl ParameterSet {
    pub fn from_tokens(parameters: Vec<String>, types: Arc<TypeRegistry>) -> Self {
        Self {
            parameters,
            cursor: Cell::new(0),
            types,
        }
    }

    /// Tokenizes `command_line` (see [`retrieve_arguments`]) into a set.
    pub fn from_line(command_line: &str, types: Arc<TypeRegistry>) -> Self {
        Self::from_tokens(retrieve_arguments(command_line, false), types)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// The tokens re-joined with single spaces.
    pub fn command_line(&self) -> String {
        self.parameters.join(" ")
    }

    /// Positional access; `None` out of bounds rather than failing.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.parameters.get(index).map(String::as_str)
    }

    /// Sub-slice `[from, to)`, clipped to the valid range.
    pub fn range(&self, from: usize, to: usize) -> &[String] {
        let to = to.min(self.parameters.len());
        self.parameters.get(from..to).unwrap_or(&[])
    }

    pub fn range_from(&self, from: usize) -> &[String] {
        self.range(from, self.parameters.len())
    }

    /// The token under the read cursor, without advancing it.
    pub fn current(&self) -> Option<&str> {
        self.get(self.cursor.get())
    }

    /// The token under the read cursor; advances the cursor by one.
    pub fn next(&self) -> Option<&str> {
        let index = self.cursor.get();
        self.cursor.set(index + 1);
        self.get(index)
    }

    pub fn reset_cursor(&self) {
        self.cursor.set(0);
    }

    /// Typed access through the type registry. `None` if the index is out
    /// of range, the type is unregistered, or parsing fails.
    pub fn get_as<T: Any>(&self, index: usize) -> Option<T> {
        self.get(index).and_then(|raw| self.types.parse(raw))
    }

    pub fn get_or<T: Any>(&self, index: usize, default: T) -> T {
        self.get_as(index).unwrap_or(default)
    }

    pub fn get_int(&self, index: usize) -> Option<i64> {
        self.get_as(index)
    }

    pub fn get_int_or(&self, index: usize, default: i64) -> i64 {
        self.get_or(index, default)
    }

    pub fn get_double(&self, index: usize) -> Option<f64> {
        self.get_as(index)
    }

    pub fn get_double_or(&self, index: usize, default: f64) -> f64 {
        self.get_or(index, default)
    }

    pub fn get_bool(&self, index: usize) -> Option<bool> {
        self.get_as(index)
    }

    pub fn get_bool_or(&self, index: usize, default: bool) -> bool {
        self.get_or(index, default)
    }

    /// Enum access. A numeric token is treated as a variant ordinal,
    /// validated against the variant count; anything else is matched
    /// case-insensitively against variant names.
    pub fn get_enum<E: EnumParameter>(&self, index: usize) -> Option<E> {
        let raw = self.get(index)?;
        if let Ok(ordinal) = raw.parse::<usize>() {
            return E::VARIANTS.get(ordinal).copied();
        }
        E::VARIANTS
            .iter()
            .copied()
            .find(|variant| variant.name().eq_ignore_ascii_case(raw))
    }

    pub fn get_enum_or<E: EnumParameter>(&self, index: usize, default: E) -> E {
        self.get_enum(index).unwrap_or(default)
    }
}
