// src/core/usage.rs

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    /// A well-formed usage template: space-separated, bracket-delimited slots.
    static ref USAGE_PATTERN: Regex =
        Regex::new(r"^(([<\[])[a-zA-Z_0-9:|-]+([>\]])( )?)+$").unwrap();
    /// A required slot, e.g. `<player>`. Optional slots use `[duration]`.
    static ref REQUIRED_SLOT: Regex = Regex::new(r"^<[0-9a-zA-Z_:|-]+>$").unwrap();
}

/// One positional parameter declared by a usage template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSlot {
    name: String,
    required: bool,
}

impl UsageSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// A parsed usage template such as `<player> <reason> [duration]`.
///
/// A template that does not fully match the grammar degrades to zero slots
/// rather than failing: the command then simply enforces no parameters.
/// Required slots are expected before optional ones; this is not validated,
/// and a required slot placed after an optional one is never counted
/// towards [`Self::needed_size`].
#[derive(Debug, Clone)]
pub struct UsageSpec {
    label: String,
    base: String,
    slots: Vec<UsageSlot>,
}

impl UsageSpec {
    pub fn parse(label: &str, base: &str) -> Self {
        let mut slots = Vec::new();
        if USAGE_PATTERN.is_match(base) {
            for token in base.split(' ') {
                let required = REQUIRED_SLOT.is_match(token);
                let name = token
                    .trim_matches(|c| matches!(c, '<' | '>' | '[' | ']'))
                    .to_string();
                slots.push(UsageSlot { name, required });
            }
        }
        Self {
            label: label.to_string(),
            base: base.to_string(),
            slots,
        }
    }

    /// The raw template string.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn slots(&self) -> &[UsageSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&UsageSlot> {
        self.slots.get(index)
    }

    pub fn is_required(&self, index: usize) -> bool {
        self.slot(index).is_some_and(UsageSlot::is_required)
    }

    /// How many arguments a command line must carry at minimum: the length
    /// of the maximal required-slot prefix.
    pub fn needed_size(&self) -> usize {
        self.slots.iter().take_while(|slot| slot.required).count()
    }
}

impl fmt::Display for UsageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.base.is_empty() {
            write!(f, "{}", self.label)
        } else {
            write!(f, "{} {}", self.label, self.base)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_and_optional_slots() {
        let usage = UsageSpec::parse("ban", "<player> <reason> [duration]");
        assert_eq!(usage.slots().len(), 3);
        assert_eq!(usage.needed_size(), 2);
        assert!(usage.is_required(0));
        assert!(usage.is_required(1));
        assert!(!usage.is_required(2));
        assert_eq!(usage.slot(2).map(UsageSlot::name), Some("duration"));
    }

    #[test]
    fn test_empty_template_has_no_slots() {
        let usage = UsageSpec::parse("fly", "");
        assert!(usage.slots().is_empty());
        assert_eq!(usage.needed_size(), 0);
    }

    #[test]
    fn test_malformed_template_degrades_to_no_slots() {
        for base in ["player reason", "<player", "<player> {reason}", "< >"] {
            let usage = UsageSpec::parse("ban", base);
            assert!(usage.slots().is_empty(), "template {base:?} should degrade");
            assert_eq!(usage.needed_size(), 0);
        }
    }

    #[test]
    fn test_needed_size_stops_at_first_optional() {
        // A required slot after an optional one is tolerated but never
        // counted; the template stays unvalidated on purpose.
        let usage = UsageSpec::parse("warp", "<world> [x] <y>");
        assert_eq!(usage.slots().len(), 3);
        assert_eq!(usage.needed_size(), 1);
    }

    #[test]
    fn test_display_includes_label() {
        let usage = UsageSpec::parse("ban", "<player>");
        assert_eq!(usage.to_string(), "ban <player>");
        assert_eq!(UsageSpec::parse("fly", "").to_string(), "fly");
    }
}
