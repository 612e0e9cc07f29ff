// src/core/types.rs

use crate::errors::RegistryError;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

type BoxedValue = Box<dyn Any + Send + Sync>;
type Parser = Box<dyn Fn(&str) -> Option<BoxedValue> + Send + Sync>;

/// Maps a target type to the function that parses an argument string into
/// it. Shipped with parsers for `bool`, `i64` and `f64`; hosts extend it
/// with their own types (players, durations, ...).
pub struct TypeRegistry {
    parsers: RwLock<HashMap<TypeId, Parser>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            parsers: RwLock::new(HashMap::new()),
        }
    }

    /// A registry pre-filled with the default boolean/integer/double parsers.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.insert::<bool>(Box::new(|raw| {
            Some(Box::new(raw.eq_ignore_ascii_case("true")))
        }));
        registry.insert::<i64>(Box::new(|raw| {
            raw.parse::<i64>().ok().map(|v| Box::new(v) as BoxedValue)
        }));
        registry.insert::<f64>(Box::new(|raw| {
            raw.parse::<f64>().ok().map(|v| Box::new(v) as BoxedValue)
        }));
        registry
    }

    fn insert<T: Any>(&self, parser: Parser) {
        self.parsers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), parser);
    }

    /// Registers a parser for `T`. Registering the same target type twice
    /// is a programmer error.
    pub fn register<T, F>(&self, parse: F) -> Result<(), RegistryError>
    where
        T: Any + Send + Sync,
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        let mut parsers = self
            .parsers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if parsers.contains_key(&TypeId::of::<T>()) {
            return Err(RegistryError::DuplicateParameterType(type_name::<T>()));
        }
        parsers.insert(
            TypeId::of::<T>(),
            Box::new(move |raw| parse(raw).map(|v| Box::new(v) as BoxedValue)),
        );
        Ok(())
    }

    pub fn is_registered<T: Any>(&self) -> bool {
        self.parsers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<T>())
    }

    /// Parses `raw` into `T`. `None` if no parser is registered for `T` or
    /// the parser rejects the string.
    pub fn parse<T: Any>(&self, raw: &str) -> Option<T> {
        let parsers = self.parsers.read().unwrap_or_else(PoisonError::into_inner);
        let parsed = parsers.get(&TypeId::of::<T>())?(raw)?;
        parsed.downcast::<T>().ok().map(|boxed| *boxed)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .parsers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("TypeRegistry")
            .field("registered", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parsers() {
        let types = TypeRegistry::with_defaults();
        assert_eq!(types.parse::<i64>("42"), Some(42));
        assert_eq!(types.parse::<i64>("fourtytwo"), None);
        assert_eq!(types.parse::<f64>("3.5"), Some(3.5));
        assert_eq!(types.parse::<bool>("TRUE"), Some(true));
        // The boolean parser mirrors the lenient semantics of the defaults:
        // anything that is not "true" is false, never a parse failure.
        assert_eq!(types.parse::<bool>("nope"), Some(false));
    }

    #[test]
    fn test_unregistered_type_yields_none() {
        let types = TypeRegistry::with_defaults();
        assert_eq!(types.parse::<u16>("7"), None);
        assert!(!types.is_registered::<u16>());
    }

    #[test]
    fn test_custom_type_registration() {
        #[derive(Debug, PartialEq)]
        struct Duration(u64);

        let types = TypeRegistry::with_defaults();
        types
            .register::<Duration, _>(|raw| {
                raw.strip_suffix('d').and_then(|days| days.parse().ok()).map(Duration)
            })
            .expect("first registration");

        assert_eq!(types.parse::<Duration>("14d"), Some(Duration(14)));
        assert_eq!(types.parse::<Duration>("14h"), None);
    }

    #[test]
    fn test_duplicate_registration_is_an_error() {
        let types = TypeRegistry::with_defaults();
        let result = types.register::<i64, _>(|raw| raw.parse().ok());
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateParameterType(_))
        ));
    }
}
