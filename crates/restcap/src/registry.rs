//! Ordered registry of property type converters.
//!
//! `build` asks each registered converter, in registration order, to
//! recognize a descriptor; the first one that succeeds wins. Composite types
//! re-enter the same registry for their inner descriptors, so a converter
//! registered early with a loose pattern shadows every later one, at any
//! nesting level. Register specific patterns before general ones.

use std::any::type_name;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::trace;

use crate::types::{
    BoolType, DateType, FloatType, IntType, MapType, SetType, StringType, TypeDescriptor, TypeRef,
};
use crate::{Error, Result};

type Builder = fn(&str, &TypeRegistry) -> Option<Result<TypeRef>>;

fn build_as<T: TypeDescriptor>(descriptor: &str, registry: &TypeRegistry) -> Option<Result<TypeRef>> {
    T::from_descriptor(descriptor, registry).map(|built| built.map(|ty| Arc::new(ty) as TypeRef))
}

/// Registry mapping descriptor strings to property types.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    converters: Vec<(&'static str, Builder)>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in converters: bool, date, float, int, map, set, string.
    ///
    /// The set is assembled once per process and cloned from there.
    pub fn defaults() -> Self {
        static DEFAULTS: OnceLock<TypeRegistry> = OnceLock::new();
        DEFAULTS
            .get_or_init(|| {
                let mut registry = TypeRegistry::new();
                registry
                    .register::<BoolType>()
                    .register::<DateType>()
                    .register::<FloatType>()
                    .register::<IntType>()
                    .register::<MapType>()
                    .register::<SetType>()
                    .register::<StringType>();
                registry
            })
            .clone()
    }

    /// Append a converter to the match list.
    pub fn register<T: TypeDescriptor>(&mut self) -> &mut Self {
        let builder: Builder = build_as::<T>;
        self.converters.push((type_name::<T>(), builder));
        self
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with<T: TypeDescriptor>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Names of the registered converters, in match order.
    pub fn converters(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.converters.iter().map(|(name, _)| *name)
    }

    /// Build the type described by `descriptor`.
    ///
    /// A converter that recognizes the descriptor but fails (for instance a
    /// `set<...>` whose inner type is unknown) does not stop the search; its
    /// error is reported only if no later converter succeeds.
    pub fn build(&self, descriptor: &str) -> Result<TypeRef> {
        let descriptor = descriptor.trim();
        let mut first_failure = None;

        for (name, builder) in &self.converters {
            match builder(descriptor, self) {
                Some(Ok(ty)) => {
                    trace!(descriptor, converter = name, "built property type");
                    return Ok(ty);
                }
                Some(Err(e)) => {
                    first_failure.get_or_insert(e);
                }
                None => {}
            }
        }

        Err(first_failure.unwrap_or_else(|| Error::UnknownType(descriptor.to_string())))
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.converters()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyValue;
    use crate::types::PropertyType;
    use serde_json::json;

    /// Accepts any descriptor, to demonstrate shadowing.
    #[derive(Debug)]
    struct Anything;

    impl fmt::Display for Anything {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("anything")
        }
    }

    impl PropertyType for Anything {
        fn normalize(&self, value: &PropertyValue) -> Result<serde_json::Value> {
            Ok(value.to_json())
        }

        fn denormalize(&self, value: &serde_json::Value) -> Result<PropertyValue> {
            Ok(PropertyValue::from(value.clone()))
        }
    }

    impl TypeDescriptor for Anything {
        fn from_descriptor(_: &str, _: &TypeRegistry) -> Option<Result<Self>> {
            Some(Ok(Self))
        }
    }

    #[test]
    fn test_defaults_order() {
        let registry = TypeRegistry::defaults();
        let names: Vec<_> = registry
            .converters()
            .map(|n| n.rsplit("::").next().unwrap_or(n))
            .collect();
        assert_eq!(
            names,
            vec!["BoolType", "DateType", "FloatType", "IntType", "MapType", "SetType", "StringType"]
        );
    }

    #[test]
    fn test_build_round_trips_descriptors() {
        let registry = TypeRegistry::defaults();
        for descriptor in [
            "string",
            "int",
            "float",
            "bool",
            "date<Y-m-d>",
            "set<int>",
            "set<set<string>>",
            "map<string, date<c>>",
            "map<int, map<string, bool>>",
        ] {
            let ty = registry.build(descriptor).unwrap();
            assert_eq!(ty.to_string(), descriptor);
        }
    }

    #[test]
    fn test_unknown_type() {
        let registry = TypeRegistry::defaults();
        assert!(matches!(registry.build("uuid"), Err(Error::UnknownType(d)) if d == "uuid"));
        assert!(matches!(registry.build("set<uuid>"), Err(Error::UnknownType(d)) if d == "uuid"));
        assert!(matches!(registry.build("map<string>"), Err(Error::UnknownType(_))));
        assert!(matches!(TypeRegistry::new().build("int"), Err(Error::UnknownType(_))));
    }

    #[test]
    fn test_registration_order_matters() {
        let shadowed = TypeRegistry::new().with::<Anything>().with::<IntType>();
        assert_eq!(shadowed.build("int").unwrap().to_string(), "anything");

        let specific = TypeRegistry::new().with::<IntType>().with::<Anything>();
        assert_eq!(specific.build("int").unwrap().to_string(), "int");
    }

    #[test]
    fn test_composites_reenter_registry() {
        let registry = TypeRegistry::new().with::<SetType>().with::<Anything>();
        let ty = registry.build("set<whatever>").unwrap();
        assert_eq!(ty.to_string(), "set<anything>");
        assert_eq!(
            ty.denormalize(&json!([1, 1])).unwrap(),
            PropertyValue::Set(vec![PropertyValue::Int(1)])
        );
    }
}
