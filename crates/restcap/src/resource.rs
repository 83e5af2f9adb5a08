//! Resource instances exchanged with a server.

use std::collections::BTreeMap;

use crate::definition::Property;
use crate::{Error, PropertyValue, Result};

/// A named value carried by a resource instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceProperty {
    name: String,
    value: PropertyValue,
}

impl ResourceProperty {
    pub fn new(name: impl Into<String>, value: impl Into<PropertyValue>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Domain("property name must not be empty".to_string()));
        }
        Ok(Self {
            name,
            value: value.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }
}

/// A resource instance: the definition name plus its property values.
///
/// Instances are not mutated once built; [`with`](Self::with) returns a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResource {
    name: String,
    properties: BTreeMap<String, ResourceProperty>,
}

impl HttpResource {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Domain("resource name must not be empty".to_string()));
        }
        Ok(Self {
            name,
            properties: BTreeMap::new(),
        })
    }

    /// Build a resource from a list of properties; later duplicates win.
    pub fn of(
        name: impl Into<String>,
        properties: impl IntoIterator<Item = ResourceProperty>,
    ) -> Result<Self> {
        let mut resource = Self::new(name)?;
        for property in properties {
            resource
                .properties
                .insert(property.name().to_string(), property);
        }
        Ok(resource)
    }

    /// Copy of this resource with `property` added or replaced.
    pub fn with(&self, property: ResourceProperty) -> Self {
        let mut copy = self.clone();
        copy.properties.insert(property.name().to_string(), property);
        copy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> impl Iterator<Item = &ResourceProperty> {
        self.properties.values()
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name).map(ResourceProperty::value)
    }

    /// Value of a definition property, looked up by its canonical name first
    /// and then by each of its variants.
    pub fn lookup(&self, property: &Property) -> Option<&PropertyValue> {
        self.get(property.name()).or_else(|| {
            property
                .variants()
                .iter()
                .find_map(|variant| self.get(variant))
        })
    }

    /// Render the properties as an untyped JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.properties
                .values()
                .map(|p| (p.name.clone(), p.value.to_json()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Access;
    use crate::types::StringType;
    use std::sync::Arc;

    fn property(name: &str, value: &str) -> ResourceProperty {
        ResourceProperty::new(name, value).unwrap()
    }

    #[test]
    fn test_with_is_copy_on_write() {
        let original = HttpResource::of("foo", [property("url", "a")]).unwrap();
        let updated = original.with(property("url", "b"));

        assert_eq!(original.get("url"), Some(&PropertyValue::from("a")));
        assert_eq!(updated.get("url"), Some(&PropertyValue::from("b")));
    }

    #[test]
    fn test_lookup_accepts_variants() {
        let definition_property = Property::new("url", Arc::new(StringType), Access::READ)
            .unwrap()
            .with_variants(["uri"]);

        let canonical = HttpResource::of("foo", [property("url", "a"), property("uri", "b")]).unwrap();
        assert_eq!(canonical.lookup(&definition_property), Some(&PropertyValue::from("a")));

        let variant = HttpResource::of("foo", [property("uri", "b")]).unwrap();
        assert_eq!(variant.lookup(&definition_property), Some(&PropertyValue::from("b")));

        let neither = HttpResource::new("foo").unwrap();
        assert_eq!(neither.lookup(&definition_property), None);
    }

    #[test]
    fn test_empty_names_rejected() {
        assert!(HttpResource::new("").is_err());
        assert!(ResourceProperty::new("", "x").is_err());
    }

    #[test]
    fn test_to_json() {
        let resource = HttpResource::of("foo", [property("url", "x")]).unwrap();
        assert_eq!(resource.to_json(), serde_json::json!({"url": "x"}));
    }
}
