//! Resource definitions as discovered from the server.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::BitOr;

use crate::types::TypeRef;
use crate::{Error, Result};

/// Opaque key of one resource instance within its collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::Domain("identity must not be empty".to_string()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Set of operations a property takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Access(u8);

impl Access {
    pub const READ: Access = Access(0b001);
    pub const CREATE: Access = Access(0b010);
    pub const UPDATE: Access = Access(0b100);

    const CODES: [(&'static str, Access); 3] = [
        ("READ", Access::READ),
        ("CREATE", Access::CREATE),
        ("UPDATE", Access::UPDATE),
    ];

    pub fn empty() -> Self {
        Self(0)
    }

    /// Build an access mask from wire codes (`READ`, `CREATE`, `UPDATE`).
    pub fn from_codes<I, S>(codes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes.into_iter().try_fold(Self::empty(), |acc, code| {
            let code = code.as_ref();
            Self::CODES
                .iter()
                .find(|(name, _)| *name == code)
                .map(|(_, access)| acc | *access)
                .ok_or_else(|| Error::Domain(format!("unknown access code: {code}")))
        })
    }

    /// Wire codes of the operations in this mask.
    pub fn codes(&self) -> Vec<&'static str> {
        Self::CODES
            .iter()
            .filter(|(_, access)| self.contains(*access))
            .map(|(name, _)| *name)
            .collect()
    }

    fn contains(&self, other: Access) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when every operation in `other` is also in `self`.
    pub fn matches(&self, other: &Access) -> bool {
        self.contains(*other)
    }
}

impl BitOr for Access {
    type Output = Access;

    fn bitor(self, rhs: Access) -> Access {
        Access(self.0 | rhs.0)
    }
}

/// One property of a resource definition.
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    ty: TypeRef,
    access: Access,
    variants: BTreeSet<String>,
    optional: bool,
}

// Types compare by descriptor.
impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.ty.to_string() == other.ty.to_string()
            && self.access == other.access
            && self.variants == other.variants
            && self.optional == other.optional
    }
}

impl Property {
    pub fn new(name: impl Into<String>, ty: TypeRef, access: Access) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Domain("property name must not be empty".to_string()));
        }
        Ok(Self {
            name,
            ty,
            access,
            variants: BTreeSet::new(),
            optional: false,
        })
    }

    /// Add alternate names accepted for this property.
    pub fn with_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants.extend(variants.into_iter().map(Into::into));
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn variants(&self) -> &BTreeSet<String> {
        &self.variants
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_required(&self) -> bool {
        !self.optional
    }
}

/// A relationship a resource may carry towards another resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AllowedLink {
    relationship: String,
    resource_path: String,
    parameters: BTreeSet<String>,
}

impl AllowedLink {
    pub fn new(
        relationship: impl Into<String>,
        resource_path: impl Into<String>,
        parameters: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self> {
        let relationship = relationship.into();
        let resource_path = resource_path.into();
        if relationship.is_empty() || resource_path.is_empty() {
            return Err(Error::Domain(
                "allowed link needs a relationship and a resource path".to_string(),
            ));
        }
        Ok(Self {
            relationship,
            resource_path,
            parameters: parameters.into_iter().map(Into::into).collect(),
        })
    }

    pub fn relationship(&self) -> &str {
        &self.relationship
    }

    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    pub fn parameters(&self) -> &BTreeSet<String> {
        &self.parameters
    }

    /// Same target resource, same relationship and every required parameter present.
    pub fn allows(&self, link: &Link) -> bool {
        link.definition() == self.resource_path
            && link.relationship() == self.relationship
            && self
                .parameters
                .iter()
                .all(|key| link.parameters().contains_key(key))
    }
}

/// A concrete relationship from one resource to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    definition: String,
    identity: Identity,
    relationship: String,
    parameters: BTreeMap<String, String>,
}

impl Link {
    pub fn new(
        definition: impl Into<String>,
        identity: Identity,
        relationship: impl Into<String>,
    ) -> Result<Self> {
        let definition = definition.into();
        let relationship = relationship.into();
        if definition.is_empty() || relationship.is_empty() {
            return Err(Error::Domain(
                "link needs a target definition and a relationship".to_string(),
            ));
        }
        Ok(Self {
            definition,
            identity,
            relationship,
            parameters: BTreeMap::new(),
        })
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Name of the target resource definition.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn relationship(&self) -> &str {
        &self.relationship
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }
}

/// Schema of one resource type exposed by a server.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResourceDefinition {
    name: String,
    url: String,
    identity: String,
    properties: BTreeMap<String, Property>,
    metas: BTreeMap<String, serde_json::Value>,
    links: BTreeSet<AllowedLink>,
    rangeable: bool,
}

impl HttpResourceDefinition {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        identity: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Domain("definition name must not be empty".to_string()));
        }
        Ok(Self {
            name,
            url: url.into(),
            identity: identity.into(),
            properties: BTreeMap::new(),
            metas: BTreeMap::new(),
            links: BTreeSet::new(),
            rangeable: false,
        })
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.insert(property.name().to_string(), property);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metas.insert(key.into(), value);
        self
    }

    pub fn with_link(mut self, link: AllowedLink) -> Self {
        self.links.insert(link);
        self
    }

    pub fn with_rangeable(mut self, rangeable: bool) -> Self {
        self.rangeable = rangeable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Name of the property holding the identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn properties(&self) -> &BTreeMap<String, Property> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn metas(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metas
    }

    pub fn meta(&self, key: &str) -> Option<&serde_json::Value> {
        self.metas.get(key)
    }

    pub fn has_meta(&self, key: &str) -> bool {
        self.metas.contains_key(key)
    }

    pub fn links(&self) -> &BTreeSet<AllowedLink> {
        &self.links
    }

    pub fn is_rangeable(&self) -> bool {
        self.rangeable
    }

    pub fn allows(&self, link: &Link) -> bool {
        self.links.iter().any(|allowed| allowed.allows(link))
    }
}
