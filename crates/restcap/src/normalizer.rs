//! Conversions between wire JSON and the definition/resource models.
//!
//! Definitions travel in the shape returned by a capability OPTIONS call:
//!
//! ```json
//! {
//!   "url": "/image", "identity": "uuid",
//!   "properties": {"uuid": {"type": "string", "access": ["READ"], "variants": [], "optional": false}},
//!   "metas": {},
//!   "linkable_to": [{"relationship": "alternate", "resource_path": "image", "parameters": []}],
//!   "rangeable": true
//! }
//! ```
//!
//! Resources travel as `{"resource": {"<canonical name>": <wire value>, ...}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::definition::{Access, AllowedLink, HttpResourceDefinition, Property};
use crate::registry::TypeRegistry;
use crate::resource::{HttpResource, ResourceProperty};
use crate::{Error, Result};

/// Wire shape of a resource definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDefinition {
    pub url: String,
    pub identity: String,
    pub properties: BTreeMap<String, RawProperty>,
    #[serde(default)]
    pub metas: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub linkable_to: Vec<RawAllowedLink>,
    #[serde(default)]
    pub rangeable: bool,
}

/// Wire shape of one definition property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProperty {
    #[serde(rename = "type")]
    pub ty: String,
    pub access: Vec<String>,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub optional: bool,
}

/// Wire shape of an allowed link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAllowedLink {
    pub relationship: String,
    pub resource_path: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// Build a definition named `name` from its wire JSON.
///
/// Fails if a property type descriptor is unknown or a structural field is
/// missing.
pub fn denormalize_definition(
    raw: serde_json::Value,
    name: &str,
    registry: &TypeRegistry,
) -> Result<HttpResourceDefinition> {
    let raw: RawDefinition = serde_json::from_value(raw)?;

    let mut definition = HttpResourceDefinition::new(name, raw.url, raw.identity)?
        .with_rangeable(raw.rangeable);

    for (property_name, property) in raw.properties {
        let ty = registry.build(&property.ty)?;
        let access = Access::from_codes(&property.access)?;
        definition = definition.with_property(
            Property::new(property_name, ty, access)?
                .with_variants(property.variants)
                .with_optional(property.optional),
        );
    }

    for (key, value) in raw.metas {
        definition = definition.with_meta(key, value);
    }

    for link in raw.linkable_to {
        definition = definition.with_link(AllowedLink::new(
            link.relationship,
            link.resource_path,
            link.parameters,
        )?);
    }

    Ok(definition)
}

/// Render a definition back to the wire JSON accepted by [`denormalize_definition`].
pub fn normalize_definition(definition: &HttpResourceDefinition) -> serde_json::Value {
    let raw = RawDefinition {
        url: definition.url().to_string(),
        identity: definition.identity().to_string(),
        properties: definition
            .properties()
            .values()
            .map(|property| {
                (
                    property.name().to_string(),
                    RawProperty {
                        ty: property.ty().to_string(),
                        access: property
                            .access()
                            .codes()
                            .into_iter()
                            .map(String::from)
                            .collect(),
                        variants: property.variants().iter().cloned().collect(),
                        optional: property.is_optional(),
                    },
                )
            })
            .collect(),
        metas: definition.metas().clone(),
        linkable_to: definition
            .links()
            .iter()
            .map(|link| RawAllowedLink {
                relationship: link.relationship().to_string(),
                resource_path: link.resource_path().to_string(),
                parameters: link.parameters().iter().cloned().collect(),
            })
            .collect(),
        rangeable: definition.is_rangeable(),
    };

    serde_json::json!(raw)
}

/// Build a resource from a server payload, keeping the properties whose
/// access covers `access`.
pub fn denormalize_resource(
    raw: &serde_json::Value,
    definition: &HttpResourceDefinition,
    access: Access,
) -> Result<HttpResource> {
    let Some(payload) = raw.get("resource").and_then(serde_json::Value::as_object) else {
        return Err(Error::denormalization(
            definition.name(),
            "payload has no \"resource\" object",
        ));
    };

    let mut properties = Vec::new();
    for property in definition.properties().values() {
        if !property.access().matches(&access) {
            continue;
        }

        // null on an optional property means absent
        let wire = payload
            .get(property.name())
            .filter(|wire| !(wire.is_null() && !property.is_required()));
        match wire {
            Some(wire) => {
                let value = property.ty().denormalize(wire)?;
                properties.push(ResourceProperty::new(property.name(), value)?);
            }
            None if property.is_required() => {
                return Err(Error::MissingProperty(property.name().to_string()));
            }
            None => trace!(property = property.name(), "optional property absent"),
        }
    }

    HttpResource::of(definition.name(), properties)
}

/// Render a resource as a request payload, keyed by canonical property names.
pub fn normalize_resource(
    resource: &HttpResource,
    definition: &HttpResourceDefinition,
    access: Access,
) -> Result<serde_json::Value> {
    let mut payload = serde_json::Map::new();

    for property in definition.properties().values() {
        if !property.access().matches(&access) {
            continue;
        }

        match resource.lookup(property) {
            Some(value) => {
                payload.insert(property.name().to_string(), property.ty().normalize(value)?);
            }
            None if property.is_required() => {
                return Err(Error::MissingProperty(property.name().to_string()));
            }
            None => trace!(property = property.name(), "optional property skipped"),
        }
    }

    Ok(serde_json::json!({ "resource": payload }))
}
