//! Built-in type catalog.
//!
//! Read-only registry of the node types the exporter emits, with the property
//! definitions and defaults each type declares. Defaults are inherited along
//! `derived_from`. Relationship types carry no properties and are only named.
use serde_json::Value;
use std::collections::BTreeMap;

pub const COMPONENT: &str = "cna.qualityModel.entities.Root.Component";
pub const SERVICE: &str = "cna.qualityModel.entities.Root.Component.Service";
pub const BACKING_SERVICE: &str = "cna.qualityModel.entities.Root.Component.BackingService";
pub const STORAGE_BACKING_SERVICE: &str =
    "cna.qualityModel.entities.Root.Component.BackingService.StorageBackingService";
pub const COMPUTE: &str = "cna.qualityModel.entities.Compute.Infrastructure";
pub const DBMS: &str = "cna.qualityModel.entities.DBMS";
pub const DATA_AGGREGATE: &str = "cna.qualityModel.entities.DataAggregate";
pub const BACKING_DATA: &str = "cna.qualityModel.entities.BackingData";
pub const REQUEST_TRACE: &str = "cna.qualityModel.entities.RequestTrace";

pub const CONNECTS_TO_LINK: &str = "cna.qualityModel.relationships.ConnectsTo.Link";
pub const HOSTED_ON: &str = "cna.qualityModel.relationships.HostedOn";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Int(i64),
    Text(&'static str),
    Bool(bool),
}

impl DefaultValue {
    #[must_use]
    pub fn to_value(self) -> Value {
        match self {
            DefaultValue::Int(i) => Value::from(i),
            DefaultValue::Text(s) => Value::from(s),
            DefaultValue::Bool(b) => Value::from(b),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PropertyDefinition {
    pub name: &'static str,
    pub default: Option<DefaultValue>,
}

#[derive(Debug)]
pub struct NodeTypeDefinition {
    pub name: &'static str,
    pub derived_from: Option<&'static str>,
    pub properties: &'static [PropertyDefinition],
}

const fn prop(name: &'static str, default: Option<DefaultValue>) -> PropertyDefinition {
    PropertyDefinition { name, default }
}

static NODE_TYPES: &[NodeTypeDefinition] = &[
    NodeTypeDefinition {
        name: COMPONENT,
        derived_from: None,
        properties: &[
            prop("endpoints", None),
            prop("external_endpoints", None),
            prop("persisted_data", None),
        ],
    },
    NodeTypeDefinition {
        name: SERVICE,
        derived_from: Some(COMPONENT),
        properties: &[],
    },
    NodeTypeDefinition {
        name: BACKING_SERVICE,
        derived_from: Some(COMPONENT),
        properties: &[],
    },
    NodeTypeDefinition {
        name: STORAGE_BACKING_SERVICE,
        derived_from: Some(BACKING_SERVICE),
        properties: &[
            prop("replicas", Some(DefaultValue::Int(1))),
            prop("shards", Some(DefaultValue::Int(1))),
        ],
    },
    NodeTypeDefinition {
        name: COMPUTE,
        derived_from: None,
        properties: &[],
    },
    NodeTypeDefinition {
        name: DBMS,
        derived_from: Some(COMPUTE),
        properties: &[],
    },
    NodeTypeDefinition {
        name: DATA_AGGREGATE,
        derived_from: None,
        properties: &[prop("persisted_by", None)],
    },
    NodeTypeDefinition {
        name: BACKING_DATA,
        derived_from: None,
        properties: &[prop("includedData", None)],
    },
    NodeTypeDefinition {
        name: REQUEST_TRACE,
        derived_from: None,
        properties: &[prop("external_endpoint", None), prop("links", None)],
    },
];

#[must_use]
pub fn node_type(name: &str) -> Option<&'static NodeTypeDefinition> {
    NODE_TYPES.iter().find(|t| t.name == name)
}

/// Defaults declared by `type_name` and its ancestors; nearer types win.
#[must_use]
pub fn default_properties(type_name: &str) -> BTreeMap<String, Value> {
    let mut chain = Vec::new();
    let mut cur = node_type(type_name);
    while let Some(t) = cur {
        // walk is bounded by the catalog size
        if chain.len() > NODE_TYPES.len() {
            break;
        }
        chain.push(t);
        cur = t.derived_from.and_then(node_type);
    }
    let mut out = BTreeMap::new();
    for t in chain.iter().rev() {
        for p in t.properties {
            if let Some(d) = p.default {
                out.insert(p.name.to_string(), d.to_value());
            }
        }
    }
    out
}
