//! TOSCA service template export.
//!
//! [`export_system`] turns one validated [`System`] into one [`ServiceTemplate`]:
//!
//! 1. node keys are issued for components, infrastructure, data aggregates,
//!    backing data and request traces (in that order), relationship keys for
//!    links and deployment mappings;
//! 2. per-kind builders in [`nodes`] and [`relationships`] produce templates,
//!    reading keys back from the [`ExportContext`];
//! 3. [`assembler::assemble`] folds them into the document.
//!
//! The context (and its key managers) lives for exactly one call.
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::errors::ExportError;
use crate::keys::derive::{self, describe_endpoint, EndpointDescriptor};
use crate::keys::{sanitize_key, KeyManager};
use crate::model::resolver::Resolver;
use crate::model::{check_mapping_ends, Endpoint, EntityId, System};

pub mod assembler;
pub mod nodes;
pub mod relationships;

pub const TOSCA_DEFINITIONS_VERSION: &str = "tosca_simple_yaml_1_3";
pub const DEFAULT_AUTHOR: &str = "archmodel-tosca";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_DESCRIPTION: &str =
    "Topology of an architecture model, exported as a TOSCA service template.";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceTemplate {
    pub tosca_definitions_version: String,
    pub metadata: TemplateMetadata,
    pub description: String,
    pub topology_template: TopologyTemplate,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TemplateMetadata {
    pub template_author: String,
    pub template_name: String,
    pub template_version: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct TopologyTemplate {
    pub node_templates: BTreeMap<String, NodeTemplate>,
    pub relationship_templates: BTreeMap<String, RelationshipTemplate>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NodeTemplate {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RelationshipTemplate {
    #[serde(rename = "type")]
    pub relationship_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
}

pub const HOST: &str = "host";
pub const ENDPOINT_LINK: &str = "endpoint_link";
pub const USES_DATA: &str = "uses_data";
pub const USES_BACKING_DATA: &str = "uses_backing_data";
pub const EXTERNAL_ENDPOINT: &str = "external_endpoint";

/// One requirement assignment, serialized as a single-entry map:
/// `{host: vm}` or `{endpoint_link: {node: orders, relationship: api_connects-to_orders}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: &'static str,
    pub node: String,
    pub relationship: Option<String>,
}

impl Requirement {
    pub fn new(name: &'static str, node: impl Into<String>) -> Self {
        Self { name, node: node.into(), relationship: None }
    }

    pub fn via(name: &'static str, node: impl Into<String>, relationship: impl Into<String>) -> Self {
        Self { name, node: node.into(), relationship: Some(relationship.into()) }
    }
}

#[derive(Serialize)]
struct RequirementAssignment<'a> {
    node: &'a str,
    relationship: &'a str,
}

impl Serialize for Requirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match &self.relationship {
            None => map.serialize_entry(self.name, &self.node)?,
            Some(rel) => map.serialize_entry(
                self.name,
                &RequirementAssignment { node: &self.node, relationship: rel },
            )?,
        }
        map.end()
    }
}

/// Envelope overrides; unset fields fall back to the crate defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub author: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
}

impl ExportOptions {
    #[must_use]
    pub fn envelope(&self, system_name: &str) -> assembler::Envelope {
        assembler::Envelope {
            metadata: TemplateMetadata {
                template_author: self.author.clone().unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
                template_name: system_name.to_string(),
                template_version: self.version.clone().unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            },
            description: self
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        }
    }
}

/// Per-export state: id indexes plus one key manager per template namespace.
pub struct ExportContext<'a> {
    pub resolver: Resolver<'a>,
    pub node_keys: KeyManager,
    pub relationship_keys: KeyManager,
}

impl<'a> ExportContext<'a> {
    /// # Errors
    /// Propagates `DuplicateId` and `SharedId` from indexing the system.
    pub fn new(system: &'a System) -> Result<Self, ExportError> {
        Ok(Self {
            resolver: Resolver::new(system)?,
            node_keys: KeyManager::new(),
            relationship_keys: KeyManager::new(),
        })
    }

    /// Issue every node and relationship key of the system, in collection order.
    ///
    /// # Errors
    /// Blank names, dangling references, self-links, invalid deployment mappings
    /// and request traces whose entry endpoint has no type.
    pub fn allocate_keys(&mut self) -> Result<(), ExportError> {
        let system = self.resolver.system();

        for c in &system.components {
            self.node_keys.issue(&c.id, &sanitize_key(&c.name)?)?;
        }
        for i in &system.infrastructures {
            self.node_keys.issue(&i.id, &sanitize_key(&i.name)?)?;
        }
        for d in &system.data_aggregates {
            self.node_keys.issue(&d.id, &sanitize_key(&d.name)?)?;
        }
        for b in &system.backing_data {
            self.node_keys.issue(&b.id, &sanitize_key(&b.name)?)?;
        }
        for t in &system.request_traces {
            let ep = self
                .resolver
                .endpoint(&t.external_endpoint)
                .ok_or_else(|| unresolved("external endpoint", &t.external_endpoint))?;
            let endpoint_type = required(ep.endpoint, "type", ep.endpoint.endpoint_type.as_deref())?;
            let candidate = derive::request_trace_key(endpoint_type, &ep.endpoint.name)?;
            self.node_keys.issue(&t.id, &candidate)?;
        }

        for l in &system.links {
            let source =
                self.resolver.component(&l.source).ok_or_else(|| unresolved("component", &l.source))?;
            let target =
                self.resolver.endpoint(&l.target).ok_or_else(|| unresolved("endpoint", &l.target))?;
            if target.owner.id == source.id {
                return Err(ExportError::ReferentialIntegrity(format!(
                    "link '{}' targets endpoint '{}' of its own source '{}'",
                    l.id, l.target, source.id
                )));
            }
            let candidate = derive::link_key(&source.name, &target.owner.name)?;
            self.relationship_keys.issue(&l.id, &candidate)?;
        }
        for m in &system.deployment_mappings {
            let deployed = self
                .resolver
                .entity(&m.deployed_entity)
                .ok_or_else(|| unresolved("entity", &m.deployed_entity))?;
            let underlying = self
                .resolver
                .entity(&m.underlying_infrastructure)
                .ok_or_else(|| unresolved("infrastructure", &m.underlying_infrastructure))?;
            check_mapping_ends(deployed, underlying)?;
            let candidate = derive::deployment_mapping_key(underlying.name(), deployed.name())?;
            self.relationship_keys.issue(&m.id, &candidate)?;
        }
        Ok(())
    }

    /// Node key issued for `entity`.
    ///
    /// # Errors
    /// `UnresolvedReference` when no node key was issued for it.
    pub fn node_key(&self, entity: &EntityId) -> Result<&str, ExportError> {
        self.node_keys.key_for(entity).ok_or_else(|| unresolved("node", entity))
    }

    /// Relationship key issued for `entity`.
    ///
    /// # Errors
    /// `UnresolvedReference` when no relationship key was issued for it.
    pub fn relationship_key(&self, entity: &EntityId) -> Result<&str, ExportError> {
        self.relationship_keys.key_for(entity).ok_or_else(|| unresolved("relationship", entity))
    }

    /// Entity a node key was issued for.
    #[must_use]
    pub fn node_entity(&self, key: &str) -> Option<&EntityId> {
        self.node_keys.entity_for(key)
    }

    /// Entity a relationship key was issued for.
    #[must_use]
    pub fn relationship_entity(&self, key: &str) -> Option<&EntityId> {
        self.relationship_keys.entity_for(key)
    }
}

pub(crate) fn unresolved(kind: &'static str, reference: &EntityId) -> ExportError {
    ExportError::UnresolvedReference { kind, reference: reference.0.clone() }
}

fn required<'e>(
    endpoint: &Endpoint,
    property: &'static str,
    value: Option<&'e str>,
) -> Result<&'e str, ExportError> {
    value.ok_or_else(|| ExportError::MissingProperty { entity: endpoint.name.clone(), property })
}

/// An endpoint whose type, path and port are all present.
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint<'a> {
    pub endpoint: &'a Endpoint,
    pub endpoint_type: &'a str,
    pub path: &'a str,
    pub port: u16,
    pub descriptor: EndpointDescriptor,
}

impl<'a> ResolvedEndpoint<'a> {
    /// # Errors
    /// `MissingProperty` naming the first absent property.
    pub fn resolve(endpoint: &'a Endpoint) -> Result<Self, ExportError> {
        let endpoint_type = required(endpoint, "type", endpoint.endpoint_type.as_deref())?;
        let path = required(endpoint, "path", endpoint.path.as_deref())?;
        let port = endpoint
            .port
            .ok_or_else(|| ExportError::MissingProperty { entity: endpoint.name.clone(), property: "port" })?;
        let descriptor = describe_endpoint(endpoint_type, path);
        Ok(Self { endpoint, endpoint_type, path, port, descriptor })
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut v = json!({
            "name": self.descriptor.descriptor,
            "protocol": self.descriptor.protocol.as_str(),
            "port": self.port,
            "url_path": self.path,
            "endpoint_type": self.endpoint_type,
        });
        if let (Some(visual), Value::Object(map)) = (self.endpoint.visual, &mut v) {
            map.insert(
                "visual".to_string(),
                json!({ "x": visual.x, "y": visual.y, "width": visual.width, "height": visual.height }),
            );
        }
        v
    }
}

/// Export `system` as a service template.
///
/// # Errors
/// Any `ExportError`; no partial document is produced.
pub fn export_system(system: &System, options: &ExportOptions) -> Result<ServiceTemplate, ExportError> {
    let mut ctx = ExportContext::new(system)?;
    ctx.allocate_keys()?;
    tracing::debug!(
        system = %system.name,
        node_keys = ctx.node_keys.len(),
        relationship_keys = ctx.relationship_keys.len(),
        "keys allocated"
    );

    let node_templates = nodes::build_all(&ctx)?;
    let relationship_templates = relationships::build_all(&ctx)?;
    let template = assembler::assemble(
        options.envelope(&system.name),
        node_templates,
        relationship_templates,
    )?;
    tracing::info!(
        system = %system.name,
        nodes = template.topology_template.node_templates.len(),
        relationships = template.topology_template.relationship_templates.len(),
        "service template assembled"
    );
    Ok(template)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Yaml,
    Json,
}

impl DocumentFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Yaml => "yaml",
            DocumentFormat::Json => "json",
        }
    }
}

/// Render a service template as YAML or pretty JSON.
///
/// # Errors
/// `ExportError::Encode` if the encoder fails.
pub fn encode(template: &ServiceTemplate, format: DocumentFormat) -> Result<String, ExportError> {
    match format {
        DocumentFormat::Yaml => {
            serde_yaml::to_string(template).map_err(|e| ExportError::Encode(e.to_string()))
        }
        DocumentFormat::Json => {
            serde_json::to_string_pretty(template).map_err(|e| ExportError::Encode(e.to_string()))
        }
    }
}
