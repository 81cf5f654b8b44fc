//! Architecture entity model.
//!
//! This module defines the input graph of the exporter: a [`System`] owning
//! components, infrastructure, data aggregates, backing data, links,
//! deployment mappings and request traces. Relations between entities are
//! expressed by [`EntityId`] and resolved through [`resolver::Resolver`].
//!
//! Systems are usually loaded with [`System::load`], which always validates
//! the graph before returning it.
use crate::errors::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub mod resolver;

use resolver::Resolver;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position and size of an endpoint on the diagram canvas. Passed through untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Visual {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An endpoint or external endpoint exposed by a component.
///
/// `endpoint_type`, `path` and `port` are required for export but optional in the
/// model, so that their absence is reported by the exporter instead of being defaulted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    pub id: EntityId,
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<Visual>,
}

impl Endpoint {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        endpoint_type: impl Into<String>,
        path: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: EntityId::new(id),
            name: name.into(),
            endpoint_type: Some(endpoint_type.into()),
            path: Some(path.into()),
            port: Some(port),
            visual: None,
        }
    }

    #[must_use]
    pub fn with_visual(mut self, visual: Visual) -> Self {
        self.visual = Some(visual);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind")]
pub enum ComponentKind {
    #[default]
    Component,
    Service,
    BackingService,
    StorageBackingService {
        #[serde(default)]
        properties: BTreeMap<String, serde_json::Value>,
    },
}

impl ComponentKind {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::Component => "Component",
            ComponentKind::Service => "Service",
            ComponentKind::BackingService => "BackingService",
            ComponentKind::StorageBackingService { .. } => "StorageBackingService",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Component {
    pub id: EntityId,
    pub name: String,
    #[serde(flatten)]
    pub kind: ComponentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<EntityId>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub external_endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub data_aggregates: Vec<EntityId>,
    #[serde(default)]
    pub backing_data: Vec<EntityId>,
}

impl Component {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id: EntityId::new(id),
            name: name.into(),
            kind,
            host: None,
            endpoints: Vec::new(),
            external_endpoints: Vec::new(),
            data_aggregates: Vec::new(),
            backing_data: Vec::new(),
        }
    }

    #[must_use]
    pub fn hosted_on(mut self, infrastructure: &EntityId) -> Self {
        self.host = Some(infrastructure.clone());
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    #[must_use]
    pub fn with_external_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.external_endpoints.push(endpoint);
        self
    }

    #[must_use]
    pub fn uses_data(mut self, aggregate: &EntityId) -> Self {
        self.data_aggregates.push(aggregate.clone());
        self
    }

    #[must_use]
    pub fn uses_backing_data(mut self, backing: &EntityId) -> Self {
        self.backing_data.push(backing.clone());
        self
    }

    /// True when `endpoint` is one of this component's endpoints or external endpoints.
    #[must_use]
    pub fn owns_endpoint(&self, endpoint: &EntityId) -> bool {
        self.endpoints.iter().chain(&self.external_endpoints).any(|e| &e.id == endpoint)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InfrastructureKind {
    Compute,
    #[serde(rename = "DBMS")]
    Dbms,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Infrastructure {
    pub id: EntityId,
    pub name: String,
    pub kind: InfrastructureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<EntityId>,
    #[serde(default)]
    pub backing_data: Vec<EntityId>,
}

impl Infrastructure {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: InfrastructureKind) -> Self {
        Self { id: EntityId::new(id), name: name.into(), kind, host: None, backing_data: Vec::new() }
    }

    #[must_use]
    pub fn hosted_on(mut self, infrastructure: &EntityId) -> Self {
        self.host = Some(infrastructure.clone());
        self
    }

    #[must_use]
    pub fn uses_backing_data(mut self, backing: &EntityId) -> Self {
        self.backing_data.push(backing.clone());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataAggregate {
    pub id: EntityId,
    pub name: String,
    /// Names of the storage entities (storage backing services, DBMS) persisting this aggregate.
    #[serde(default)]
    pub persisted_by: Vec<String>,
}

impl DataAggregate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: EntityId::new(id), name: name.into(), persisted_by: Vec::new() }
    }

    #[must_use]
    pub fn persisted_by(mut self, storage_name: impl Into<String>) -> Self {
        self.persisted_by.push(storage_name.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataItem {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackingData {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub included_data: Vec<DataItem>,
}

impl BackingData {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: EntityId::new(id), name: name.into(), included_data: Vec::new() }
    }

    #[must_use]
    pub fn with_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.included_data.push(DataItem { key: key.into(), value: value.into() });
        self
    }
}

/// Directed edge from a component to an endpoint of another entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub id: EntityId,
    pub source: EntityId,
    pub target: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
}

impl Link {
    /// Link `source` to `target`.
    ///
    /// # Errors
    /// Returns `ModelError::ReferentialIntegrity` when `target` is an endpoint of `source` itself.
    pub fn new(
        id: impl Into<String>,
        source: &Component,
        target: &Endpoint,
        relation_type: Option<&str>,
    ) -> Result<Self, ModelError> {
        if source.owns_endpoint(&target.id) {
            return Err(ModelError::ReferentialIntegrity(format!(
                "link source '{}' owns its target endpoint '{}'",
                source.id, target.id
            )));
        }
        Ok(Self {
            id: EntityId::new(id),
            source: source.id.clone(),
            target: target.id.clone(),
            relation_type: relation_type.map(str::to_string),
        })
    }
}

/// "`deployed_entity` is hosted on `underlying_infrastructure`".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentMapping {
    pub id: EntityId,
    pub deployed_entity: EntityId,
    pub underlying_infrastructure: EntityId,
}

impl DeploymentMapping {
    /// # Errors
    /// Returns `ModelError::TypeMismatch` when `deployed` is neither a component nor an
    /// infrastructure, and `ModelError::ReferentialIntegrity` when both ends are the same entity.
    pub fn new(
        id: impl Into<String>,
        deployed: EntityRef<'_>,
        underlying: &Infrastructure,
    ) -> Result<Self, ModelError> {
        check_mapping_ends(deployed, EntityRef::Infrastructure(underlying))?;
        Ok(Self {
            id: EntityId::new(id),
            deployed_entity: deployed.id().clone(),
            underlying_infrastructure: underlying.id.clone(),
        })
    }
}

pub(crate) fn check_mapping_ends(
    deployed: EntityRef<'_>,
    underlying: EntityRef<'_>,
) -> Result<(), ModelError> {
    if !(deployed.is_component() || deployed.is_infrastructure()) {
        return Err(ModelError::TypeMismatch {
            expected: "Component or Infrastructure".to_string(),
            found: deployed.kind_label().to_string(),
        });
    }
    if !underlying.is_infrastructure() {
        return Err(ModelError::TypeMismatch {
            expected: "Infrastructure".to_string(),
            found: underlying.kind_label().to_string(),
        });
    }
    if deployed.id() == underlying.id() {
        return Err(ModelError::ReferentialIntegrity(format!(
            "entity '{}' cannot be deployed on itself",
            deployed.id()
        )));
    }
    Ok(())
}

/// An external endpoint plus the ordered links that realize the request behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestTrace {
    pub id: EntityId,
    pub name: String,
    pub external_endpoint: EntityId,
    #[serde(default)]
    pub links: Vec<EntityId>,
}

impl RequestTrace {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        external_endpoint: &Endpoint,
        links: &[&Link],
    ) -> Self {
        Self {
            id: EntityId::new(id),
            name: name.into(),
            external_endpoint: external_endpoint.id.clone(),
            links: links.iter().map(|l| l.id.clone()).collect(),
        }
    }
}

/// Borrowed view of any primary entity.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Component(&'a Component),
    Infrastructure(&'a Infrastructure),
    DataAggregate(&'a DataAggregate),
    BackingData(&'a BackingData),
}

impl<'a> EntityRef<'a> {
    #[must_use]
    pub fn id(&self) -> &'a EntityId {
        match self {
            EntityRef::Component(c) => &c.id,
            EntityRef::Infrastructure(i) => &i.id,
            EntityRef::DataAggregate(d) => &d.id,
            EntityRef::BackingData(b) => &b.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            EntityRef::Component(c) => &c.name,
            EntityRef::Infrastructure(i) => &i.name,
            EntityRef::DataAggregate(d) => &d.name,
            EntityRef::BackingData(b) => &b.name,
        }
    }

    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            EntityRef::Component(c) => c.kind.label(),
            EntityRef::Infrastructure(i) => match i.kind {
                InfrastructureKind::Compute => "Compute",
                InfrastructureKind::Dbms => "DBMS",
            },
            EntityRef::DataAggregate(_) => "DataAggregate",
            EntityRef::BackingData(_) => "BackingData",
        }
    }

    #[must_use]
    pub fn is_component(&self) -> bool {
        matches!(self, EntityRef::Component(_))
    }

    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, EntityRef::Infrastructure(_))
    }

    #[must_use]
    pub fn is_data_aggregate(&self) -> bool {
        matches!(self, EntityRef::DataAggregate(_))
    }

    #[must_use]
    pub fn is_backing_data(&self) -> bool {
        matches!(self, EntityRef::BackingData(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct System {
    pub name: String,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub infrastructures: Vec<Infrastructure>,
    #[serde(default)]
    pub data_aggregates: Vec<DataAggregate>,
    #[serde(default)]
    pub backing_data: Vec<BackingData>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub deployment_mappings: Vec<DeploymentMapping>,
    #[serde(default)]
    pub request_traces: Vec<RequestTrace>,
}

impl System {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Parse and validate a system from JSON text.
    ///
    /// # Errors
    /// Returns `ModelError::Json` for malformed input, or any validation error.
    pub fn from_json_str(data: &str) -> Result<Self, ModelError> {
        let system: System = serde_json::from_str(data)?;
        system.validate()?;
        Ok(system)
    }

    /// Parse and validate a system from YAML text.
    ///
    /// # Errors
    /// Returns `ModelError::Yaml` for malformed input, or any validation error.
    pub fn from_yaml_str(data: &str) -> Result<Self, ModelError> {
        let system: System = serde_yaml::from_str(data)?;
        system.validate()?;
        Ok(system)
    }

    /// Load a system from `path`. Files ending in `.yaml`/`.yml` are read as YAML,
    /// anything else as JSON.
    ///
    /// # Errors
    /// Returns `ModelError::Io` if the file cannot be read, otherwise see
    /// [`System::from_json_str`] / [`System::from_yaml_str`].
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let data = std::fs::read_to_string(path)
            .map_err(|source| ModelError::Io { file: path.to_path_buf(), source })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&data),
            _ => Self::from_json_str(&data),
        }
    }

    /// Check the cross-entity invariants of the graph.
    ///
    /// # Errors
    /// Returns the first violation found: duplicate ids, dangling references,
    /// self-links, self-deployments, mapping type mismatches or hosting cycles.
    pub fn validate(&self) -> Result<(), ModelError> {
        let resolver = Resolver::new(self)?;

        for c in &self.components {
            if let Some(host) = &c.host {
                resolver.require_infrastructure(host)?;
            }
            for d in &c.data_aggregates {
                resolver.data_aggregate(d).ok_or_else(|| unknown("data aggregate", d))?;
            }
            for b in &c.backing_data {
                resolver.backing_data(b).ok_or_else(|| unknown("backing data", b))?;
            }
        }

        for i in &self.infrastructures {
            if let Some(host) = &i.host {
                resolver.require_infrastructure(host)?;
            }
            for b in &i.backing_data {
                resolver.backing_data(b).ok_or_else(|| unknown("backing data", b))?;
            }
            resolver.hosting_chain(&i.id)?;
        }

        for l in &self.links {
            let source = resolver.component(&l.source).ok_or_else(|| unknown("component", &l.source))?;
            let target = resolver.endpoint(&l.target).ok_or_else(|| unknown("endpoint", &l.target))?;
            if target.owner.id == source.id {
                return Err(ModelError::ReferentialIntegrity(format!(
                    "link '{}' targets endpoint '{}' of its own source '{}'",
                    l.id, l.target, l.source
                )));
            }
        }

        for m in &self.deployment_mappings {
            let deployed = resolver
                .entity(&m.deployed_entity)
                .ok_or_else(|| unknown("entity", &m.deployed_entity))?;
            let underlying = resolver
                .entity(&m.underlying_infrastructure)
                .ok_or_else(|| unknown("infrastructure", &m.underlying_infrastructure))?;
            check_mapping_ends(deployed, underlying)?;
        }

        for t in &self.request_traces {
            let ep = resolver
                .endpoint(&t.external_endpoint)
                .ok_or_else(|| unknown("external endpoint", &t.external_endpoint))?;
            if !ep.external {
                return Err(ModelError::TypeMismatch {
                    expected: "external endpoint".to_string(),
                    found: format!("endpoint '{}'", ep.endpoint.id),
                });
            }
            for l in &t.links {
                resolver.link(l).ok_or_else(|| unknown("link", l))?;
            }
        }
        Ok(())
    }
}

fn unknown(kind: &'static str, id: &EntityId) -> ModelError {
    ModelError::UnknownEntity { kind, id: id.0.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_components() -> (Component, Component) {
        let gateway = Component::new("c1", "Gateway", ComponentKind::Service)
            .with_endpoint(Endpoint::new("e1", "gw api", "REST", "/", 80));
        let orders = Component::new("c2", "Orders", ComponentKind::Service)
            .with_endpoint(Endpoint::new("e2", "orders api", "REST", "/orders", 8080));
        (gateway, orders)
    }

    #[test]
    fn link_to_foreign_endpoint_is_accepted() {
        let (gateway, orders) = two_components();
        let link = Link::new("l1", &gateway, &orders.endpoints[0], Some("calls")).unwrap();
        assert_eq!(link.source, gateway.id);
        assert_eq!(link.target.as_str(), "e2");
        assert_eq!(link.relation_type.as_deref(), Some("calls"));
    }

    #[test]
    fn link_to_own_endpoint_is_rejected() {
        let (gateway, _) = two_components();
        let err = Link::new("l1", &gateway, &gateway.endpoints[0], None).unwrap_err();
        assert!(matches!(err, ModelError::ReferentialIntegrity(_)));
    }

    #[test]
    fn mapping_onto_itself_is_rejected() {
        let vm = Infrastructure::new("i1", "vm", InfrastructureKind::Compute);
        let err = DeploymentMapping::new("m1", EntityRef::Infrastructure(&vm), &vm).unwrap_err();
        assert!(matches!(err, ModelError::ReferentialIntegrity(_)));
    }

    #[test]
    fn mapping_component_onto_same_id_infrastructure_is_rejected() {
        let app = Component::new("x", "api", ComponentKind::Service);
        let vm = Infrastructure::new("x", "vm", InfrastructureKind::Compute);
        let err = DeploymentMapping::new("m1", EntityRef::Component(&app), &vm).unwrap_err();
        assert!(matches!(err, ModelError::ReferentialIntegrity(_)));
    }

    #[test]
    fn link_to_own_external_endpoint_is_rejected() {
        let gateway = Component::new("c1", "Gateway", ComponentKind::Service)
            .with_external_endpoint(Endpoint::new("x1", "GET /shop", "GET", "/shop", 443));
        let err = Link::new("l1", &gateway, &gateway.external_endpoints[0], None).unwrap_err();
        assert!(matches!(err, ModelError::ReferentialIntegrity(_)));
    }

    #[test]
    fn validate_reports_link_to_own_external_endpoint() {
        let mut system = System::new("shop");
        system.components.push(
            Component::new("c1", "Gateway", ComponentKind::Service)
                .with_external_endpoint(Endpoint::new("x1", "GET /shop", "GET", "/shop", 443)),
        );
        system.links.push(Link {
            id: EntityId::new("l1"),
            source: EntityId::new("c1"),
            target: EntityId::new("x1"),
            relation_type: None,
        });
        assert!(matches!(system.validate(), Err(ModelError::ReferentialIntegrity(_))));
    }

    #[test]
    fn validate_reports_component_and_infrastructure_sharing_an_id() {
        let mut system = System::new("shop");
        system.components.push(Component::new("x", "api", ComponentKind::Service));
        system.infrastructures.push(Infrastructure::new("x", "vm", InfrastructureKind::Compute));
        system.deployment_mappings.push(DeploymentMapping {
            id: EntityId::new("m1"),
            deployed_entity: EntityId::new("x"),
            underlying_infrastructure: EntityId::new("x"),
        });
        let err = system.validate().unwrap_err();
        assert!(matches!(
            err,
            ModelError::SharedId { first: "components", second: "infrastructures", .. }
        ));
    }

    #[test]
    fn mapping_of_data_aggregate_is_a_type_mismatch() {
        let vm = Infrastructure::new("i1", "vm", InfrastructureKind::Compute);
        let data = DataAggregate::new("d1", "orders");
        let err = DeploymentMapping::new("m1", EntityRef::DataAggregate(&data), &vm).unwrap_err();
        assert!(matches!(err, ModelError::TypeMismatch { .. }));
    }

    #[test]
    fn component_kind_is_read_from_flat_tag() {
        let json = r#"{
            "id": "s1", "name": "db service", "kind": "StorageBackingService",
            "properties": { "replicas": 3 }
        }"#;
        let c: Component = serde_json::from_str(json).unwrap();
        match c.kind {
            ComponentKind::StorageBackingService { properties } => {
                assert_eq!(properties.get("replicas"), Some(&serde_json::json!(3)));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn validate_reports_dangling_host() {
        let mut system = System::new("shop");
        system
            .components
            .push(Component::new("c1", "api", ComponentKind::Service).hosted_on(&EntityId::new("nope")));
        let err = system.validate().unwrap_err();
        assert!(matches!(err, ModelError::UnknownEntity { kind: "infrastructure", .. }));
    }

    #[test]
    fn validate_reports_hosting_cycle() {
        let mut system = System::new("loop");
        let a = EntityId::new("a");
        let b = EntityId::new("b");
        system
            .infrastructures
            .push(Infrastructure::new("a", "A", InfrastructureKind::Compute).hosted_on(&b));
        system
            .infrastructures
            .push(Infrastructure::new("b", "B", InfrastructureKind::Compute).hosted_on(&a));
        assert!(matches!(system.validate(), Err(ModelError::HostingCycle(_))));
    }
}
