//! Node template builders, one per entity kind.
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::{
    unresolved, ExportContext, NodeTemplate, Requirement, ResolvedEndpoint, ENDPOINT_LINK,
    EXTERNAL_ENDPOINT, HOST, USES_BACKING_DATA, USES_DATA,
};
use crate::catalog;
use crate::errors::ExportError;
use crate::model::{
    BackingData, Component, ComponentKind, DataAggregate, Endpoint, EntityId, EntityRef,
    Infrastructure, InfrastructureKind, RequestTrace,
};

/// Build the node templates of every entity in the context's system, keyed,
/// in key-allocation order.
///
/// # Errors
/// The first builder error.
pub fn build_all(ctx: &ExportContext<'_>) -> Result<Vec<(String, NodeTemplate)>, ExportError> {
    let system = ctx.resolver.system();
    let entities = system
        .components
        .iter()
        .map(EntityRef::Component)
        .chain(system.infrastructures.iter().map(EntityRef::Infrastructure))
        .chain(system.data_aggregates.iter().map(EntityRef::DataAggregate))
        .chain(system.backing_data.iter().map(EntityRef::BackingData));

    let primary = entities.map(|e| -> Result<(String, NodeTemplate), ExportError> {
        Ok((ctx.node_key(e.id())?.to_string(), node_template(ctx, e)?))
    });
    let traces = system.request_traces.iter().map(|t| -> Result<(String, NodeTemplate), ExportError> {
        Ok((ctx.node_key(&t.id)?.to_string(), request_trace_template(ctx, t)?))
    });
    primary.chain(traces).collect()
}

/// Build the node template for one primary entity.
///
/// # Errors
/// `MissingProperty` for incomplete endpoints, `UnresolvedReference` for
/// relations pointing at entities without a node key.
pub fn node_template(ctx: &ExportContext<'_>, entity: EntityRef<'_>) -> Result<NodeTemplate, ExportError> {
    match entity {
        EntityRef::Component(c) => component_template(ctx, c),
        EntityRef::Infrastructure(i) => infrastructure_template(ctx, i),
        EntityRef::DataAggregate(d) => data_aggregate_template(ctx, d),
        EntityRef::BackingData(b) => Ok(backing_data_template(b)),
    }
}

fn name_metadata(name: &str) -> Option<Map<String, Value>> {
    let mut m = Map::new();
    m.insert("name".to_string(), Value::from(name));
    Some(m)
}

// Host from the entity's own reference, else from its deployment mapping.
// The hosted-on relationship is attached when the mapping agrees on the host.
fn host_requirement(
    ctx: &ExportContext<'_>,
    entity: &EntityId,
    host: Option<&EntityId>,
) -> Result<Option<Requirement>, ExportError> {
    let mapping = ctx.resolver.deployment_of(entity);
    let Some(host) = host.or(mapping.map(|m| &m.underlying_infrastructure)) else {
        return Ok(None);
    };
    let node = ctx.node_key(host)?;
    let req = match mapping {
        Some(m) if &m.underlying_infrastructure == host => {
            Requirement::via(HOST, node, ctx.relationship_key(&m.id)?)
        }
        _ => Requirement::new(HOST, node),
    };
    Ok(Some(req))
}

fn endpoint_list(endpoints: &[Endpoint]) -> Result<Value, ExportError> {
    endpoints
        .iter()
        .map(|e| ResolvedEndpoint::resolve(e).map(|r| r.to_value()))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn component_template(ctx: &ExportContext<'_>, c: &Component) -> Result<NodeTemplate, ExportError> {
    let node_type = match &c.kind {
        ComponentKind::Component => catalog::COMPONENT,
        ComponentKind::Service => catalog::SERVICE,
        ComponentKind::BackingService => catalog::BACKING_SERVICE,
        ComponentKind::StorageBackingService { .. } => catalog::STORAGE_BACKING_SERVICE,
    };

    let mut requirements = Vec::new();
    if let Some(host) = host_requirement(ctx, &c.id, c.host.as_ref())? {
        requirements.push(host);
    }
    for link in ctx.resolver.outgoing_links(&c.id) {
        let target = ctx.resolver.endpoint(&link.target).ok_or_else(|| unresolved("endpoint", &link.target))?;
        requirements.push(Requirement::via(
            ENDPOINT_LINK,
            ctx.node_key(&target.owner.id)?,
            ctx.relationship_key(&link.id)?,
        ));
    }
    for d in &c.data_aggregates {
        requirements.push(Requirement::new(USES_DATA, ctx.node_key(d)?));
    }
    for b in &c.backing_data {
        requirements.push(Requirement::new(USES_BACKING_DATA, ctx.node_key(b)?));
    }

    let mut properties = Map::new();
    properties.insert("endpoints".to_string(), endpoint_list(&c.endpoints)?);
    properties.insert("external_endpoints".to_string(), endpoint_list(&c.external_endpoints)?);
    // Reserved: persisted data is not derived from the model yet and is always empty.
    properties.insert("persisted_data".to_string(), Value::Array(Vec::new()));
    if let ComponentKind::StorageBackingService { properties: own } = &c.kind {
        let mut configuration = catalog::default_properties(node_type);
        configuration.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
        properties.insert("configuration".to_string(), Value::Object(configuration.into_iter().collect()));
    }

    Ok(NodeTemplate {
        node_type: node_type.to_string(),
        metadata: name_metadata(&c.name),
        properties: Some(properties),
        requirements,
    })
}

fn infrastructure_template(ctx: &ExportContext<'_>, i: &Infrastructure) -> Result<NodeTemplate, ExportError> {
    let node_type = match i.kind {
        InfrastructureKind::Dbms => catalog::DBMS,
        InfrastructureKind::Compute => catalog::COMPUTE,
    };
    let mut requirements = Vec::new();
    if let Some(host) = host_requirement(ctx, &i.id, i.host.as_ref())? {
        requirements.push(host);
    }
    for b in &i.backing_data {
        requirements.push(Requirement::new(USES_BACKING_DATA, ctx.node_key(b)?));
    }
    Ok(NodeTemplate {
        node_type: node_type.to_string(),
        metadata: name_metadata(&i.name),
        properties: None,
        requirements,
    })
}

fn data_aggregate_template(ctx: &ExportContext<'_>, d: &DataAggregate) -> Result<NodeTemplate, ExportError> {
    let mut seen = HashSet::new();
    let mut persisted_by = Vec::with_capacity(d.persisted_by.len());
    for name in &d.persisted_by {
        if !seen.insert(name.as_str()) {
            continue;
        }
        let storage = ctx.resolver.storage_entity(name).ok_or_else(|| ExportError::UnresolvedReference {
            kind: "storage entity",
            reference: name.clone(),
        })?;
        persisted_by.push(Value::from(ctx.node_key(storage.id())?));
    }
    let mut properties = Map::new();
    properties.insert("persisted_by".to_string(), Value::Array(persisted_by));
    Ok(NodeTemplate {
        node_type: catalog::DATA_AGGREGATE.to_string(),
        metadata: name_metadata(&d.name),
        properties: Some(properties),
        requirements: Vec::new(),
    })
}

fn backing_data_template(b: &BackingData) -> NodeTemplate {
    let properties = if b.included_data.is_empty() {
        None
    } else {
        let included: Map<String, Value> =
            b.included_data.iter().map(|item| (item.key.clone(), Value::from(item.value.as_str()))).collect();
        let mut p = Map::new();
        p.insert("includedData".to_string(), Value::Object(included));
        Some(p)
    };
    NodeTemplate {
        node_type: catalog::BACKING_DATA.to_string(),
        metadata: name_metadata(&b.name),
        properties,
        requirements: Vec::new(),
    }
}

/// Build the node template for a request trace.
///
/// # Errors
/// `UnresolvedReference` for an unknown entry endpoint or link, `MissingProperty`
/// for an incomplete entry endpoint.
pub fn request_trace_template(ctx: &ExportContext<'_>, t: &RequestTrace) -> Result<NodeTemplate, ExportError> {
    let entry = ctx
        .resolver
        .endpoint(&t.external_endpoint)
        .ok_or_else(|| unresolved("external endpoint", &t.external_endpoint))?;
    let resolved = ResolvedEndpoint::resolve(entry.endpoint)?;
    let links = t
        .links
        .iter()
        .map(|l| ctx.relationship_key(l).map(Value::from))
        .collect::<Result<Vec<_>, _>>()?;

    let mut properties = Map::new();
    properties.insert("external_endpoint".to_string(), resolved.to_value());
    properties.insert("links".to_string(), Value::Array(links));
    Ok(NodeTemplate {
        node_type: catalog::REQUEST_TRACE.to_string(),
        metadata: name_metadata(&t.name),
        properties: Some(properties),
        requirements: vec![Requirement::new(EXTERNAL_ENDPOINT, ctx.node_key(&entry.owner.id)?)],
    })
}
