//! Relationship template builders.
use serde_json::{Map, Value};

use super::{unresolved, ExportContext, RelationshipTemplate, ResolvedEndpoint};
use crate::catalog;
use crate::errors::ExportError;
use crate::model::{DeploymentMapping, Link};

/// Links first, then deployment mappings, each in declaration order.
///
/// # Errors
/// The first builder error.
pub fn build_all(ctx: &ExportContext<'_>) -> Result<Vec<(String, RelationshipTemplate)>, ExportError> {
    let system = ctx.resolver.system();
    let links = system.links.iter().map(|l| -> Result<(String, RelationshipTemplate), ExportError> {
        Ok((ctx.relationship_key(&l.id)?.to_string(), link_template(ctx, l)?))
    });
    let mappings = system.deployment_mappings.iter().map(|m| -> Result<(String, RelationshipTemplate), ExportError> {
        Ok((ctx.relationship_key(&m.id)?.to_string(), deployment_template(m)))
    });
    links.chain(mappings).collect()
}

/// Link → connects-to, carrying the target endpoint descriptor and the optional relation label.
///
/// # Errors
/// `UnresolvedReference` for an unknown target endpoint, `MissingProperty` for an incomplete one.
pub fn link_template(ctx: &ExportContext<'_>, link: &Link) -> Result<RelationshipTemplate, ExportError> {
    let target = ctx.resolver.endpoint(&link.target).ok_or_else(|| unresolved("endpoint", &link.target))?;
    let resolved = ResolvedEndpoint::resolve(target.endpoint)?;

    let mut properties = Map::new();
    properties.insert("target_endpoint".to_string(), Value::from(resolved.descriptor.descriptor));
    properties.insert("protocol".to_string(), Value::from(resolved.descriptor.protocol.as_str()));
    if let Some(label) = &link.relation_type {
        properties.insert("relation_type".to_string(), Value::from(label.as_str()));
    }
    Ok(RelationshipTemplate {
        relationship_type: catalog::CONNECTS_TO_LINK.to_string(),
        properties: Some(properties),
    })
}

/// Deployment mapping → hosted-on. Structural only, no properties.
#[must_use]
pub fn deployment_template(_mapping: &DeploymentMapping) -> RelationshipTemplate {
    RelationshipTemplate { relationship_type: catalog::HOSTED_ON.to_string(), properties: None }
}
