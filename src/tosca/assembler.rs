//! Service template assembly.
//!
//! A pure fold: builder outputs go in, one document comes out. Node and
//! relationship keys are unique within their own namespace only.
use std::collections::BTreeMap;

use super::{
    NodeTemplate, RelationshipTemplate, ServiceTemplate, TemplateMetadata, TopologyTemplate,
    TOSCA_DEFINITIONS_VERSION,
};
use crate::errors::ExportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub metadata: TemplateMetadata,
    pub description: String,
}

trait Typed {
    fn type_tag(&self) -> &str;
}

impl Typed for NodeTemplate {
    fn type_tag(&self) -> &str {
        &self.node_type
    }
}

impl Typed for RelationshipTemplate {
    fn type_tag(&self) -> &str {
        &self.relationship_type
    }
}

fn fold_namespace<T: Typed>(
    namespace: &'static str,
    templates: impl IntoIterator<Item = (String, T)>,
) -> Result<BTreeMap<String, T>, ExportError> {
    templates.into_iter().try_fold(BTreeMap::new(), |mut acc, (key, template)| {
        if key.is_empty() {
            return Err(ExportError::EmptyKey { name: key });
        }
        if template.type_tag().is_empty() {
            return Err(ExportError::MissingTypeTag { key });
        }
        if acc.contains_key(&key) {
            return Err(ExportError::DuplicateKey { namespace, key });
        }
        acc.insert(key, template);
        Ok(acc)
    })
}

/// Merge keyed node and relationship templates under `envelope`.
///
/// # Errors
/// `DuplicateKey` when a key repeats within one namespace, `MissingTypeTag`
/// when a template has an empty type, `EmptyKey` for an empty key.
pub fn assemble(
    envelope: Envelope,
    nodes: impl IntoIterator<Item = (String, NodeTemplate)>,
    relationships: impl IntoIterator<Item = (String, RelationshipTemplate)>,
) -> Result<ServiceTemplate, ExportError> {
    let node_templates = fold_namespace("node", nodes)?;
    let relationship_templates = fold_namespace("relationship", relationships)?;
    Ok(ServiceTemplate {
        tosca_definitions_version: TOSCA_DEFINITIONS_VERSION.to_string(),
        metadata: envelope.metadata,
        description: envelope.description,
        topology_template: TopologyTemplate { node_templates, relationship_templates },
    })
}
