use std::collections::{HashMap, HashSet};

use crate::errors::ModelError;
use crate::model::{
    BackingData, Component, ComponentKind, DataAggregate, DeploymentMapping, Endpoint, EntityId,
    EntityRef, Infrastructure, InfrastructureKind, Link, System,
};

/// An endpoint together with the component exposing it.
#[derive(Debug, Clone, Copy)]
pub struct EndpointRef<'a> {
    pub endpoint: &'a Endpoint,
    pub owner: &'a Component,
    pub external: bool,
}

/// Id indexes over one `System`.
///
/// Built once per validation or export; all lookups borrow from the system.
pub struct Resolver<'a> {
    system: &'a System,
    components: HashMap<&'a EntityId, &'a Component>,
    infrastructures: HashMap<&'a EntityId, &'a Infrastructure>,
    data_aggregates: HashMap<&'a EntityId, &'a DataAggregate>,
    backing_data: HashMap<&'a EntityId, &'a BackingData>,
    links: HashMap<&'a EntityId, &'a Link>,
    endpoints: HashMap<&'a EntityId, EndpointRef<'a>>,
    // storage entity name -> entity; first declaration wins
    storage_by_name: HashMap<&'a str, EntityRef<'a>>,
    // component id -> outgoing links in declaration order
    outgoing: HashMap<&'a EntityId, Vec<&'a Link>>,
    // deployed entity id -> its deployment mapping
    deployments: HashMap<&'a EntityId, &'a DeploymentMapping>,
}

fn index<'a, T>(
    collection: &'static str,
    items: &'a [T],
    id: impl Fn(&'a T) -> &'a EntityId,
) -> Result<HashMap<&'a EntityId, &'a T>, ModelError> {
    let mut map = HashMap::with_capacity(items.len());
    for it in items {
        let key = id(it);
        if map.insert(key, it).is_some() {
            return Err(ModelError::DuplicateId { collection, id: key.0.clone() });
        }
    }
    Ok(map)
}

// Ids feeding one template namespace must be disjoint across collections:
// node keys and relationship keys are looked up by bare id.
fn disjoint<'a>(ids: impl IntoIterator<Item = (&'static str, &'a EntityId)>) -> Result<(), ModelError> {
    let mut owners: HashMap<&'a EntityId, &'static str> = HashMap::new();
    for (collection, id) in ids {
        if let Some(first) = owners.insert(id, collection) {
            return Err(ModelError::SharedId { id: id.0.clone(), first, second: collection });
        }
    }
    Ok(())
}

impl<'a> Resolver<'a> {
    /// Index `system`.
    ///
    /// # Errors
    /// Returns `ModelError::DuplicateId` when two entities of one collection
    /// (or two endpoints anywhere in the system) share an id, and
    /// `ModelError::SharedId` when components, infrastructures, data aggregates,
    /// backing data and request traces reuse each other's ids (likewise links
    /// and deployment mappings).
    pub fn new(system: &'a System) -> Result<Self, ModelError> {
        let components = index("components", &system.components, |c| &c.id)?;
        let infrastructures = index("infrastructures", &system.infrastructures, |i| &i.id)?;
        let data_aggregates = index("data_aggregates", &system.data_aggregates, |d| &d.id)?;
        let backing_data = index("backing_data", &system.backing_data, |b| &b.id)?;
        let links = index("links", &system.links, |l| &l.id)?;
        index("deployment_mappings", &system.deployment_mappings, |m| &m.id)?;
        index("request_traces", &system.request_traces, |t| &t.id)?;

        disjoint(
            system
                .components
                .iter()
                .map(|c| ("components", &c.id))
                .chain(system.infrastructures.iter().map(|i| ("infrastructures", &i.id)))
                .chain(system.data_aggregates.iter().map(|d| ("data_aggregates", &d.id)))
                .chain(system.backing_data.iter().map(|b| ("backing_data", &b.id)))
                .chain(system.request_traces.iter().map(|t| ("request_traces", &t.id))),
        )?;
        disjoint(
            system
                .links
                .iter()
                .map(|l| ("links", &l.id))
                .chain(system.deployment_mappings.iter().map(|m| ("deployment_mappings", &m.id))),
        )?;

        let mut endpoints = HashMap::new();
        for c in &system.components {
            let owned = c
                .endpoints
                .iter()
                .map(|e| (e, false))
                .chain(c.external_endpoints.iter().map(|e| (e, true)));
            for (endpoint, external) in owned {
                let r = EndpointRef { endpoint, owner: c, external };
                if endpoints.insert(&endpoint.id, r).is_some() {
                    return Err(ModelError::DuplicateId {
                        collection: "endpoints",
                        id: endpoint.id.0.clone(),
                    });
                }
            }
        }

        let mut storage_by_name: HashMap<&str, EntityRef<'a>> = HashMap::new();
        for c in &system.components {
            if matches!(c.kind, ComponentKind::StorageBackingService { .. }) {
                storage_by_name.entry(c.name.as_str()).or_insert(EntityRef::Component(c));
            }
        }
        for i in &system.infrastructures {
            if i.kind == InfrastructureKind::Dbms {
                storage_by_name.entry(i.name.as_str()).or_insert(EntityRef::Infrastructure(i));
            }
        }

        let mut outgoing: HashMap<&EntityId, Vec<&Link>> = HashMap::new();
        for l in &system.links {
            outgoing.entry(&l.source).or_default().push(l);
        }

        let mut deployments = HashMap::with_capacity(system.deployment_mappings.len());
        for m in &system.deployment_mappings {
            deployments.entry(&m.deployed_entity).or_insert(m);
        }

        Ok(Self {
            system,
            components,
            infrastructures,
            data_aggregates,
            backing_data,
            links,
            endpoints,
            storage_by_name,
            outgoing,
            deployments,
        })
    }

    #[must_use]
    pub fn system(&self) -> &'a System {
        self.system
    }

    #[must_use]
    pub fn component(&self, id: &EntityId) -> Option<&'a Component> {
        self.components.get(id).copied()
    }

    #[must_use]
    pub fn infrastructure(&self, id: &EntityId) -> Option<&'a Infrastructure> {
        self.infrastructures.get(id).copied()
    }

    #[must_use]
    pub fn data_aggregate(&self, id: &EntityId) -> Option<&'a DataAggregate> {
        self.data_aggregates.get(id).copied()
    }

    #[must_use]
    pub fn backing_data(&self, id: &EntityId) -> Option<&'a BackingData> {
        self.backing_data.get(id).copied()
    }

    #[must_use]
    pub fn link(&self, id: &EntityId) -> Option<&'a Link> {
        self.links.get(id).copied()
    }

    #[must_use]
    pub fn endpoint(&self, id: &EntityId) -> Option<EndpointRef<'a>> {
        self.endpoints.get(id).copied()
    }

    /// Look up a primary entity of any kind. Ids are disjoint across the
    /// primary collections, so at most one kind matches.
    #[must_use]
    pub fn entity(&self, id: &EntityId) -> Option<EntityRef<'a>> {
        if let Some(c) = self.component(id) {
            return Some(EntityRef::Component(c));
        }
        if let Some(i) = self.infrastructure(id) {
            return Some(EntityRef::Infrastructure(i));
        }
        if let Some(d) = self.data_aggregate(id) {
            return Some(EntityRef::DataAggregate(d));
        }
        self.backing_data(id).map(EntityRef::BackingData)
    }

    /// Find the storage backing service or DBMS named `name`.
    #[must_use]
    pub fn storage_entity(&self, name: &str) -> Option<EntityRef<'a>> {
        self.storage_by_name.get(name).copied()
    }

    #[must_use]
    pub fn outgoing_links(&self, component: &EntityId) -> &[&'a Link] {
        self.outgoing.get(component).map_or(&[][..], Vec::as_slice)
    }

    #[must_use]
    pub fn deployment_of(&self, entity: &EntityId) -> Option<&'a DeploymentMapping> {
        self.deployments.get(entity).copied()
    }

    /// # Errors
    /// `UnknownEntity` when `id` is not an infrastructure.
    pub fn require_infrastructure(&self, id: &EntityId) -> Result<&'a Infrastructure, ModelError> {
        self.infrastructure(id)
            .ok_or_else(|| ModelError::UnknownEntity { kind: "infrastructure", id: id.0.clone() })
    }

    /// Walk the hosting chain upward from `infrastructure`, returning the
    /// infrastructures it is (transitively) hosted on, nearest first.
    ///
    /// # Errors
    /// `HostingCycle` when the chain revisits an infrastructure, `UnknownEntity`
    /// when a link in the chain points nowhere.
    pub fn hosting_chain(&self, infrastructure: &EntityId) -> Result<Vec<&'a Infrastructure>, ModelError> {
        let mut seen: HashSet<&EntityId> = HashSet::new();
        let mut chain = Vec::new();
        let mut cur = self.require_infrastructure(infrastructure)?;
        seen.insert(&cur.id);
        while let Some(parent) = &cur.host {
            let next = self.require_infrastructure(parent)?;
            if !seen.insert(&next.id) {
                return Err(ModelError::HostingCycle(infrastructure.0.clone()));
            }
            chain.push(next);
            cur = next;
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> System {
        let mut s = System::new("shop");
        s.infrastructures.push(Infrastructure::new("k8s", "cluster", InfrastructureKind::Compute));
        s.infrastructures.push(
            Infrastructure::new("pg", "postgres", InfrastructureKind::Dbms)
                .hosted_on(&EntityId::new("k8s")),
        );
        s.components.push(
            Component::new("a", "api", ComponentKind::Service)
                .with_endpoint(Endpoint::new("a1", "api rest", "REST", "/", 80)),
        );
        s.components.push(Component::new(
            "cache",
            "redis",
            ComponentKind::StorageBackingService { properties: Default::default() },
        ));
        s
    }

    #[test]
    fn endpoint_owner_is_indexed() {
        let s = sample();
        let r = Resolver::new(&s).unwrap();
        let ep = r.endpoint(&EntityId::new("a1")).unwrap();
        assert_eq!(ep.owner.name, "api");
        assert!(!ep.external);
    }

    #[test]
    fn storage_entities_are_found_by_name() {
        let s = sample();
        let r = Resolver::new(&s).unwrap();
        assert!(r.storage_entity("postgres").unwrap().is_infrastructure());
        assert!(r.storage_entity("redis").unwrap().is_component());
        assert!(r.storage_entity("cluster").is_none());
        assert!(r.storage_entity("api").is_none());
    }

    #[test]
    fn hosting_chain_walks_to_the_root() {
        let s = sample();
        let r = Resolver::new(&s).unwrap();
        let chain = r.hosting_chain(&EntityId::new("pg")).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name, "cluster");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut s = sample();
        s.components.push(Component::new("a", "other", ComponentKind::Component));
        assert!(matches!(
            Resolver::new(&s),
            Err(ModelError::DuplicateId { collection: "components", .. })
        ));
    }

    #[test]
    fn ids_shared_across_node_collections_are_rejected() {
        let mut s = sample();
        s.data_aggregates.push(DataAggregate::new("a", "orders"));
        assert!(matches!(
            Resolver::new(&s),
            Err(ModelError::SharedId { first: "components", second: "data_aggregates", .. })
        ));
    }

    #[test]
    fn ids_shared_by_link_and_mapping_are_rejected() {
        let mut s = sample();
        s.links.push(Link {
            id: EntityId::new("r1"),
            source: EntityId::new("cache"),
            target: EntityId::new("a1"),
            relation_type: None,
        });
        s.deployment_mappings.push(DeploymentMapping {
            id: EntityId::new("r1"),
            deployed_entity: EntityId::new("a"),
            underlying_infrastructure: EntityId::new("k8s"),
        });
        assert!(matches!(Resolver::new(&s), Err(ModelError::SharedId { id, .. }) if id == "r1"));
    }

    #[test]
    fn same_id_in_endpoint_and_component_is_allowed() {
        let mut s = sample();
        s.components.push(
            Component::new("e9", "worker", ComponentKind::Service)
                .with_endpoint(Endpoint::new("e9", "worker rest", "REST", "/w", 80)),
        );
        assert!(Resolver::new(&s).is_ok());
    }
}
