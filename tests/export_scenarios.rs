use archmodel_tosca::catalog;
use archmodel_tosca::errors::{ExportError, ModelError};
use archmodel_tosca::model::{
    Component, ComponentKind, DataAggregate, DeploymentMapping, Endpoint, EntityRef, Infrastructure,
    InfrastructureKind, Link, System,
};
use archmodel_tosca::tosca::{encode, export_system, DocumentFormat, ExportOptions};
use serde_json::{json, Value};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

fn export_value(system: &System) -> Value {
    let template = export_system(system, &ExportOptions::default()).unwrap();
    serde_json::to_value(&template).unwrap()
}

#[test]
fn lone_data_aggregate_gets_sanitized_key() {
    let mut system = System::new("solo");
    system.data_aggregates.push(DataAggregate::new("d1", "Order  Data"));

    let doc = export_value(&system);
    let nodes = doc["topology_template"]["node_templates"].as_object().unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes["order_data"]["type"], json!(catalog::DATA_AGGREGATE));
    assert_eq!(nodes["order_data"]["properties"]["persisted_by"], json!([]));
    assert_eq!(nodes["order_data"]["metadata"]["name"], json!("Order  Data"));
    assert!(doc["topology_template"]["relationship_templates"].as_object().unwrap().is_empty());
}

#[test]
fn same_named_components_get_suffixed_keys() {
    let mut system = System::new("workers");
    system.components.push(Component::new("c1", "worker", ComponentKind::Component));
    system.components.push(Component::new("c2", "worker", ComponentKind::Component));

    let doc = export_value(&system);
    let nodes = doc["topology_template"]["node_templates"].as_object().unwrap();
    let keys: Vec<&str> = nodes.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["worker", "worker_2"]);
    assert_eq!(nodes["worker"]["type"], json!(catalog::COMPONENT));
    assert_eq!(nodes["worker"]["properties"]["persisted_data"], json!([]));
}

#[test]
fn link_key_and_descriptor_follow_target_owner() {
    let mut system = System::new("links");
    let orders = Component::new("o", "Orders", ComponentKind::Service)
        .with_endpoint(Endpoint::new("o-api", "orders api", "REST", "/orders", 8080));
    let gateway = Component::new("g", "Gateway", ComponentKind::Service);
    let link = Link::new("l", &gateway, &orders.endpoints[0], None).unwrap();
    system.components.push(gateway);
    system.components.push(orders);
    system.links.push(link);

    let doc = export_value(&system);
    let rel = &doc["topology_template"]["relationship_templates"]["gateway_connects-to_orders"];
    assert_eq!(rel["type"], json!(catalog::CONNECTS_TO_LINK));
    assert_eq!(rel["properties"]["target_endpoint"], json!("REST /orders"));
    assert_eq!(rel["properties"]["protocol"], json!("http"));

    let gw_reqs = &doc["topology_template"]["node_templates"]["gateway"]["requirements"];
    assert_eq!(
        gw_reqs,
        &json!([{ "endpoint_link": { "node": "orders", "relationship": "gateway_connects-to_orders" } }])
    );
}

#[test]
fn node_and_relationship_namespaces_are_independent() {
    // a component whose sanitized name equals the deployment mapping key
    let mut system = System::new("ns");
    let vm = Infrastructure::new("vm", "vm", InfrastructureKind::Compute);
    let app = Component::new("app", "app", ComponentKind::Service);
    let twin = Component::new("twin", "VM host app", ComponentKind::Component);
    let mapping = DeploymentMapping::new("m", EntityRef::Component(&app), &vm).unwrap();
    system.components.extend([app, twin]);
    system.infrastructures.push(vm);
    system.deployment_mappings.push(mapping);

    let doc = export_value(&system);
    let topo = &doc["topology_template"];
    assert!(topo["node_templates"].get("vm_host_app").is_some());
    assert!(topo["relationship_templates"].get("vm_host_app").is_some());
    assert!(topo["node_templates"].get("vm_host_app_2").is_none());
    assert!(topo["relationship_templates"].get("vm_host_app_2").is_none());
    assert_eq!(
        topo["node_templates"]["app"]["requirements"],
        json!([{ "host": { "node": "vm", "relationship": "vm_host_app" } }])
    );
}

#[test]
fn component_and_infrastructure_sharing_an_id_are_rejected() {
    let mut system = System::new("shared");
    system.components.push(Component::new("x", "api", ComponentKind::Service));
    system.infrastructures.push(Infrastructure::new("x", "vm", InfrastructureKind::Compute));

    let err = system.validate().unwrap_err();
    assert!(matches!(err, ModelError::SharedId { ref id, .. } if id == "x"));
    let err = export_system(&system, &ExportOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ExportError::Model(ModelError::SharedId { first: "components", second: "infrastructures", .. })
    ));
}

#[test]
fn component_and_data_aggregate_sharing_an_id_are_rejected() {
    let mut system = System::new("shared");
    system.components.push(Component::new("1", "api", ComponentKind::Service));
    system.data_aggregates.push(DataAggregate::new("1", "orders"));

    let err = export_system(&system, &ExportOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ExportError::Model(ModelError::SharedId { first: "components", second: "data_aggregates", .. })
    ));
}

#[test]
fn link_and_mapping_sharing_an_id_are_rejected() {
    let mut system = System::new("shared");
    let orders = Component::new("o", "Orders", ComponentKind::Service)
        .with_endpoint(Endpoint::new("o-api", "orders api", "REST", "/orders", 8080));
    let gateway = Component::new("g", "Gateway", ComponentKind::Service);
    let vm = Infrastructure::new("vm", "vm", InfrastructureKind::Compute);
    let link = Link::new("l", &gateway, &orders.endpoints[0], None).unwrap();
    let mapping = DeploymentMapping::new("l", EntityRef::Component(&orders), &vm).unwrap();
    system.components.extend([gateway, orders]);
    system.infrastructures.push(vm);
    system.links.push(link);
    system.deployment_mappings.push(mapping);

    let err = export_system(&system, &ExportOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ExportError::Model(ModelError::SharedId { first: "links", second: "deployment_mappings", .. })
    ));
}

#[test]
fn full_model_exports_every_template() {
    let system = System::load(&fixture("shop.yaml")).unwrap();
    let doc = export_value(&system);

    assert_eq!(doc["tosca_definitions_version"], json!("tosca_simple_yaml_1_3"));
    assert_eq!(doc["metadata"]["template_name"], json!("Shop"));

    let nodes = doc["topology_template"]["node_templates"].as_object().unwrap();
    let mut node_keys: Vec<&str> = nodes.keys().map(String::as_str).collect();
    node_keys.sort_unstable();
    assert_eq!(
        node_keys,
        vec![
            "RT_get_storefront",
            "gateway",
            "order_data",
            "order_events",
            "orders",
            "orders_config",
            "orders_db",
            "postgres_host",
            "vm_1",
        ]
    );

    let rels = doc["topology_template"]["relationship_templates"].as_object().unwrap();
    let rel_keys: Vec<&str> = rels.keys().map(String::as_str).collect();
    assert_eq!(
        rel_keys,
        vec!["gateway_connects-to_orders", "orders_connects-to_order_events", "vm_1_host_orders"]
    );
    assert_eq!(rels["vm_1_host_orders"], json!({ "type": catalog::HOSTED_ON }));
    assert_eq!(
        rels["orders_connects-to_order_events"]["properties"],
        json!({ "target_endpoint": "orders.created Topic", "protocol": "amqp", "relation_type": "publishes" })
    );

    let orders_reqs = nodes["orders"]["requirements"].as_array().unwrap();
    assert!(orders_reqs.contains(&json!({ "host": { "node": "vm_1", "relationship": "vm_1_host_orders" } })));
    assert!(orders_reqs.contains(&json!({
        "endpoint_link": { "node": "order_events", "relationship": "orders_connects-to_order_events" }
    })));
    assert!(orders_reqs.contains(&json!({ "uses_data": "order_data" })));
    assert!(orders_reqs.contains(&json!({ "uses_backing_data": "orders_config" })));

    assert_eq!(nodes["orders_db"]["type"], json!(catalog::STORAGE_BACKING_SERVICE));
    assert_eq!(nodes["orders_db"]["properties"]["configuration"], json!({ "replicas": 3, "shards": 1 }));
    assert_eq!(nodes["orders_db"]["requirements"], json!([{ "host": "postgres_host" }]));
    assert_eq!(nodes["postgres_host"]["type"], json!(catalog::DBMS));
    assert_eq!(nodes["postgres_host"]["requirements"], json!([{ "host": "vm_1" }]));
    assert!(nodes["vm_1"].get("requirements").is_none());

    assert_eq!(nodes["order_data"]["properties"]["persisted_by"], json!(["orders_db"]));
    assert_eq!(
        nodes["orders_config"]["properties"],
        json!({ "includedData": { "LOG_LEVEL": "info" } })
    );

    let trace = &nodes["RT_get_storefront"];
    assert_eq!(trace["type"], json!(catalog::REQUEST_TRACE));
    assert_eq!(trace["requirements"], json!([{ "external_endpoint": "gateway" }]));
    assert_eq!(
        trace["properties"]["links"],
        json!(["gateway_connects-to_orders", "orders_connects-to_order_events"])
    );
    assert_eq!(
        trace["properties"]["external_endpoint"],
        json!({
            "name": "GET /shop",
            "protocol": "http",
            "port": 443,
            "url_path": "/shop",
            "endpoint_type": "GET",
            "visual": { "x": 10.0, "y": 20.0, "width": 40.0, "height": 16.0 },
        })
    );
}

#[test]
fn repeated_exports_are_byte_identical() {
    let system = System::load(&fixture("shop.yaml")).unwrap();
    let options = ExportOptions::default();
    for format in [DocumentFormat::Yaml, DocumentFormat::Json] {
        let first = encode(&export_system(&system, &options).unwrap(), format).unwrap();
        let second = encode(&export_system(&system, &options).unwrap(), format).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn yaml_document_has_tosca_shape() {
    let system = System::load(&fixture("shop.yaml")).unwrap();
    let yaml = encode(&export_system(&system, &ExportOptions::default()).unwrap(), DocumentFormat::Yaml).unwrap();
    assert!(yaml.starts_with("tosca_definitions_version: tosca_simple_yaml_1_3"));
    assert!(yaml.contains("node_templates:"));
    assert!(yaml.contains("relationship_templates:"));
    let back: Value = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(back["topology_template"]["node_templates"]["gateway"]["type"], json!(catalog::SERVICE));
}

#[test]
fn endpoint_without_path_aborts_export() {
    let mut system = System::new("broken");
    let mut ep = Endpoint::new("e", "api", "REST", "/x", 80);
    ep.path = None;
    system.components.push(Component::new("c", "svc", ComponentKind::Service).with_endpoint(ep));

    let err = export_system(&system, &ExportOptions::default()).unwrap_err();
    assert!(matches!(err, ExportError::MissingProperty { property: "path", .. }));
}

#[test]
fn linked_endpoint_without_port_aborts_export() {
    let mut system = System::new("broken");
    let mut ep = Endpoint::new("e", "api", "REST", "/x", 80);
    ep.port = None;
    let target = Component::new("t", "target", ComponentKind::Service).with_endpoint(ep);
    let source = Component::new("s", "source", ComponentKind::Service);
    let link = Link::new("l", &source, &target.endpoints[0], None).unwrap();
    system.components.extend([source, target]);
    system.links.push(link);

    let err = export_system(&system, &ExportOptions::default()).unwrap_err();
    assert!(matches!(err, ExportError::MissingProperty { property: "port", .. }));
}

#[test]
fn blank_entity_name_is_empty_key() {
    let mut system = System::new("blank");
    system.components.push(Component::new("c", "   ", ComponentKind::Component));
    let err = export_system(&system, &ExportOptions::default()).unwrap_err();
    assert!(matches!(err, ExportError::EmptyKey { .. }));
}

#[test]
fn envelope_overrides_reach_the_document() {
    let system = System::new("env");
    let options = ExportOptions {
        author: Some("platform team".into()),
        version: Some("2.1.0".into()),
        description: Some("nightly".into()),
    };
    let doc = serde_json::to_value(export_system(&system, &options).unwrap()).unwrap();
    assert_eq!(doc["metadata"]["template_author"], json!("platform team"));
    assert_eq!(doc["metadata"]["template_version"], json!("2.1.0"));
    assert_eq!(doc["description"], json!("nightly"));
}
