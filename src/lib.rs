//! archmodel-tosca: export architecture models as TOSCA service templates
//!
//! An architecture model is a graph of components, infrastructure, data
//! aggregates, backing data, endpoints, links, deployment mappings and request
//! traces. One export turns one such graph into one `tosca_simple_yaml_1_3`
//! service template whose node and relationship templates carry readable,
//! collision-free keys derived from entity names.
//!
//! # Features
//! - JSON and YAML model loading with whole-graph validation
//! - Deterministic keys: sanitized names, `_2`/`_3` suffixes on collision
//! - Type catalog with inherited property defaults
//! - YAML or JSON output, batch export of many models in parallel
//!
//! # Quickstart (Library)
//! ```no_run
//! use archmodel_tosca::model::System;
//! use archmodel_tosca::tosca::{encode, export_system, DocumentFormat, ExportOptions};
//!
//! let system = System::load(std::path::Path::new("shop.yaml")).expect("load model");
//! let template = export_system(&system, &ExportOptions::default()).expect("export");
//! println!("{}", encode(&template, DocumentFormat::Yaml).expect("encode"));
//! ```
//!
//! # Quickstart (CLI)
//! ```text
//! archmodel-tosca export shop.yaml -o shop.tosca.yaml
//! archmodel-tosca export --dir models --out-dir out --format json
//! archmodel-tosca inspect shop.yaml
//! ```
pub mod app;
pub mod catalog;
pub mod cli;
pub mod errors;
pub mod keys;
pub mod model;
pub mod tosca;
pub mod utils;
