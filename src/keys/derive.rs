//! Composite keys for derived entities and the endpoint descriptor rule.
//!
//! Name fragments are sanitized; connectors (`_connects-to_`, `_host_`, `RT_`)
//! are kept verbatim. The result still has to go through a [`super::KeyManager`].
use serde::Serialize;
use std::fmt;

use super::sanitize_key;
use crate::errors::ExportError;

pub const CONNECTS_TO: &str = "connects-to";
pub const HOST: &str = "host";
pub const REQUEST_TRACE_PREFIX: &str = "RT";

/// `<source>_connects-to_<target owner>`
///
/// # Errors
/// `EmptyKey` when either name is blank.
pub fn link_key(source_name: &str, target_owner_name: &str) -> Result<String, ExportError> {
    Ok(format!("{}_{CONNECTS_TO}_{}", sanitize_key(source_name)?, sanitize_key(target_owner_name)?))
}

/// `<infrastructure>_host_<deployed>`
///
/// # Errors
/// `EmptyKey` when either name is blank.
pub fn deployment_mapping_key(infrastructure_name: &str, deployed_name: &str) -> Result<String, ExportError> {
    Ok(format!("{}_{HOST}_{}", sanitize_key(infrastructure_name)?, sanitize_key(deployed_name)?))
}

/// `RT_<endpoint type>_<external endpoint name>`
///
/// # Errors
/// `EmptyKey` when either part is blank.
pub fn request_trace_key(endpoint_type: &str, endpoint_name: &str) -> Result<String, ExportError> {
    Ok(format!(
        "{REQUEST_TRACE_PREFIX}_{}_{}",
        sanitize_key(endpoint_type)?,
        sanitize_key(endpoint_name)?
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Request/response transport.
    Http,
    /// Message-queue transport.
    Amqp,
}

impl Protocol {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Amqp => "amqp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable endpoint name plus the transport it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub descriptor: String,
    pub protocol: Protocol,
}

/// True when `endpoint_type` contains "topic", ignoring case.
#[must_use]
pub fn is_topic(endpoint_type: &str) -> bool {
    endpoint_type.to_lowercase().contains("topic")
}

/// Topics are named subject first (`<path> <type>`, message queue);
/// everything else verb first (`<type> <path>`, request/response).
#[must_use]
pub fn describe_endpoint(endpoint_type: &str, path: &str) -> EndpointDescriptor {
    if is_topic(endpoint_type) {
        EndpointDescriptor { descriptor: format!("{path} {endpoint_type}"), protocol: Protocol::Amqp }
    } else {
        EndpointDescriptor { descriptor: format!("{endpoint_type} {path}"), protocol: Protocol::Http }
    }
}
