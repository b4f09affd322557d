//! Process-wide resource attributes attached to every exported item.

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};

use crate::config::ResourceAttr;

pub const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";
pub const LIBRARY_LANGUAGE: &str = "library.language";

/// Build the resource for this process. Extra attributes are appended last
/// and win over the built-in ones on key collisions.
pub fn build_resource(service_name: &str, environment: &str, extra: &[ResourceAttr]) -> Resource {
    let mut attributes = vec![
        KeyValue::new(SERVICE_NAME, service_name.to_string()),
        KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        KeyValue::new(DEPLOYMENT_ENVIRONMENT, environment.to_string()),
        KeyValue::new(LIBRARY_LANGUAGE, "rust"),
    ];
    attributes.extend(
        extra
            .iter()
            .map(|attr| KeyValue::new(attr.key.clone(), attr.value.clone())),
    );

    Resource::new(attributes)
}
