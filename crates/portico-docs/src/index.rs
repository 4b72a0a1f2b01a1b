//! Aggregated documentation index.

use crate::error::{DocsError, DocsResult};
use crate::API_DOCS_PATH;
use portico_core::ServiceCatalog;
use serde::{Deserialize, Serialize};

/// Public path of the Swagger UI configuration document.
pub const SWAGGER_CONFIG_PATH: &str = "/v3/api-docs/swagger-config";

/// Returns the gateway path under which a service's document is published.
pub fn service_docs_path(service_id: &str) -> String {
    format!("/{service_id}{API_DOCS_PATH}")
}

/// One entry of the Swagger UI service picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwaggerUrl {
    /// Display name.
    pub name: String,
    /// Gateway path of the document.
    pub url: String,
}

/// Swagger UI configuration listing every service's document.
///
/// Served publicly at [`SWAGGER_CONFIG_PATH`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwaggerConfig {
    /// Where Swagger UI fetches this configuration from.
    pub config_url: String,
    /// One entry per service, in catalog order.
    pub urls: Vec<SwaggerUrl>,
    /// Empty to disable the online validator badge.
    pub validator_url: String,
}

impl SwaggerConfig {
    /// Builds the index from the service catalog.
    pub fn from_catalog(catalog: &ServiceCatalog) -> Self {
        Self {
            config_url: SWAGGER_CONFIG_PATH.to_string(),
            urls: catalog
                .iter()
                .map(|svc| SwaggerUrl {
                    name: svc.name().to_string(),
                    url: service_docs_path(svc.id()),
                })
                .collect(),
            validator_url: String::new(),
        }
    }

    /// Serializes the index.
    pub fn to_json(&self) -> DocsResult<String> {
        serde_json::to_string(self).map_err(DocsError::Serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_lists_services_in_order() {
        let catalog = ServiceCatalog::new(["Orders-Service", "member-service"]).unwrap();
        let config = SwaggerConfig::from_catalog(&catalog);

        assert_eq!(config.urls.len(), 2);
        assert_eq!(config.urls[0].name, "Orders-Service");
        assert_eq!(config.urls[0].url, "/orders-service/v3/api-docs");
        assert_eq!(config.urls[1].url, "/member-service/v3/api-docs");
    }

    #[test]
    fn test_index_json_uses_camel_case() {
        let catalog = ServiceCatalog::new(["a"]).unwrap();
        let json = SwaggerConfig::from_catalog(&catalog).to_json().unwrap();
        assert!(json.contains("\"configUrl\":\"/v3/api-docs/swagger-config\""));
        assert!(json.contains("\"validatorUrl\":\"\""));
    }
}
