//! Swagger UI page served at `/swagger-ui.html`.
//!
//! The page is static apart from its settings. Swagger UI itself loads from
//! `asset_base` and reads the aggregated [`SwaggerConfig`](crate::SwaggerConfig),
//! so its service picker lists every backend.

use crate::index::SWAGGER_CONFIG_PATH;

/// Default location of the `swagger-ui-dist` assets.
pub const DEFAULT_ASSET_BASE: &str = "https://unpkg.com/swagger-ui-dist@5.18.2";

/// Renders the Swagger UI page.
#[derive(Debug, Clone)]
pub struct SwaggerUi {
    config_url: String,
    title: String,
    asset_base: String,
}

impl Default for SwaggerUi {
    fn default() -> Self {
        Self::new(SWAGGER_CONFIG_PATH)
    }
}

impl SwaggerUi {
    /// Creates a page reading its configuration from `config_url`.
    pub fn new(config_url: impl Into<String>) -> Self {
        Self {
            config_url: config_url.into(),
            title: "API Gateway".to_string(),
            asset_base: DEFAULT_ASSET_BASE.to_string(),
        }
    }

    /// Sets the page title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Loads the Swagger UI bundle and stylesheet from `base` instead of the
    /// public CDN.
    pub fn asset_base(mut self, base: impl Into<String>) -> Self {
        self.asset_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the configuration URL.
    pub fn config_url(&self) -> &str {
        &self.config_url
    }

    /// Renders the page.
    ///
    /// Authorization is persisted so a bearer token entered once applies to
    /// every service document.
    pub fn html(&self) -> String {
        // JSON string literals are valid JS string literals.
        let config_url = serde_json::Value::String(self.config_url.clone());
        let title = html_escape(&self.title);
        let assets = html_escape(&self.asset_base);

        format!(
            r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<link rel="stylesheet" href="{assets}/swagger-ui.css">
</head>
<body>
<div id="swagger-ui"></div>
<script src="{assets}/swagger-ui-bundle.js"></script>
<script src="{assets}/swagger-ui-standalone-preset.js"></script>
<script>
window.onload = () => {{
  window.ui = SwaggerUIBundle({{
    configUrl: {config_url},
    dom_id: "#swagger-ui",
    deepLinking: true,
    persistAuthorization: true,
    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
    layout: "StandaloneLayout"
  }});
}};
</script>
</body>
</html>
"##
        )
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_page_reads_gateway_index() {
        let ui = SwaggerUi::default();
        assert_eq!(ui.config_url(), "/v3/api-docs/swagger-config");
        let html = ui.html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"configUrl: "/v3/api-docs/swagger-config""#));
        assert!(html.contains("persistAuthorization: true"));
        assert!(html.contains(r##"dom_id: "#swagger-ui""##));
        assert!(html.trim_end().ends_with("</html>"));
        assert!(html.contains(DEFAULT_ASSET_BASE));
    }

    #[test]
    fn test_title_is_escaped_and_assets_relocate() {
        let html = SwaggerUi::default()
            .title("Shop <API>")
            .asset_base("https://static.internal/swagger/")
            .html();
        assert!(html.contains("<title>Shop &lt;API&gt;</title>"));
        assert!(html.contains(r#"href="https://static.internal/swagger/swagger-ui.css""#));
    }
}
