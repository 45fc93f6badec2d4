//! The interactive documentation page.
//!
//! [`SwaggerUi`] renders a complete HTML page loading Swagger UI from a CDN
//! and pointing it at the JSON document the server exposes separately. The
//! page itself carries no spec payload, so it never goes stale between
//! restarts.

use bytes::Bytes;

/// Swagger UI page configuration and HTML generation.
#[derive(Debug, Clone)]
pub struct SwaggerUi {
    title: String,
    spec_url: String,
    swagger_version: String,
}

impl SwaggerUi {
    /// Default URL of the served OpenAPI document.
    pub const DEFAULT_SPEC_URL: &'static str = "/openapi.json";

    /// Creates a page titled `title` pointing at [`Self::DEFAULT_SPEC_URL`].
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            spec_url: Self::DEFAULT_SPEC_URL.to_string(),
            swagger_version: "5.18.2".to_string(),
        }
    }

    /// Points the page at a different spec URL.
    #[must_use]
    pub fn spec_url(mut self, url: impl Into<String>) -> Self {
        self.spec_url = url.into();
        self
    }

    /// Sets the Swagger UI version loaded from the CDN.
    #[must_use]
    pub fn swagger_version(mut self, version: impl Into<String>) -> Self {
        self.swagger_version = version.into();
        self
    }

    /// Generates the HTML page.
    #[must_use]
    pub fn html(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@{version}/swagger-ui.css" />
    <style>
        body {{
            margin: 0;
            background: #fafafa;
        }}
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@{version}/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {{
            window.ui = SwaggerUIBundle({{
                url: '{spec_url}',
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [SwaggerUIBundle.presets.apis],
                layout: "BaseLayout"
            }});
        }};
    </script>
</body>
</html>"##,
            title = html_escape(&self.title),
            version = self.swagger_version,
            spec_url = html_escape(&self.spec_url),
        )
    }

    /// Generates the HTML page as response body bytes.
    #[must_use]
    pub fn html_bytes(&self) -> Bytes {
        Bytes::from(self.html())
    }
}

/// Escapes HTML metacharacters in operator-supplied strings.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
