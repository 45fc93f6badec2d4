//! OpenAPI 3.1 document model and registry-driven generation.
//!
//! The types here model the subset of the OpenAPI 3.1 object graph the
//! registry can populate. Everything serializes with OpenAPI's exact key
//! casing via serde renames; optional pieces are skipped when absent so the
//! emitted JSON stays minimal.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use spire_registry::{HttpMethod, OperationEntry, OperationRegistry};
use spire_stream::{NdjsonEncoder, SseEncoder};

/// Name of the bearer-token security scheme registered in `components`.
pub const BEARER_AUTH: &str = "bearerAuth";

/// Root OpenAPI 3.1 document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApi {
    /// OpenAPI specification version.
    pub openapi: String,
    /// API metadata.
    pub info: Info,
    /// Server list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    /// Path items, keyed by route, in registration order.
    pub paths: IndexMap<String, PathItem>,
    /// Reusable components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    /// Tags used by the operations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

/// API metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    /// API title.
    pub title: String,
    /// API version.
    pub version: String,
    /// API description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A server hosting the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// Server URL.
    pub url: String,
    /// Server description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Operations available on a single route.
///
/// Only the methods the registry accepts are modeled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    /// GET operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    /// POST operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    /// PUT operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    /// DELETE operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
}

/// A single documented operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Unique operation identifier, derived from the route.
    #[serde(rename = "operationId")]
    pub operation_id: String,
    /// Short human-readable summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Tags for grouping in documentation UIs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Request body description.
    #[serde(rename = "requestBody")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code (or `default`).
    pub responses: IndexMap<String, Response>,
    /// Security requirements; empty means the operation is open.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
    /// Marks operations whose response is a frame stream.
    #[serde(rename = "x-stream")]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

/// A request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    /// Body description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the body is required.
    pub required: bool,
    /// Body content, keyed by media type.
    pub content: IndexMap<String, MediaType>,
}

/// A media type entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaType {
    /// Payload schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// A response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Response description.
    pub description: String,
    /// Response content, keyed by media type.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
}

/// Reusable components.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Components {
    /// Security schemes, keyed by name.
    #[serde(rename = "securitySchemes")]
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

/// A security scheme definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityScheme {
    /// Scheme type (e.g. `http`).
    #[serde(rename = "type")]
    pub scheme_type: String,
    /// HTTP auth scheme (e.g. `bearer`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Bearer token format hint.
    #[serde(rename = "bearerFormat")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
    /// Scheme description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A security requirement: scheme name to required scopes.
pub type SecurityRequirement = HashMap<String, Vec<String>>;

/// A documentation tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
    /// Tag description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// JSON Schema type keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// String type.
    String,
    /// Number type.
    Number,
    /// Integer type.
    Integer,
    /// Boolean type.
    Boolean,
    /// Array type.
    Array,
    /// Object type.
    Object,
}

/// A JSON Schema fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Schema type keyword.
    #[serde(rename = "type")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    /// Schema description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Schema {
    /// Creates an object schema.
    #[must_use]
    pub fn object() -> Self {
        Self {
            schema_type: Some(SchemaType::Object),
            description: None,
        }
    }

    /// Creates a string schema.
    #[must_use]
    pub fn string() -> Self {
        Self {
            schema_type: Some(SchemaType::String),
            description: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Synthesizes an [`OpenApi`] document from an [`OperationRegistry`].
///
/// # Example
///
/// ```rust,ignore
/// use spire_docs::OpenApiGenerator;
///
/// let document = OpenApiGenerator::new("Spire API", "0.1.0")
///     .description("Operations platform")
///     .server("https://api.example.com")
///     .generate(&registry);
/// ```
#[derive(Debug, Clone)]
pub struct OpenApiGenerator {
    title: String,
    version: String,
    description: Option<String>,
    servers: Vec<Server>,
}

impl OpenApiGenerator {
    /// Creates a generator for an API with the given title and version.
    #[must_use]
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            description: None,
            servers: Vec::new(),
        }
    }

    /// Sets the API description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a server URL.
    #[must_use]
    pub fn server(mut self, url: impl Into<String>) -> Self {
        self.servers.push(Server {
            url: url.into(),
            description: None,
        });
        self
    }

    /// Generates the document from the registry's entries.
    ///
    /// Paths and tags appear in registration order. The `bearerAuth` scheme
    /// is emitted in `components` only when at least one entry requires
    /// authentication.
    #[must_use]
    pub fn generate(&self, registry: &OperationRegistry) -> OpenApi {
        let mut paths: IndexMap<String, PathItem> = IndexMap::new();
        let mut tag_names: Vec<String> = Vec::new();
        let mut any_secured = false;

        for entry in registry.entries() {
            let secured = entry.auth_policy().requires_authentication();
            any_secured |= secured;

            if !tag_names.iter().any(|name| name == entry.group()) {
                tag_names.push(entry.group().to_string());
            }

            let operation = document_operation(entry, secured);
            let item = paths.entry(entry.route().to_string()).or_default();
            match entry.method() {
                HttpMethod::Get => item.get = Some(operation),
                HttpMethod::Post => item.post = Some(operation),
                HttpMethod::Put => item.put = Some(operation),
                HttpMethod::Delete => item.delete = Some(operation),
            }
        }

        let components = any_secured.then(|| {
            let mut security_schemes = IndexMap::new();
            security_schemes.insert(
                BEARER_AUTH.to_string(),
                SecurityScheme {
                    scheme_type: "http".to_string(),
                    scheme: Some("bearer".to_string()),
                    bearer_format: Some("JWT".to_string()),
                    description: Some("JWT bearer token authentication".to_string()),
                },
            );
            Components { security_schemes }
        });

        OpenApi {
            openapi: "3.1.0".to_string(),
            info: Info {
                title: self.title.clone(),
                version: self.version.clone(),
                description: self.description.clone(),
            },
            servers: self.servers.clone(),
            paths,
            components,
            tags: tag_names
                .into_iter()
                .map(|name| Tag {
                    name,
                    description: None,
                })
                .collect(),
        }
    }
}

/// Documents one registry entry.
fn document_operation(entry: &OperationEntry, secured: bool) -> Operation {
    let request_schema = Schema::object().with_description(short_type_name(entry.request_type()));

    let request_body = match entry.method() {
        HttpMethod::Post | HttpMethod::Put => {
            let mut content = IndexMap::new();
            content.insert(
                "application/json".to_string(),
                MediaType {
                    schema: Some(request_schema),
                },
            );
            Some(RequestBody {
                description: None,
                required: true,
                content,
            })
        }
        HttpMethod::Get | HttpMethod::Delete => None,
    };

    let mut responses = IndexMap::new();
    if entry.is_stream() {
        let mut content = IndexMap::new();
        content.insert(NdjsonEncoder::CONTENT_TYPE.to_string(), MediaType::default());
        content.insert(SseEncoder::CONTENT_TYPE.to_string(), MediaType::default());
        responses.insert(
            "200".to_string(),
            Response {
                description: "Frame stream ending with exactly one terminal frame".to_string(),
                content,
            },
        );
    } else {
        let mut content = IndexMap::new();
        content.insert(
            "application/json".to_string(),
            MediaType {
                schema: Some(Schema::object()),
            },
        );
        responses.insert(
            "200".to_string(),
            Response {
                description: "Successful response".to_string(),
                content,
            },
        );
    }
    let mut error_content = IndexMap::new();
    error_content.insert(
        "application/json".to_string(),
        MediaType {
            schema: Some(Schema::object().with_description("Error envelope")),
        },
    );
    responses.insert(
        "default".to_string(),
        Response {
            description: "Error envelope".to_string(),
            content: error_content,
        },
    );

    let security = if secured {
        let mut requirement = SecurityRequirement::new();
        requirement.insert(BEARER_AUTH.to_string(), Vec::new());
        vec![requirement]
    } else {
        Vec::new()
    };

    Operation {
        operation_id: operation_id(entry.route()),
        summary: entry.summary().map(ToString::to_string),
        tags: vec![entry.group().to_string()],
        request_body,
        responses,
        security,
        stream: entry.is_stream(),
    }
}

/// Derives a unique `operationId` from a route path.
///
/// `/tag/create` becomes `tag_create`.
fn operation_id(route: &str) -> String {
    route
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .replace('-', "_")
}

/// Strips the module path from a fully qualified type name.
fn short_type_name(full: &'static str) -> &'static str {
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use spire_core::{DispatchError, Empty, NoContent, RequestContext};
    use spire_registry::{AuthPolicy, RegistryBuilder};
    use spire_stream::{CancelToken, StreamOperation, ValueStream};

    #[derive(Debug, serde::Deserialize)]
    struct HelloRequest {
        name: String,
    }

    #[derive(Debug, serde::Serialize)]
    struct HelloResponse {
        greeting: String,
    }

    struct HelloOperation;

    impl spire_core::Operation<HelloRequest, HelloResponse> for HelloOperation {
        async fn handle(
            &self,
            _ctx: &RequestContext,
            request: HelloRequest,
        ) -> Result<HelloResponse, DispatchError> {
            Ok(HelloResponse {
                greeting: format!("Hello, {}!", request.name),
            })
        }
    }

    struct TagCreateOperation;

    impl spire_core::Operation<Empty, NoContent> for TagCreateOperation {
        async fn handle(
            &self,
            _ctx: &RequestContext,
            _request: Empty,
        ) -> Result<NoContent, DispatchError> {
            Ok(NoContent {})
        }
    }

    struct HelloStreamOperation;

    impl StreamOperation<Empty> for HelloStreamOperation {
        async fn stream(
            &self,
            _ctx: &RequestContext,
            _request: Empty,
            _cancel: CancelToken,
        ) -> Result<ValueStream, DispatchError> {
            Ok(futures_util::stream::iter(
                "Hi".chars()
                    .map(|c| Ok(serde_json::json!({ "char": c.to_string() })))
                    .collect::<Vec<_>>(),
            )
            .boxed())
        }
    }

    fn registry() -> OperationRegistry {
        RegistryBuilder::new()
            .operation(
                OperationEntry::unary(
                    "/hello",
                    HttpMethod::Post,
                    "greetings",
                    AuthPolicy::None,
                    HelloOperation,
                )
                .with_summary("Greets the caller"),
            )
            .operation(OperationEntry::unary(
                "/tag/create",
                HttpMethod::Post,
                "tags",
                AuthPolicy::User,
                TagCreateOperation,
            ))
            .operation(OperationEntry::stream(
                "/hello/stream",
                HttpMethod::Post,
                "greetings",
                AuthPolicy::None,
                HelloStreamOperation,
            ))
            .operation(OperationEntry::unary(
                "/tags",
                HttpMethod::Get,
                "tags",
                AuthPolicy::User,
                TagCreateOperation,
            ))
            .build()
            .expect("no duplicates")
    }

    fn document() -> OpenApi {
        OpenApiGenerator::new("Spire API", "0.1.0").generate(&registry())
    }

    // ==================== Generation Tests ====================

    #[test]
    fn test_paths_follow_registration_order() {
        let doc = document();
        let routes: Vec<&String> = doc.paths.keys().collect();
        assert_eq!(routes, ["/hello", "/tag/create", "/hello/stream", "/tags"]);
    }

    #[test]
    fn test_operation_id_is_derived_from_route() {
        let doc = document();
        let create = doc.paths["/tag/create"].post.as_ref().expect("post op");
        assert_eq!(create.operation_id, "tag_create");
        let stream = doc.paths["/hello/stream"].post.as_ref().expect("post op");
        assert_eq!(stream.operation_id, "hello_stream");
    }

    #[test]
    fn test_protected_entries_require_bearer_auth() {
        let doc = document();

        let create = doc.paths["/tag/create"].post.as_ref().expect("post op");
        assert_eq!(create.security.len(), 1);
        assert!(create.security[0].contains_key(BEARER_AUTH));

        let hello = doc.paths["/hello"].post.as_ref().expect("post op");
        assert!(hello.security.is_empty());

        let schemes = &doc.components.expect("components").security_schemes;
        let bearer = schemes.get(BEARER_AUTH).expect("bearerAuth scheme");
        assert_eq!(bearer.scheme_type, "http");
        assert_eq!(bearer.scheme.as_deref(), Some("bearer"));
        assert_eq!(bearer.bearer_format.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_stream_entries_carry_stream_marker_and_content_types() {
        let doc = document();
        let stream = doc.paths["/hello/stream"].post.as_ref().expect("post op");
        assert!(stream.stream);

        let ok = stream.responses.get("200").expect("200 response");
        assert!(ok.content.contains_key("application/x-ndjson"));
        assert!(ok.content.contains_key("text/event-stream"));

        let json = serde_json::to_string(&doc).expect("serializes");
        assert!(json.contains(r#""x-stream":true"#));
    }

    #[test]
    fn test_unary_entries_document_json_bodies() {
        let doc = document();

        let hello = doc.paths["/hello"].post.as_ref().expect("post op");
        assert!(!hello.stream);
        let body = hello.request_body.as_ref().expect("request body");
        assert!(body.required);
        assert!(body.content.contains_key("application/json"));
        let ok = hello.responses.get("200").expect("200 response");
        assert!(ok.content.contains_key("application/json"));

        let list = doc.paths["/tags"].get.as_ref().expect("get op");
        assert!(list.request_body.is_none());
    }

    #[test]
    fn test_request_schema_names_the_request_type() {
        let doc = document();
        let hello = doc.paths["/hello"].post.as_ref().expect("post op");
        let body = hello.request_body.as_ref().expect("request body");
        let schema = body.content["application/json"]
            .schema
            .as_ref()
            .expect("schema");
        assert_eq!(schema.description.as_deref(), Some("HelloRequest"));
    }

    #[test]
    fn test_tags_collected_in_first_appearance_order() {
        let doc = document();
        let names: Vec<&str> = doc.tags.iter().map(|tag| tag.name.as_str()).collect();
        assert_eq!(names, ["greetings", "tags"]);
    }

    #[test]
    fn test_summary_is_carried() {
        let doc = document();
        let hello = doc.paths["/hello"].post.as_ref().expect("post op");
        assert_eq!(hello.summary.as_deref(), Some("Greets the caller"));
    }

    #[test]
    fn test_open_registry_omits_components() {
        let registry = RegistryBuilder::new()
            .operation(OperationEntry::unary(
                "/hello",
                HttpMethod::Post,
                "greetings",
                AuthPolicy::None,
                HelloOperation,
            ))
            .build()
            .expect("no duplicates");
        let doc = OpenApiGenerator::new("Open API", "0.1.0").generate(&registry);

        assert!(doc.components.is_none());
        let json = serde_json::to_string(&doc).expect("serializes");
        assert!(!json.contains("securitySchemes"));
    }

    #[test]
    fn test_document_serializes_spec_casing() {
        let doc = OpenApiGenerator::new("Spire API", "0.1.0")
            .description("Operations platform")
            .server("https://api.example.com")
            .generate(&registry());
        let value = serde_json::to_value(&doc).expect("serializes");

        assert_eq!(
            value.pointer("/paths/~1tag~1create/post/operationId"),
            Some(&serde_json::json!("tag_create"))
        );
        assert!(value
            .pointer("/paths/~1hello/post/requestBody")
            .is_some());
        assert_eq!(
            value.pointer("/components/securitySchemes/bearerAuth/bearerFormat"),
            Some(&serde_json::json!("JWT"))
        );
        assert_eq!(
            value.pointer("/servers/0/url"),
            Some(&serde_json::json!("https://api.example.com"))
        );
    }

    // ==================== Helper Tests ====================

    #[test]
    fn test_operation_id_flattens_segments() {
        assert_eq!(operation_id("/hello"), "hello");
        assert_eq!(operation_id("/tag/create"), "tag_create");
        assert_eq!(operation_id("/tag-labels/list"), "tag_labels_list");
    }

    #[test]
    fn test_short_type_name_strips_module_path() {
        assert_eq!(short_type_name("crate::api::HelloRequest"), "HelloRequest");
        assert_eq!(short_type_name("Empty"), "Empty");
    }

    #[test]
    fn test_schema_constructors() {
        let schema = Schema::object().with_description("payload");
        assert_eq!(schema.schema_type, Some(SchemaType::Object));
        assert_eq!(schema.description.as_deref(), Some("payload"));
        assert_eq!(Schema::string().schema_type, Some(SchemaType::String));
    }
}
