//! # Spire Docs
//!
//! OpenAPI 3.1 synthesis over the operation registry.
//!
//! [`OpenApiGenerator`] reflects over the registry's entries and produces a
//! document with one path item per route: `operationId` derived from the
//! route, tags taken from the entry's group, a `bearerAuth` security
//! requirement wherever the policy demands authentication, and an `x-stream`
//! marker plus the NDJSON and SSE content types on streaming entries.
//!
//! [`SwaggerUi`] renders the interactive documentation page served next to
//! the JSON document.

#![doc(html_root_url = "https://docs.rs/spire-docs/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod openapi;
mod swagger;

pub use openapi::{
    Components, Info, MediaType, OpenApi, OpenApiGenerator, Operation, PathItem, RequestBody,
    Response, Schema, SchemaType, SecurityRequirement, SecurityScheme, Server, Tag, BEARER_AUTH,
};
pub use swagger::SwaggerUi;
