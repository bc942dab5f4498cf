//! Specification documents and the artifact kinds they are decoded from.

use crate::error::{Error, ErrorKind, Result};
use crate::links::LinkRewriter;
use crate::source::SpecSource;
use derive_more::Display;
use exn::ResultExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// A JSON object with no assumed structure.
pub type JsonObject = Map<String, Value>;

/// The five document types served for an identifier.
///
/// `ApiSpec`, `OpenApiSpec` and `ODataSpec` are all decoded from the same
/// `apiSpec.json` artifact, which is why cache keys also carry a field name.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    ApiSpec,
    OpenApiSpec,
    ODataSpec,
    AsyncApiSpec,
    Content,
}

impl Kind {
    /// Artifact file read from the blob store, relative to the identifier.
    pub fn file_name(self) -> &'static str {
        match self {
            Kind::ApiSpec | Kind::OpenApiSpec | Kind::ODataSpec => "apiSpec.json",
            Kind::AsyncApiSpec => "asyncApiSpec.json",
            Kind::Content => "content.json",
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            Kind::ApiSpec => "apiSpec",
            Kind::OpenApiSpec => "openApiSpec",
            Kind::ODataSpec => "odataSpec",
            Kind::AsyncApiSpec => "asyncApiSpec",
            Kind::Content => "content",
        }
    }

    /// Composite cache key: `<id>/<file name>/<field name>`.
    ///
    /// ```
    /// use speccy_spec::Kind;
    ///
    /// assert_eq!(Kind::ODataSpec.cache_key("orders"), "orders/apiSpec.json/odataSpec");
    /// assert_eq!(Kind::Content.cache_key("orders"), "orders/content.json/content");
    /// ```
    pub fn cache_key(self, id: &str) -> String {
        format!("{id}/{}/{}", self.file_name(), self.field_name())
    }
}

impl FromStr for Kind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s.chars().filter(|c| !matches!(c, '-' | '_')).collect::<String>().to_lowercase();
        match normalized.as_str() {
            "api" | "apispec" => Ok(Kind::ApiSpec),
            "openapi" | "openapispec" => Ok(Kind::OpenApiSpec),
            "odata" | "odataspec" => Ok(Kind::ODataSpec),
            "asyncapi" | "asyncapispec" => Ok(Kind::AsyncApiSpec),
            "content" => Ok(Kind::Content),
            _ => exn::bail!(ErrorKind::UnknownKind(s.to_string())),
        }
    }
}

/// A document that can be decoded from a blob-store artifact.
///
/// Implementors are plain data: they must survive a trip through the cache
/// encoding unchanged.
pub trait Artifact: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: Kind;

    /// Decode an artifact body for the identifier `id`.
    fn decode(body: &[u8], id: &str, links: &LinkRewriter) -> Result<Self>;

    /// Ask a [`SpecSource`] for this kind of document.
    fn from_source<'a>(source: &'a dyn SpecSource, id: &'a str) -> BoxFuture<'a, Result<Option<Self>>>;
}

fn decode_object(kind: Kind, body: &[u8]) -> Result<JsonObject> {
    serde_json::from_slice(body).or_raise(|| ErrorKind::Decode(kind))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    pub raw: JsonObject,
}

impl Artifact for ApiSpec {
    const KIND: Kind = Kind::ApiSpec;

    fn decode(body: &[u8], _id: &str, _links: &LinkRewriter) -> Result<Self> {
        Ok(Self { raw: decode_object(Self::KIND, body)? })
    }

    fn from_source<'a>(source: &'a dyn SpecSource, id: &'a str) -> BoxFuture<'a, Result<Option<Self>>> {
        source.api_spec(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenApiSpec {
    pub raw: JsonObject,
}

impl Artifact for OpenApiSpec {
    const KIND: Kind = Kind::OpenApiSpec;

    fn decode(body: &[u8], _id: &str, _links: &LinkRewriter) -> Result<Self> {
        Ok(Self { raw: decode_object(Self::KIND, body)? })
    }

    fn from_source<'a>(source: &'a dyn SpecSource, id: &'a str) -> BoxFuture<'a, Result<Option<Self>>> {
        source.open_api_spec(id)
    }
}

/// OData metadata, kept verbatim.
///
/// Both the XML metadata document and the JSON `$metadata` format are
/// accepted. Neither is restructured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ODataSpec {
    pub raw: String,
}

impl ODataSpec {
    /// Whether the metadata looks like the XML format.
    pub fn is_xml(&self) -> bool {
        self.raw.trim_start().starts_with('<')
    }
}

impl Artifact for ODataSpec {
    const KIND: Kind = Kind::ODataSpec;

    fn decode(body: &[u8], _id: &str, _links: &LinkRewriter) -> Result<Self> {
        let raw = std::str::from_utf8(body).or_raise(|| ErrorKind::Decode(Self::KIND))?;
        let spec = Self { raw: raw.to_string() };
        if !spec.is_xml() {
            // Not XML, so it had better be JSON. Only checked, never kept.
            serde_json::from_str::<Value>(raw).or_raise(|| ErrorKind::Decode(Self::KIND))?;
        }
        Ok(spec)
    }

    fn from_source<'a>(source: &'a dyn SpecSource, id: &'a str) -> BoxFuture<'a, Result<Option<Self>>> {
        source.odata_spec(id)
    }
}

/// An explicit `null` decodes to the zero value, same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Like [`null_as_default`], for `null` pages inside the list too.
fn null_documents_as_default<'de, D>(deserializer: D) -> std::result::Result<Vec<Document>, D::Error>
where
    D: Deserializer<'de>,
{
    let docs: Option<Vec<Option<Document>>> = Option::deserialize(deserializer)?;
    Ok(docs.unwrap_or_default().into_iter().map(Option::unwrap_or_default).collect())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AsyncApiSpecData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub asyncapi: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub channels: JsonObject,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AsyncApiSpec {
    pub raw: JsonObject,
    pub data: AsyncApiSpecData,
}

impl Artifact for AsyncApiSpec {
    const KIND: Kind = Kind::AsyncApiSpec;

    fn decode(body: &[u8], _id: &str, _links: &LinkRewriter) -> Result<Self> {
        let raw = decode_object(Self::KIND, body)?;
        let data = serde_json::from_value(Value::Object(raw.clone())).or_raise(|| ErrorKind::Decode(Self::KIND))?;
        Ok(Self { raw, data })
    }

    fn from_source<'a>(source: &'a dyn SpecSource, id: &'a str) -> BoxFuture<'a, Result<Option<Self>>> {
        source.async_api_spec(id)
    }
}

/// One page of documentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    #[serde(deserialize_with = "null_as_default")]
    pub order: String,
    /// Original, unrewritten source text.
    #[serde(deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub internal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentData {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_documents_as_default")]
    pub docs: Vec<Document>,
}

/// A documentation bundle.
///
/// `raw` is what consumers render, so every `docs[].source` in it has had its
/// asset references rewritten to absolute URLs. `data.docs[].source` keeps the
/// text exactly as it was stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub raw: JsonObject,
    pub data: ContentData,
}

impl Artifact for Content {
    const KIND: Kind = Kind::Content;

    fn decode(body: &[u8], id: &str, links: &LinkRewriter) -> Result<Self> {
        let mut raw = decode_object(Self::KIND, body)?;
        let data = serde_json::from_value(Value::Object(raw.clone())).or_raise(|| ErrorKind::Decode(Self::KIND))?;
        if let Some(Value::Array(docs)) = raw.get_mut("docs") {
            for doc in docs.iter_mut().filter_map(Value::as_object_mut) {
                if let Some(Value::String(source)) = doc.get_mut("source") {
                    *source = links.rewrite(id, source).into_owned();
                }
            }
        }
        Ok(Self { raw, data })
    }

    fn from_source<'a>(source: &'a dyn SpecSource, id: &'a str) -> BoxFuture<'a, Result<Option<Self>>> {
        source.content(id)
    }
}
