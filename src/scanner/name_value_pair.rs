//! Injectable parameter locations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in a message a parameter was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    UrlPath,
    Query,
    Cookie,
    Header,
    PostData,
    Json,
    MultipartParam,
    MultipartFileName,
    MultipartFileContentType,
    MultipartFileParam,
    ODataId,
    ODataFilter,
    Custom,
    UserDefined,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::UrlPath => "url_path",
            ParamKind::Query => "query",
            ParamKind::Cookie => "cookie",
            ParamKind::Header => "header",
            ParamKind::PostData => "post_data",
            ParamKind::Json => "json",
            ParamKind::MultipartParam => "multipart_param",
            ParamKind::MultipartFileName => "multipart_file_name",
            ParamKind::MultipartFileContentType => "multipart_file_content_type",
            ParamKind::MultipartFileParam => "multipart_file_param",
            ParamKind::ODataId => "odata_id",
            ParamKind::ODataFilter => "odata_filter",
            ParamKind::Custom => "custom",
            ParamKind::UserDefined => "user_defined",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One injectable location inside a message.
///
/// `position` is the ordinal assigned by the variant that extracted the pair
/// and is the only thing used to find the occurrence again when injecting.
/// Name and value are informational once a plugin has started rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameValuePair {
    kind: ParamKind,
    name: Option<String>,
    value: Option<String>,
    position: usize,
}

impl NameValuePair {
    pub fn new(
        kind: ParamKind,
        name: impl Into<String>,
        value: impl Into<String>,
        position: usize,
    ) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            value: Some(value.into()),
            position,
        }
    }

    /// Pair whose name or value may be missing (malformed fragments)
    pub fn with_optional(
        kind: ParamKind,
        name: Option<String>,
        value: Option<String>,
        position: usize,
    ) -> Self {
        Self {
            kind,
            name,
            value,
            position,
        }
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_kind(&mut self, kind: ParamKind) {
        self.kind = kind;
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

impl fmt::Display for NameValuePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}={} @{}",
            self.kind,
            self.name.as_deref().unwrap_or("<none>"),
            self.value.as_deref().unwrap_or("<none>"),
            self.position
        )
    }
}
