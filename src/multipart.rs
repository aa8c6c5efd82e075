use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value as JsonValue};

use crate::{Result, SafeCallError};

/// Field name used for a bare file upload.
pub const DEFAULT_FIELD_NAME: &str = "file";

#[derive(Clone, Debug, PartialEq)]
enum FormValue {
    Text(String),
    File {
        bytes: Bytes,
        file_name: Option<String>,
        mime: Option<String>,
    },
}

/// Multipart form that can be rebuilt for every retry attempt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<(String, FormValue)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((name.into(), FormValue::Text(value.into())));
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        bytes: impl Into<Bytes>,
        file_name: Option<String>,
        mime: Option<String>,
    ) -> Self {
        self.parts.push((
            name.into(),
            FormValue::File {
                bytes: bytes.into(),
                file_name,
                mime,
            },
        ));
        self
    }

    /// Names of the parts, in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(name, _)| name.as_str())
    }

    /// Text value of the first part called `name`.
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|(part, value)| match value {
            FormValue::Text(text) if part == name => Some(text.as_str()),
            _ => None,
        })
    }

    /// Checks every part's mime type without building the form.
    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in &self.parts {
            if let FormValue::File {
                mime: Some(mime), ..
            } = value
            {
                with_mime(Part::bytes(&b""[..]), name, mime)?;
            }
        }
        Ok(())
    }

    pub(crate) fn to_reqwest(&self) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in &self.parts {
            form = match value {
                FormValue::Text(text) => form.text(name.clone(), text.clone()),
                FormValue::File {
                    bytes,
                    file_name,
                    mime,
                } => {
                    // Bytes clones share the buffer across attempts
                    let mut part = Part::stream_with_length(bytes.clone(), bytes.len() as u64);
                    if let Some(file_name) = file_name {
                        part = part.file_name(file_name.clone());
                    }
                    if let Some(mime) = mime {
                        part = with_mime(part, name, mime)?;
                    }
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

fn with_mime(part: Part, name: &str, mime: &str) -> Result<Part> {
    part.mime_str(mime).map_err(|err| {
        SafeCallError::InvalidUpload(format!(
            "invalid mime type '{mime}' for field '{name}': {err}"
        ))
    })
}

/// Payload accepted by [`crate::SafeCallClient::upload`].
#[derive(Clone, Debug, PartialEq)]
pub enum UploadBody {
    /// Pre-built form, sent as is.
    Form(MultipartForm),
    /// Binary content, sent as one part under the upload's field name.
    File {
        bytes: Bytes,
        file_name: Option<String>,
        mime: Option<String>,
    },
    /// Key-value mapping, one text part per non-null entry.
    Fields(Map<String, JsonValue>),
}

impl UploadBody {
    pub fn file(bytes: impl Into<Bytes>) -> Self {
        Self::File {
            bytes: bytes.into(),
            file_name: None,
            mime: None,
        }
    }

    pub fn named_file(
        bytes: impl Into<Bytes>,
        file_name: impl Into<String>,
        mime: Option<String>,
    ) -> Self {
        Self::File {
            bytes: bytes.into(),
            file_name: Some(file_name.into()),
            mime,
        }
    }

    /// Accepts a JSON object as a field mapping; anything else is rejected.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(map) => Ok(Self::Fields(map)),
            other => Err(SafeCallError::InvalidUpload(format!(
                "expected an object of fields, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub(crate) fn into_form(self, field_name: &str) -> Result<MultipartForm> {
        match self {
            Self::Form(form) => Ok(form),
            Self::File {
                bytes,
                file_name,
                mime,
            } => {
                if field_name.trim().is_empty() {
                    return Err(SafeCallError::InvalidUpload(
                        "field name must not be empty".to_owned(),
                    ));
                }
                Ok(MultipartForm::new().file(field_name, bytes, file_name, mime))
            }
            Self::Fields(map) => Ok(fields_to_form(map)),
        }
    }
}

fn fields_to_form(map: Map<String, JsonValue>) -> MultipartForm {
    map.into_iter()
        .fold(MultipartForm::new(), |form, (key, value)| match value {
            JsonValue::Null => form,
            JsonValue::String(text) => form.text(key, text),
            other => form.text(key, other.to_string()),
        })
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
