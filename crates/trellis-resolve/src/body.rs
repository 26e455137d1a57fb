//! Request-body decoding directed by the declared `data` field.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

use trellis_core::connection::{HttpRequest, Method};
use trellis_core::error::{ConfigError, ResolveResult};
use trellis_core::field::{FieldDescriptor, FieldKind, RequestEncoding, Shape};
use trellis_core::form::{FormData, FormValue};
use trellis_core::value::ParamValue;

/// Decodes the request body into the value of a `data` field.
///
/// Declaring `data` on a GET handler is a registration mistake and is
/// rejected before any body access. With no declared media type (or JSON)
/// the whole body parses as JSON once, cached on the request; form
/// encodings go through the multi-valued payload with per-field shaping.
pub async fn request_data(
    request: &HttpRequest,
    field: &FieldDescriptor,
) -> ResolveResult<ParamValue> {
    if request.method() == Method::Get {
        return Err(ConfigError::BodyNotAllowed {
            method: request.method().as_str(),
        }
        .into());
    }

    match field.hints().media_type().unwrap_or(RequestEncoding::Json) {
        RequestEncoding::Json => Ok(ParamValue::Json(request.json().await?.clone())),
        encoding => {
            let form = request.form().await?;
            trace!(entries = form.len(), encoding = encoding.media_type(), "decoded form body");
            Ok(shape_form(encoding, form, field))
        }
    }
}

/// Folds form entries into a mapping and applies the multipart shape rules.
///
/// Repeated keys promote single values to lists, mirroring the query
/// parser. Text values that parse as JSON become JSON values — clients may
/// send JSON-encoded scalars or objects inside plain form fields — with the
/// raw string kept on parse failure.
fn shape_form(encoding: RequestEncoding, form: &FormData, field: &FieldDescriptor) -> ParamValue {
    let mut values: IndexMap<String, ParamValue> = IndexMap::new();

    for (name, value) in form.entries() {
        let decoded = match value {
            FormValue::File(file) => ParamValue::File(file.clone()),
            FormValue::Text(text) => match serde_json::from_str::<Value>(text) {
                Ok(json) => ParamValue::Json(json),
                Err(_) => ParamValue::Str(text.clone()),
            },
        };
        match values.get_mut(name) {
            None => {
                values.insert(name.to_string(), decoded);
            }
            Some(ParamValue::List(list)) => list.push(decoded),
            Some(existing) => {
                let first = std::mem::replace(existing, ParamValue::None);
                *existing = ParamValue::List(vec![first, decoded]);
            }
        }
    }

    if encoding == RequestEncoding::Multipart {
        match field.shape() {
            Shape::List => return ParamValue::List(values.into_values().collect()),
            Shape::Singleton if field.kind() == FieldKind::Upload => {
                let mut entries = values.into_iter();
                return match entries.next() {
                    Some((_, first)) => first,
                    None => ParamValue::Map(IndexMap::new()),
                };
            }
            Shape::Singleton => {}
        }
    }
    ParamValue::Map(values)
}
