//! Single-field extraction from connection parameter sources.

use indexmap::IndexMap;

use trellis_core::connection::Connection;
use trellis_core::error::{ResolveResult, ValidationError};
use trellis_core::field::FieldDescriptor;
use trellis_core::value::ParamValue;

/// Resolves one non-reserved field from the connection's parameter sources.
///
/// Precedence:
/// 1. path parameters, exact name match
/// 2. query parameters, exact name match
/// 3. the first declared alias in fixed query → header → cookie order —
///    only that one source is consulted, even if more aliases are declared
/// 4. the declared default, or the absent-value sentinel
///
/// A required field whose alias is missing from its source, with no usable
/// default, fails with a validation error naming the alias.
pub fn connection_param(
    connection: &Connection,
    field_name: &str,
    field: &FieldDescriptor,
    query_params: &IndexMap<String, ParamValue>,
    header_params: &IndexMap<String, String>,
) -> ResolveResult<ParamValue> {
    if let Some(value) = connection.path_params().get(field_name) {
        return Ok(ParamValue::Str(value.clone()));
    }
    if let Some(value) = query_params.get(field_name) {
        return Ok(value.clone());
    }

    let hints = field.hints();
    let aliased = if let Some(alias) = truthy(hints.query_alias()) {
        Some((alias, query_params.get(alias).cloned()))
    } else if let Some(alias) = truthy(hints.header_alias()) {
        // Header names are stored lowercase on the connection.
        let found = header_params
            .get(&alias.to_ascii_lowercase())
            .map(|value| ParamValue::Str(value.clone()));
        Some((alias, found))
    } else if let Some(alias) = truthy(hints.cookie_alias()) {
        let found = connection
            .cookies()
            .get(alias)
            .map(|value| ParamValue::Str(value.clone()));
        Some((alias, found))
    } else {
        None
    };

    if let Some((alias, found)) = aliased {
        match found {
            Some(value) => return Ok(value),
            None => {
                if hints.is_required() && field.default().is_none() {
                    return Err(ValidationError::MissingParameter {
                        name: alias.to_string(),
                    }
                    .into());
                }
            }
        }
    }

    Ok(field.default().cloned().unwrap_or(ParamValue::None))
}

/// An empty alias string counts as undeclared.
fn truthy(alias: Option<&str>) -> Option<&str> {
    alias.filter(|alias| !alias.is_empty())
}
