//! Query-string parsing with list promotion and boolean coercion.

use indexmap::IndexMap;

use trellis_core::form::decode_component;
use trellis_core::value::ParamValue;

/// Parses a raw query string into an ordered parameter mapping.
///
/// Repeated keys promote single values to lists in encounter order; the
/// exact literals `true`/`True`/`false`/`False` coerce to booleans. Blank
/// values are kept, and a bare key counts as a blank value. A malformed
/// query yields an empty mapping — absent query parameters are tolerated
/// silently by the rest of the system.
pub fn parse_query(raw: &[u8]) -> IndexMap<String, ParamValue> {
    try_parse_query(raw).unwrap_or_default()
}

fn try_parse_query(raw: &[u8]) -> Option<IndexMap<String, ParamValue>> {
    // Query strings arrive as raw bytes; latin-1 maps every byte to the
    // matching char so percent-decoding sees the original octets.
    let text: String = raw.iter().map(|&b| b as char).collect();

    let mut params = IndexMap::new();
    for pair in text.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key)?;
        let value = coerce_literal(decode_component(value)?);

        match params.get_mut(&key) {
            None => {
                params.insert(key, value);
            }
            Some(ParamValue::List(list)) => list.push(value),
            Some(existing) => {
                let first = std::mem::replace(existing, ParamValue::None);
                *existing = ParamValue::List(vec![first, value]);
            }
        }
    }
    Some(params)
}

/// Boolean-looking literals coerce; everything else stays a string.
fn coerce_literal(value: String) -> ParamValue {
    match value.as_str() {
        "true" | "True" => ParamValue::Bool(true),
        "false" | "False" => ParamValue::Bool(false),
        _ => ParamValue::Str(value),
    }
}
