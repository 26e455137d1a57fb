//! Full field-set dispatch to connection sources.

use indexmap::IndexMap;
use tracing::trace;

use trellis_core::connection::Connection;
use trellis_core::error::{ConfigError, ResolveResult};
use trellis_core::field::{FieldDescriptor, FieldSet};
use trellis_core::value::{Kwargs, ParamValue};

use crate::body::request_data;
use crate::params::connection_param;
use crate::query::parse_query;

/// Field names claimed by the connection itself.
///
/// Reserved names shadow providers and plain connection parameters alike.
/// The variant is computed once per field and dispatched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedField {
    /// A copy of the application state.
    State,
    /// The header mapping.
    Headers,
    /// The cookie mapping.
    Cookies,
    /// The parsed query-parameter mapping.
    Query,
    /// The HTTP request itself.
    Request,
    /// The socket session itself.
    Socket,
    /// The decoded request body.
    Data,
}

impl ReservedField {
    /// Maps a declared field name to its reserved meaning, if any.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "state" => Some(Self::State),
            "headers" => Some(Self::Headers),
            "cookies" => Some(Self::Cookies),
            "query" => Some(Self::Query),
            "request" => Some(Self::Request),
            "socket" => Some(Self::Socket),
            "data" => Some(Self::Data),
            _ => None,
        }
    }
}

/// Populates kwargs for every field in the set from the connection.
///
/// The query and header snapshots are computed once and shared by all
/// fields, so one request sees a single consistent view of both. Every
/// field resolves to exactly one value or the whole call fails; nothing is
/// silently omitted.
pub async fn connection_kwargs(
    connection: &Connection,
    fields: &FieldSet,
) -> ResolveResult<Kwargs> {
    let query_params = parse_query(connection.query_string());
    let header_params = connection.headers().clone();

    let mut kwargs = Kwargs::new();
    for (name, field) in fields.iter() {
        let value = match ReservedField::from_name(name) {
            Some(reserved) => {
                trace!(field = %name, "resolving reserved field");
                reserved_value(reserved, connection, field, &query_params, &header_params).await?
            }
            None => connection_param(connection, name, field, &query_params, &header_params)?,
        };
        kwargs.insert(name.clone(), value);
    }
    Ok(kwargs)
}

async fn reserved_value(
    reserved: ReservedField,
    connection: &Connection,
    field: &FieldDescriptor,
    query_params: &IndexMap<String, ParamValue>,
    header_params: &IndexMap<String, String>,
) -> ResolveResult<ParamValue> {
    match reserved {
        ReservedField::State => Ok(ParamValue::State(connection.state().snapshot())),
        ReservedField::Headers => Ok(string_map(header_params)),
        ReservedField::Cookies => Ok(string_map(connection.cookies())),
        ReservedField::Query => Ok(ParamValue::Map(query_params.clone())),
        ReservedField::Request => match connection.as_http() {
            Some(request) => Ok(ParamValue::Http(request.clone())),
            None => Err(wrong_connection("request", connection)),
        },
        ReservedField::Socket => match connection.as_socket() {
            Some(session) => Ok(ParamValue::Socket(session.clone())),
            None => Err(wrong_connection("socket", connection)),
        },
        ReservedField::Data => match connection.as_http() {
            Some(request) => request_data(request, field).await,
            None => Err(wrong_connection("data", connection)),
        },
    }
}

fn string_map(map: &IndexMap<String, String>) -> ParamValue {
    ParamValue::Map(
        map.iter()
            .map(|(name, value)| (name.clone(), ParamValue::Str(value.clone())))
            .collect(),
    )
}

fn wrong_connection(field: &'static str, connection: &Connection) -> trellis_core::ResolveError {
    ConfigError::WrongConnection {
        field,
        connection: connection.variant_name(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use trellis_core::connection::{HttpRequest, Method, SocketSession};
    use trellis_core::error::ResolveError;
    use trellis_core::state::AppState;

    fn http_connection() -> Connection {
        let state = Arc::new(AppState::new());
        state.set("version", "1.0");
        Connection::http(
            HttpRequest::new(Method::Post)
                .with_query_string(&b"q=1&flag=true"[..])
                .with_header("Accept", "application/json")
                .with_cookie("session", "abc")
                .with_state(state)
                .with_body(br#"{"ok": true}"#.to_vec()),
        )
    }

    fn fields(names: &[&str]) -> FieldSet {
        names
            .iter()
            .map(|name| (name.to_string(), FieldDescriptor::new()))
            .collect()
    }

    #[tokio::test]
    async fn reserved_fields_dispatch_to_their_sources() {
        let connection = http_connection();
        let kwargs = connection_kwargs(
            &connection,
            &fields(&["state", "headers", "cookies", "query", "request", "data"]),
        )
        .await
        .unwrap();

        match kwargs.get("state") {
            Some(ParamValue::State(snapshot)) => {
                assert_eq!(snapshot.get("version"), Some(&json!("1.0")));
            }
            other => panic!("expected a state snapshot, got {other:?}"),
        }
        match kwargs.get("headers") {
            Some(ParamValue::Map(headers)) => {
                assert_eq!(headers.get("accept"), Some(&ParamValue::from("application/json")));
            }
            other => panic!("expected the header map, got {other:?}"),
        }
        match kwargs.get("query") {
            Some(ParamValue::Map(query)) => {
                assert_eq!(query.get("flag"), Some(&ParamValue::Bool(true)));
            }
            other => panic!("expected the query map, got {other:?}"),
        }
        assert!(matches!(kwargs.get("cookies"), Some(ParamValue::Map(_))));
        assert!(matches!(kwargs.get("request"), Some(ParamValue::Http(_))));
        assert_eq!(
            kwargs.get("data"),
            Some(&ParamValue::Json(json!({"ok": true})))
        );
    }

    #[tokio::test]
    async fn state_kwarg_is_a_copy_not_the_live_container() {
        let state = Arc::new(AppState::new());
        state.set("n", 1);
        let connection =
            Connection::http(HttpRequest::new(Method::Get).with_state(Arc::clone(&state)));

        let kwargs = connection_kwargs(&connection, &fields(&["state"])).await.unwrap();
        state.set("n", 2);

        match kwargs.get("state") {
            Some(ParamValue::State(snapshot)) => assert_eq!(snapshot.get("n"), Some(&json!(1))),
            other => panic!("expected a state snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_on_a_socket_connection_is_a_configuration_error() {
        let connection = Connection::socket(SocketSession::new());
        let err = connection_kwargs(&connection, &fields(&["request"])).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Configuration(ConfigError::WrongConnection {
                field: "request",
                connection: "socket",
            })
        ));
    }

    #[tokio::test]
    async fn socket_on_an_http_connection_is_a_configuration_error() {
        let connection = Connection::http(HttpRequest::new(Method::Get));
        let err = connection_kwargs(&connection, &fields(&["socket"])).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Configuration(ConfigError::WrongConnection {
                field: "socket",
                connection: "http",
            })
        ));
    }

    #[tokio::test]
    async fn data_on_a_socket_connection_is_a_configuration_error() {
        let connection = Connection::socket(SocketSession::new());
        let err = connection_kwargs(&connection, &fields(&["data"])).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Configuration(ConfigError::WrongConnection { field: "data", .. })
        ));
    }

    #[tokio::test]
    async fn socket_sessions_resolve_their_handshake_parameters() {
        let connection = Connection::socket(
            SocketSession::new()
                .with_path_param("room", "lobby")
                .with_query_string(&b"token=t1"[..]),
        );
        let kwargs = connection_kwargs(&connection, &fields(&["socket", "room", "token"]))
            .await
            .unwrap();

        assert!(matches!(kwargs.get("socket"), Some(ParamValue::Socket(_))));
        assert_eq!(kwargs.get("room"), Some(&ParamValue::from("lobby")));
        assert_eq!(kwargs.get("token"), Some(&ParamValue::from("t1")));
    }

    #[tokio::test]
    async fn plain_fields_delegate_to_the_extractor() {
        let connection = http_connection();
        let kwargs = connection_kwargs(&connection, &fields(&["q", "missing"])).await.unwrap();
        assert_eq!(kwargs.get("q"), Some(&ParamValue::from("1")));
        assert_eq!(kwargs.get("missing"), Some(&ParamValue::None));
    }
}
