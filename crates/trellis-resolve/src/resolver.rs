//! Recursive resolution of provider graphs into handler kwargs.

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{Instrument, Level, debug, span, trace};

use trellis_core::connection::Connection;
use trellis_core::error::{ConfigError, ResolveResult};
use trellis_core::field::FieldSet;
use trellis_core::provide::{ProviderMap, SignatureModel};
use trellis_core::value::Kwargs;

use crate::kwargs::connection_kwargs;

/// Resolves a handler signature's kwargs against one connection.
///
/// The field set is walked in declaration order. A field whose name matches
/// an entry in the provider table resolves that provider's own field set
/// first — recursively, against the same connection and the same table —
/// binds the result through the provider's signature model, and invokes the
/// factory. Every other field comes from the connection. On a name
/// collision, the provider value wins: a field matched as a provider is
/// never also treated as a plain connection parameter.
///
/// Provider invocations are sequential in field declaration order, so
/// result merging is deterministic. A provider chain that re-enters a name
/// already being resolved is a registration mistake and fails fast with
/// [`ConfigError::ProviderCycle`] instead of exhausting the stack.
pub async fn resolve_signature(
    model: &dyn SignatureModel,
    connection: &Connection,
    providers: &ProviderMap,
) -> ResolveResult<Kwargs> {
    let span = span!(Level::DEBUG, "resolve", fields = model.fields().len());
    let mut visiting = Vec::new();
    resolve_with_stack(model, connection, providers, &mut visiting)
        .instrument(span)
        .await
}

/// The boxed recursion body; `visiting` is the chain of provider names
/// currently being resolved, used to detect cycles.
fn resolve_with_stack<'a>(
    model: &'a dyn SignatureModel,
    connection: &'a Connection,
    providers: &'a ProviderMap,
    visiting: &'a mut Vec<String>,
) -> BoxFuture<'a, ResolveResult<Kwargs>> {
    async move {
        let fields = model.fields();
        let mut dependencies = Kwargs::new();

        for name in fields.names() {
            let Some(provider) = providers.get(name) else {
                continue;
            };
            if visiting.iter().any(|seen| seen == name) {
                let mut path: Vec<&str> = visiting.iter().map(String::as_str).collect();
                path.push(name);
                return Err(ConfigError::ProviderCycle {
                    path: path.join(" -> "),
                }
                .into());
            }

            visiting.push(name.clone());
            let resolved =
                resolve_with_stack(provider.model(), connection, providers, visiting).await?;
            visiting.pop();

            let bound = provider.model().bind(resolved)?;
            trace!(provider = %name, "invoking provider");
            let value = provider.provide(bound).await?;
            dependencies.insert(name.clone(), value);
        }

        if !dependencies.is_empty() {
            debug!(count = dependencies.len(), "resolved provider dependencies");
        }

        let connection_fields: FieldSet = fields
            .iter()
            .filter(|(name, _)| !dependencies.contains_key(*name))
            .map(|(name, field)| (name.clone(), field.clone()))
            .collect();
        let mut kwargs = connection_kwargs(connection, &connection_fields).await?;

        // Dependency values shadow connection-resolved names.
        kwargs.extend(dependencies);
        Ok(kwargs)
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use trellis_core::connection::{HttpRequest, Method};
    use trellis_core::error::{ResolveError, ValidationError};
    use trellis_core::field::{FieldDescriptor, FieldSet};
    use trellis_core::provide::{PlainModel, Provide, Provider};
    use trellis_core::value::ParamValue;

    fn connection() -> Connection {
        Connection::http(
            HttpRequest::new(Method::Get)
                .with_path_param("id", "42")
                .with_query_string(&b"n=7"[..]),
        )
    }

    fn plain(fields: FieldSet) -> Arc<PlainModel> {
        Arc::new(PlainModel::new(fields))
    }

    fn provider_for(
        fields: FieldSet,
        value: impl Fn(Kwargs) -> ParamValue + Send + Sync + 'static,
    ) -> Arc<dyn Provider> {
        Arc::new(Provide::new(plain(fields), move |kwargs| {
            let out = value(kwargs);
            async move { Ok(out) }
        }))
    }

    #[tokio::test]
    async fn provider_fields_resolve_through_the_table() {
        let mut providers = ProviderMap::new();
        providers.insert(
            "greeting".to_string(),
            provider_for(FieldSet::new(), |_| ParamValue::from("hello")),
        );

        let model = PlainModel::new(
            FieldSet::new()
                .with("greeting", FieldDescriptor::new())
                .with("n", FieldDescriptor::new()),
        );
        let kwargs = resolve_signature(&model, &connection(), &providers).await.unwrap();

        assert_eq!(kwargs.get("greeting"), Some(&ParamValue::from("hello")));
        assert_eq!(kwargs.get("n"), Some(&ParamValue::from("7")));
    }

    #[tokio::test]
    async fn nested_providers_see_their_own_connection_fields() {
        // `report` depends on `db`, which itself reads the path parameter.
        let mut providers = ProviderMap::new();
        providers.insert(
            "db".to_string(),
            provider_for(
                FieldSet::new().with("id", FieldDescriptor::new()),
                |kwargs| {
                    let id = kwargs.get("id").and_then(ParamValue::as_str).unwrap().to_string();
                    ParamValue::from(format!("db:{id}"))
                },
            ),
        );
        providers.insert(
            "report".to_string(),
            provider_for(
                FieldSet::new().with("db", FieldDescriptor::new()),
                |kwargs| {
                    let db = kwargs.get("db").and_then(ParamValue::as_str).unwrap().to_string();
                    ParamValue::from(format!("report({db})"))
                },
            ),
        );

        let model = PlainModel::new(FieldSet::new().with("report", FieldDescriptor::new()));
        let kwargs = resolve_signature(&model, &connection(), &providers).await.unwrap();
        assert_eq!(kwargs.get("report"), Some(&ParamValue::from("report(db:42)")));
    }

    #[tokio::test]
    async fn provider_values_shadow_connection_parameters() {
        // A provider named `n` wins over the query parameter `n`, while the
        // handler's other fields still resolve from the connection.
        let mut providers = ProviderMap::new();
        providers.insert(
            "n".to_string(),
            provider_for(FieldSet::new(), |_| ParamValue::from("provided")),
        );

        let model = PlainModel::new(
            FieldSet::new()
                .with("n", FieldDescriptor::new())
                .with("id", FieldDescriptor::new()),
        );
        let kwargs = resolve_signature(&model, &connection(), &providers).await.unwrap();

        assert_eq!(kwargs.get("n"), Some(&ParamValue::from("provided")));
        assert_eq!(kwargs.get("id"), Some(&ParamValue::from("42")));
    }

    #[tokio::test]
    async fn handler_fields_resolve_independently_of_provider_internals() {
        // The provider consumes `n` internally; the handler also declares
        // `n`, which must come from the connection, not the provider's copy.
        let mut providers = ProviderMap::new();
        providers.insert(
            "double".to_string(),
            provider_for(
                FieldSet::new().with("n", FieldDescriptor::new()),
                |kwargs| {
                    let n: i64 = kwargs
                        .get("n")
                        .and_then(ParamValue::as_str)
                        .unwrap()
                        .parse()
                        .unwrap();
                    ParamValue::Json(json!(n * 2))
                },
            ),
        );

        let model = PlainModel::new(
            FieldSet::new()
                .with("double", FieldDescriptor::new())
                .with("n", FieldDescriptor::new()),
        );
        let kwargs = resolve_signature(&model, &connection(), &providers).await.unwrap();

        assert_eq!(kwargs.get("double"), Some(&ParamValue::Json(json!(14))));
        assert_eq!(kwargs.get("n"), Some(&ParamValue::from("7")));
    }

    #[tokio::test]
    async fn provider_cycles_fail_fast_with_the_chain() {
        let mut providers = ProviderMap::new();
        providers.insert(
            "a".to_string(),
            provider_for(FieldSet::new().with("b", FieldDescriptor::new()), |_| {
                ParamValue::None
            }),
        );
        providers.insert(
            "b".to_string(),
            provider_for(FieldSet::new().with("a", FieldDescriptor::new()), |_| {
                ParamValue::None
            }),
        );

        let model = PlainModel::new(FieldSet::new().with("a", FieldDescriptor::new()));
        let err = resolve_signature(&model, &connection(), &providers).await.unwrap_err();
        match err {
            ResolveError::Configuration(ConfigError::ProviderCycle { path }) => {
                assert_eq!(path, "a -> b -> a");
            }
            other => panic!("expected a provider cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn self_referencing_provider_is_a_cycle() {
        let mut providers = ProviderMap::new();
        providers.insert(
            "loop".to_string(),
            provider_for(FieldSet::new().with("loop", FieldDescriptor::new()), |_| {
                ParamValue::None
            }),
        );

        let model = PlainModel::new(FieldSet::new().with("loop", FieldDescriptor::new()));
        let err = resolve_signature(&model, &connection(), &providers).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Configuration(ConfigError::ProviderCycle { .. })
        ));
    }

    #[tokio::test]
    async fn shared_subgraphs_resolve_once_per_reference_without_cycling() {
        // Both `left` and `right` depend on `base`; a diamond is not a cycle.
        let mut providers = ProviderMap::new();
        providers.insert(
            "base".to_string(),
            provider_for(FieldSet::new(), |_| ParamValue::from("base")),
        );
        providers.insert(
            "left".to_string(),
            provider_for(FieldSet::new().with("base", FieldDescriptor::new()), |_| {
                ParamValue::from("left")
            }),
        );
        providers.insert(
            "right".to_string(),
            provider_for(FieldSet::new().with("base", FieldDescriptor::new()), |_| {
                ParamValue::from("right")
            }),
        );

        let model = PlainModel::new(
            FieldSet::new()
                .with("left", FieldDescriptor::new())
                .with("right", FieldDescriptor::new()),
        );
        let kwargs = resolve_signature(&model, &connection(), &providers).await.unwrap();
        assert_eq!(kwargs.get("left"), Some(&ParamValue::from("left")));
        assert_eq!(kwargs.get("right"), Some(&ParamValue::from("right")));
    }

    #[tokio::test]
    async fn provider_kwargs_pass_through_the_provider_model() {
        // A model that rejects its input proves `bind` gates invocation.
        struct Rejecting(FieldSet);
        impl SignatureModel for Rejecting {
            fn fields(&self) -> &FieldSet {
                &self.0
            }
            fn bind(&self, _kwargs: Kwargs) -> Result<Kwargs, ValidationError> {
                Err(ValidationError::InvalidParameter {
                    name: "n".to_string(),
                    reason: "rejected".to_string(),
                })
            }
        }

        let mut providers = ProviderMap::new();
        providers.insert(
            "svc".to_string(),
            Arc::new(Provide::new(Arc::new(Rejecting(FieldSet::new())), |_| async {
                Ok(ParamValue::from("never"))
            })) as Arc<dyn Provider>,
        );

        let model = PlainModel::new(FieldSet::new().with("svc", FieldDescriptor::new()));
        let err = resolve_signature(&model, &connection(), &providers).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Validation(ValidationError::InvalidParameter { .. })
        ));
    }

    #[tokio::test]
    async fn provider_failures_propagate() {
        let mut providers = ProviderMap::new();
        providers.insert(
            "flaky".to_string(),
            Arc::new(Provide::leaf(|| async {
                Err(ResolveError::provider("flaky", "connection pool exhausted"))
            })) as Arc<dyn Provider>,
        );

        let model = PlainModel::new(FieldSet::new().with("flaky", FieldDescriptor::new()));
        let err = resolve_signature(&model, &connection(), &providers).await.unwrap_err();
        assert!(matches!(err, ResolveError::Provider { .. }));
    }

    #[tokio::test]
    async fn resolution_is_idempotent_across_connections() {
        let mut providers = ProviderMap::new();
        providers.insert(
            "svc".to_string(),
            provider_for(FieldSet::new(), |_| ParamValue::from("same")),
        );
        let model = PlainModel::new(
            FieldSet::new()
                .with("svc", FieldDescriptor::new())
                .with("id", FieldDescriptor::new())
                .with("n", FieldDescriptor::new()),
        );

        let first = resolve_signature(&model, &connection(), &providers).await.unwrap();
        let second = resolve_signature(&model, &connection(), &providers).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unreferenced_providers_are_not_invoked() {
        let mut providers = ProviderMap::new();
        providers.insert(
            "unused".to_string(),
            Arc::new(Provide::leaf(|| async { panic!("must not be invoked") }))
                as Arc<dyn Provider>,
        );

        let model = PlainModel::new(FieldSet::new().with("id", FieldDescriptor::new()));
        let kwargs = resolve_signature(&model, &connection(), &providers).await.unwrap();
        assert_eq!(kwargs.get("id"), Some(&ParamValue::from("42")));
        assert!(!kwargs.contains_key("unused"));
    }
}
