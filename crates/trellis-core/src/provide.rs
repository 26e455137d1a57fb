//! Provider table entries and the validated signature-model seam.
//!
//! A [`Provider`] is a named async factory with its own declared signature.
//! The resolver walks a handler's field set; names matching the provider
//! table resolve the provider's own field set first (recursively), bind the
//! result through the provider's [`SignatureModel`], and invoke the factory.
//!
//! The signature model itself is an external collaborator: resolution treats
//! it as an opaque constructor that validates raw kwargs into the final
//! mapping. [`PlainModel`] is the identity implementation for signatures
//! with no registered validation layer.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::error::{ResolveResult, ValidationError};
use crate::field::FieldSet;
use crate::value::{Kwargs, ParamValue};

/// The validated signature model collaborator.
///
/// Source of truth for the declared field set, and the validation gate raw
/// kwargs pass through before a callable is invoked.
pub trait SignatureModel: Send + Sync {
    /// The declared fields of the modeled signature.
    fn fields(&self) -> &FieldSet;

    /// Validates and coerces raw keyword values into the final mapping.
    fn bind(&self, kwargs: Kwargs) -> Result<Kwargs, ValidationError>;
}

/// A signature model that accepts its kwargs unchanged.
#[derive(Debug, Clone, Default)]
pub struct PlainModel {
    fields: FieldSet,
}

impl PlainModel {
    /// Creates a pass-through model over the given field set.
    pub fn new(fields: FieldSet) -> Self {
        Self { fields }
    }
}

impl SignatureModel for PlainModel {
    fn fields(&self) -> &FieldSet {
        &self.fields
    }

    fn bind(&self, kwargs: Kwargs) -> Result<Kwargs, ValidationError> {
        Ok(kwargs)
    }
}

/// A named dependency factory with its own declared signature.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The provider's own signature model, resolved recursively before
    /// invocation.
    fn model(&self) -> &dyn SignatureModel;

    /// Invokes the factory with its resolved, bound kwargs.
    async fn provide(&self, kwargs: Kwargs) -> ResolveResult<ParamValue>;
}

/// The provider table visible to one handler: name → provider.
pub type ProviderMap = IndexMap<String, Arc<dyn Provider>>;

type ProviderFuture = BoxFuture<'static, ResolveResult<ParamValue>>;
type ProviderFn = Arc<dyn Fn(Kwargs) -> ProviderFuture + Send + Sync>;

/// The standard [`Provider`] implementation: an async factory closure
/// paired with its signature model.
///
/// # Example
///
/// ```rust,ignore
/// let provider = Provide::new(
///     Arc::new(PlainModel::new(FieldSet::new().with("request", FieldDescriptor::new()))),
///     |kwargs| async move {
///         let request = kwargs.get("request").cloned().unwrap_or(ParamValue::None);
///         Ok(ParamValue::shared(SessionStore::for_request(request)))
///     },
/// );
/// ```
#[derive(Clone)]
pub struct Provide {
    model: Arc<dyn SignatureModel>,
    factory: ProviderFn,
}

impl Provide {
    /// Wraps an async factory together with its signature model.
    pub fn new<F, Fut>(model: Arc<dyn SignatureModel>, factory: F) -> Self
    where
        F: Fn(Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolveResult<ParamValue>> + Send + 'static,
    {
        Self {
            model,
            factory: Arc::new(move |kwargs| -> ProviderFuture { Box::pin(factory(kwargs)) }),
        }
    }

    /// Wraps a factory that declares no parameters of its own.
    pub fn leaf<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolveResult<ParamValue>> + Send + 'static,
    {
        Self::new(Arc::new(PlainModel::default()), move |_| factory())
    }
}

#[async_trait]
impl Provider for Provide {
    fn model(&self) -> &dyn SignatureModel {
        self.model.as_ref()
    }

    async fn provide(&self, kwargs: Kwargs) -> ResolveResult<ParamValue> {
        (self.factory)(kwargs).await
    }
}

impl std::fmt::Debug for Provide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provide")
            .field("fields", &self.model.fields().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDescriptor;

    #[test]
    fn plain_model_binds_unchanged() {
        let model = PlainModel::new(FieldSet::new().with("n", FieldDescriptor::new()));
        let mut kwargs = Kwargs::new();
        kwargs.insert("n".to_string(), ParamValue::from("1"));
        let bound = model.bind(kwargs.clone()).unwrap();
        assert_eq!(bound, kwargs);
    }

    #[tokio::test]
    async fn leaf_provider_ignores_kwargs() {
        let provider = Provide::leaf(|| async { Ok(ParamValue::from(true)) });
        assert!(provider.model().fields().is_empty());
        let value = provider.provide(Kwargs::new()).await.unwrap();
        assert_eq!(value, ParamValue::from(true));
    }

    #[tokio::test]
    async fn factory_receives_bound_kwargs() {
        let model = Arc::new(PlainModel::new(
            FieldSet::new().with("name", FieldDescriptor::new()),
        ));
        let provider = Provide::new(model, |kwargs| async move {
            let name = kwargs
                .get("name")
                .and_then(ParamValue::as_str)
                .unwrap_or("nobody")
                .to_string();
            Ok(ParamValue::from(format!("hello {name}")))
        });

        let mut kwargs = Kwargs::new();
        kwargs.insert("name".to_string(), ParamValue::from("ada"));
        let value = provider.provide(kwargs).await.unwrap();
        assert_eq!(value, ParamValue::from("hello ada"));
    }
}
