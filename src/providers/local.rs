//! Locally hosted models. Requests are not implemented yet; the provider exists so that local
//! models can be configured and listed.

use async_trait::async_trait;

use crate::providers::providers::ProviderIdentifier;
use crate::providers::{ChatProvider, Error, ErrorKind};

pub(crate) struct LocalProvider;

#[async_trait]
impl ChatProvider for LocalProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::Local
    }

    async fn complete(
        &self,
        _model: &str,
        _credential: Option<&str>,
        _message: &str,
    ) -> Result<String, Error> {
        Err(Error::from_kind(ErrorKind::NotImplemented))
    }
}
