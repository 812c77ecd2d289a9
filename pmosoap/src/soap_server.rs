//! Extension SOAP pour pmoserver.
//!
//! Le trait [`SoapServerExt`] monte un [`Dispatcher`] sur un
//! `pmoserver::Server`, au chemin et avec la limite de taille configurés.
//! `pmoserver` reste agnostique de SOAP.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use pmoconfig::get_config;
use pmoserver::Server;
use tracing::info;

use crate::config_ext::SoapConfigExt;
use crate::dispatch::{Dispatcher, router};
use crate::operations::OperationRegistry;

/// Trait pour étendre un serveur avec un point d'accès SOAP.
///
/// # Examples
///
/// ```rust,ignore
/// use pmosoap::{SoapServerExt, operations::OperationRegistry};
/// use pmoserver::ServerBuilder;
///
/// let mut server = ServerBuilder::new_configured().build();
/// let registry = OperationRegistry::new();
/// server.register_soap_endpoint(registry).await?;
/// ```
pub trait SoapServerExt {
    /// Monte le dispatcher au chemin configuré (`soap.endpoint`).
    async fn register_soap_endpoint(&mut self, registry: OperationRegistry)
    -> Result<Arc<Dispatcher>>;

    /// Monte le dispatcher à un chemin explicite.
    async fn register_soap_endpoint_at(
        &mut self,
        path: &str,
        registry: OperationRegistry,
        max_body_size: usize,
    ) -> Arc<Dispatcher>;
}

impl SoapServerExt for Server {
    async fn register_soap_endpoint(
        &mut self,
        registry: OperationRegistry,
    ) -> Result<Arc<Dispatcher>> {
        let config = get_config();
        let path = config.get_soap_endpoint()?;
        let limit = config.get_soap_max_body_size()?;
        Ok(self.register_soap_endpoint_at(&path, registry, limit).await)
    }

    async fn register_soap_endpoint_at(
        &mut self,
        path: &str,
        registry: OperationRegistry,
        max_body_size: usize,
    ) -> Arc<Dispatcher> {
        let dispatcher = Arc::new(Dispatcher::new(registry));
        info!(
            "🧼 SOAP endpoint {} ({} operations: {})",
            path,
            dispatcher.registry().len(),
            dispatcher.registry().actions().join(", ")
        );

        let soap_router = router(dispatcher.clone()).layer(DefaultBodyLimit::max(max_body_size));
        self.add_router(path, soap_router).await;
        dispatcher
    }
}
