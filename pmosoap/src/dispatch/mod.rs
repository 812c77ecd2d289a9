//! # Module Dispatch - traitement d'une requête SOAP
//!
//! Le [`Dispatcher`] applique les étapes suivantes, en s'arrêtant à la
//! première erreur :
//!
//! 1. méthode `POST` obligatoire (sinon 405) ;
//! 2. `Content-Type` en `application/soap+xml` (sinon 406) ;
//! 3. résolution de l'action ([`resolve_action`](crate::resolve_action)) ;
//! 4. décodage de l'enveloppe (fault `Sender`, 400) ;
//! 5. vérification des blocs d'en-tête `mustUnderstand` (fault `MustUnderstand`, 500) ;
//! 6. recherche de l'opération (fault `Sender`, 400) ;
//! 7. exécution de l'opération ;
//! 8. réponse 200 ou fault.
//!
//! Le dispatcher ne dépend pas d'axum : [`soap_handler`] n'est qu'un
//! adaptateur qui construit une [`SoapRequest`] et renvoie la [`SoapReply`].

mod responder;

pub use responder::{Responder, SOAP_RESPONSE_CONTENT_TYPE, SoapReply};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, header};
use futures::FutureExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::action::resolve_action;
use crate::errors::SoapError;
use crate::operations::{OperationError, OperationOutput, OperationRegistry, OperationRequest};
use crate::soap::{Body, Envelope, EnvelopeError, HeaderItem, QName, SOAP_CONTENT_TYPE, roles};

/// En-tête HTTP historique portant l'action.
pub const SOAP_ACTION_HEADER: &str = "SOAPAction";

/// Requête brute, indépendante du transport.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl SoapRequest {
    pub fn new(method: Method, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            headers,
            body: body.into(),
        }
    }

    fn header(&self, name: impl axum::http::header::AsHeaderName) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

/// Point d'entrée du traitement des requêtes SOAP.
///
/// Partagé entre les tâches du serveur ; le seul état est le registre,
/// immuable.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<OperationRegistry>,
}

impl Dispatcher {
    pub fn new(registry: OperationRegistry) -> Self {
        Self::from_shared(Arc::new(registry))
    }

    pub fn from_shared(registry: Arc<OperationRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Traite une requête et produit exactement une réponse.
    pub async fn dispatch(&self, request: SoapRequest) -> SoapReply {
        let request_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        info!(
            "📡 [{}] SOAP request {} ({} bytes)",
            request_id,
            request.method,
            request.body.len()
        );

        let responder = Responder::new(request_id);
        match self.process(responder.request_id(), request).await {
            Ok(output) => responder.reply(output),
            Err(err @ SoapError::TransportPrecondition { .. }) => responder.reject(&err),
            Err(err) => responder.fault(&err),
        }
    }

    async fn process(
        &self,
        request_id: &str,
        request: SoapRequest,
    ) -> Result<OperationOutput, SoapError> {
        if request.method != Method::POST {
            return Err(SoapError::method_not_allowed(request.method.as_str()));
        }

        let content_type = request.header(header::CONTENT_TYPE);
        if !content_type.trim_start().starts_with(SOAP_CONTENT_TYPE) {
            return Err(SoapError::unsupported_content_type(content_type));
        }

        let action = resolve_action(content_type, request.header(SOAP_ACTION_HEADER));
        debug!("🎬 [{}] Resolved action: {:?}", request_id, action);

        let envelope = Envelope::unmarshal(&request.body)?;
        let payload = match envelope.body {
            Body::Payload(payload) => payload,
            Body::Fault(_) => {
                return Err(EnvelopeError::UnexpectedElement(
                    "Fault in request Body".to_string(),
                )
                .into());
            }
        };
        debug!(
            "🔍 [{}] Envelope decoded: {} header block(s), {} body element(s)",
            request_id,
            envelope.header.as_ref().map_or(0, |h| h.items.len()),
            payload.len()
        );

        let not_understood = self.not_understood(envelope.header.iter().flat_map(|h| &h.items));
        if !not_understood.is_empty() {
            return Err(SoapError::NotUnderstood(not_understood));
        }

        let Some(action) = action else {
            return Err(SoapError::UnknownAction(None));
        };
        let Some(handler) = self.registry.lookup(&action) else {
            return Err(SoapError::UnknownAction(Some(action)));
        };

        debug!("⚙️ [{}] Running operation {}", request_id, action);
        let operation_request = OperationRequest::new(action.clone(), envelope.header, payload);
        let handler = handler.clone();
        let outcome = AssertUnwindSafe(async move { handler(operation_request).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(OperationError::failed("Operation panicked")));

        outcome.map_err(|source| SoapError::OperationFailure { action, source })
    }

    /// Blocs obligatoires ciblant ce nœud et non traités par le serveur.
    fn not_understood<'a, I>(&self, items: I) -> Vec<QName>
    where
        I: IntoIterator<Item = &'a HeaderItem>,
    {
        items
            .into_iter()
            .filter(|item| item.must_understand() == Some(true))
            .filter(|item| targets_this_node(item))
            .map(HeaderItem::qname)
            .filter(|name| !self.registry.understands(name))
            .collect()
    }
}

fn targets_this_node(item: &HeaderItem) -> bool {
    match item.role.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(role) => role == roles::NEXT || role == roles::ULTIMATE_RECEIVER,
    }
}

/// Handler axum : toutes méthodes, la vérification est faite par le dispatcher.
pub async fn soap_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> SoapReply {
    dispatcher.dispatch(SoapRequest::new(method, headers, body)).await
}

/// Routeur axum exposant le dispatcher à la racine.
pub fn router(dispatcher: Arc<Dispatcher>) -> axum::Router {
    axum::Router::new()
        .route("/", axum::routing::any(soap_handler))
        .with_state(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::Extension;

    #[test]
    fn test_targets_this_node() {
        let item = HeaderItem::new(Extension::new("X"));
        assert!(targets_this_node(&item));
        assert!(targets_this_node(&item.clone().with_role(roles::NEXT)));
        assert!(targets_this_node(&item.clone().with_role(roles::ULTIMATE_RECEIVER)));
        assert!(!targets_this_node(&item.clone().with_role(roles::NONE)));
        assert!(!targets_this_node(&item.with_role("urn:elsewhere")));
    }

    #[test]
    fn test_not_understood_filter() {
        let mut registry = OperationRegistry::new();
        registry.understand_header("urn:known", "Known");
        let dispatcher = Dispatcher::new(registry);

        let items = vec![
            HeaderItem::new(Extension::qualified("k", "urn:known", "Known")).with_must_understand(true),
            HeaderItem::new(Extension::qualified("u", "urn:unknown", "Optional")),
            HeaderItem::new(Extension::qualified("u", "urn:unknown", "Relayed"))
                .with_must_understand(true)
                .with_role("urn:elsewhere"),
            HeaderItem::new(Extension::qualified("u", "urn:unknown", "Mandatory"))
                .with_must_understand(true),
        ];

        let missing = dispatcher.not_understood(&items);
        assert_eq!(missing, vec![QName::new("u", "urn:unknown", "Mandatory")]);
    }
}
