//! Erreurs du traitement d'une requête SOAP.
//!
//! Chaque catégorie correspond à un seul statut HTTP et, sauf pour les
//! préconditions de transport, à un seul fault SOAP.

use axum::http::StatusCode;
use thiserror::Error;

use crate::operations::OperationError;
use crate::soap::{
    Body, Envelope, EnvelopeError, Extension, Fault, FaultCode, Header, HeaderItem, QName,
    SOAP_ENV_NS, build_fault, subcodes,
};

/// Erreur produite par un étage du dispatcher.
#[derive(Error, Debug)]
pub enum SoapError {
    /// Méthode ou type de contenu refusés : réponse HTTP nue, sans enveloppe.
    #[error("{reason}")]
    TransportPrecondition { status: StatusCode, reason: String },

    #[error("Malformed SOAP envelope: {0}")]
    MalformedEnvelope(#[from] EnvelopeError),

    /// Action absente (`None`) ou inconnue du registre.
    #[error("Action {} not found", .0.as_deref().unwrap_or("(none)"))]
    UnknownAction(Option<String>),

    #[error("Mandatory header blocks not understood: {}", display_qnames(.0))]
    NotUnderstood(Vec<QName>),

    #[error("Operation {action} failed: {source}")]
    OperationFailure {
        action: String,
        #[source]
        source: OperationError,
    },
}

fn display_qnames(names: &[QName]) -> String {
    names
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl SoapError {
    pub fn method_not_allowed(method: &str) -> Self {
        SoapError::TransportPrecondition {
            status: StatusCode::METHOD_NOT_ALLOWED,
            reason: format!("Method {} not allowed, use POST", method),
        }
    }

    pub fn unsupported_content_type(content_type: &str) -> Self {
        SoapError::TransportPrecondition {
            status: StatusCode::NOT_ACCEPTABLE,
            reason: format!("Unsupported content type '{}'", content_type),
        }
    }

    /// Statut HTTP associé.
    pub fn status(&self) -> StatusCode {
        match self {
            SoapError::TransportPrecondition { status, .. } => *status,
            _ => match self.to_fault() {
                Some(fault) => fault_status(fault.kind()),
                None => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Fault décrivant l'erreur (aucun pour une précondition de transport).
    pub fn to_fault(&self) -> Option<Fault> {
        let fault = match self {
            SoapError::TransportPrecondition { .. } => return None,
            SoapError::MalformedEnvelope(e) => build_fault(
                FaultCode::Sender,
                &e.to_string(),
                [subcodes::malformed_envelope()],
            ),
            SoapError::UnknownAction(_) => build_fault(
                FaultCode::Sender,
                &self.to_string(),
                [subcodes::procedure_not_present()],
            ),
            SoapError::NotUnderstood(_) => {
                build_fault(FaultCode::MustUnderstand, &self.to_string(), [])
            }
            SoapError::OperationFailure { source, .. } => match source {
                OperationError::BadArguments(msg) => {
                    build_fault(FaultCode::Sender, msg, [subcodes::bad_arguments()])
                }
                OperationError::Failed(msg) => {
                    build_fault(FaultCode::Receiver, msg, [subcodes::operation_failed()])
                }
                OperationError::Fault(fault) => fault.clone(),
            },
        };
        Some(fault)
    }

    /// Enveloppe de fault complète.
    ///
    /// Pour un fault `MustUnderstand`, l'en-tête porte un bloc
    /// `env:NotUnderstood` par bloc obligatoire non compris.
    pub fn to_envelope(&self) -> Option<Envelope> {
        let fault = self.to_fault()?;
        match self {
            SoapError::NotUnderstood(names) => Some(Envelope::with_header(
                Header::new(names.iter().map(not_understood).collect()),
                Body::Fault(fault),
            )),
            _ => Some(Envelope::fault(fault)),
        }
    }
}

/// Statut HTTP d'un fault, selon sa catégorie.
pub fn fault_status(kind: FaultCode) -> StatusCode {
    if kind.is_sender() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn not_understood(name: &QName) -> HeaderItem {
    let mut block = Extension::qualified("env", SOAP_ENV_NS, "NotUnderstood");
    block = match &name.namespace {
        Some(ns) => {
            let prefix = name
                .prefix
                .as_deref()
                .filter(|p| !matches!(*p, "" | "env" | "xml" | "xmlns"))
                .unwrap_or("ns1");
            block
                .with_attribute(format!("xmlns:{}", prefix), ns.clone())
                .with_attribute("qname", format!("{}:{}", prefix, name.local))
        }
        None => block.with_attribute("qname", name.local.clone()),
    };
    HeaderItem::new(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            SoapError::method_not_allowed("GET").status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            SoapError::unsupported_content_type("text/plain").status(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(
            SoapError::UnknownAction(Some("Nope".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SoapError::NotUnderstood(vec![]).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let failed = SoapError::OperationFailure {
            action: "Add".into(),
            source: OperationError::failed("boom"),
        };
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bad = SoapError::OperationFailure {
            action: "Add".into(),
            source: OperationError::bad_arguments("a is missing"),
        };
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_transport_precondition_has_no_fault() {
        assert!(SoapError::method_not_allowed("PUT").to_envelope().is_none());
    }

    #[test]
    fn test_unknown_action_fault() {
        let fault = SoapError::UnknownAction(None).to_fault().unwrap();
        assert_eq!(fault.kind(), FaultCode::Sender);
        assert_eq!(fault.code.subcodes()[0], &subcodes::procedure_not_present());
        assert_eq!(fault.message(), Some("Action (none) not found"));
    }

    #[test]
    fn test_operation_fault_passthrough() {
        let custom = build_fault(FaultCode::Receiver, "disk full", [])
            .with_node("urn:node:storage");
        let err = SoapError::OperationFailure {
            action: "Store".into(),
            source: OperationError::Fault(custom.clone()),
        };
        assert_eq!(err.to_fault(), Some(custom));
    }

    #[test]
    fn test_not_understood_header() {
        let err = SoapError::NotUnderstood(vec![QName::new("t", "urn:trace", "Trace")]);
        let envelope = err.to_envelope().unwrap();
        let items = envelope.header_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content.name(), "NotUnderstood");
        assert_eq!(items[0].content.attribute("qname"), Some("t:Trace"));

        let xml = envelope.to_xml().unwrap();
        assert!(xml.contains(r#"<env:NotUnderstood xmlns:t="urn:trace" qname="t:Trace""#));
    }
}
