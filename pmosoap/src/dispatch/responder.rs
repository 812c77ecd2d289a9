//! Écriture de la réponse d'une requête.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, info, warn};

use crate::errors::SoapError;
use crate::operations::OperationOutput;
use crate::soap::{Envelope, FaultCode};

/// Type de contenu des réponses SOAP.
pub const SOAP_RESPONSE_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

/// Réponse prête à être écrite sur le transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapReply {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl SoapReply {
    /// Décode le corps comme enveloppe SOAP.
    pub fn envelope(&self) -> Option<Envelope> {
        Envelope::unmarshal(&self.body).ok()
    }
}

impl IntoResponse for SoapReply {
    fn into_response(self) -> Response {
        match self.content_type {
            Some(ct) => (self.status, [(header::CONTENT_TYPE, ct)], self.body).into_response(),
            None => (self.status, self.body).into_response(),
        }
    }
}

/// Jeton de réponse d'une requête.
///
/// Toutes les méthodes terminales consomment le jeton : une requête reçoit
/// au plus une réponse.
#[derive(Debug)]
pub struct Responder {
    request_id: String,
}

impl Responder {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Réponse 200 dont le Body enveloppe le résultat de l'opération.
    pub fn reply(self, output: OperationOutput) -> SoapReply {
        let envelope = Envelope::new(output.into_body());
        info!("✅ [{}] SOAP response sent (200)", self.request_id);
        self.envelope(StatusCode::OK, &envelope)
    }

    /// Réponse fault, statut selon la catégorie de l'erreur.
    pub fn fault(self, err: &SoapError) -> SoapReply {
        let Some(envelope) = err.to_envelope() else {
            return self.reject(err);
        };
        let status = err.status();

        match envelope.body.fault().map(|f| f.kind()) {
            Some(FaultCode::Receiver) => {
                error!("❌ [{}] {} ({})", self.request_id, err, status.as_u16())
            }
            _ => warn!("⚠️ [{}] {} ({})", self.request_id, err, status.as_u16()),
        }
        self.envelope(status, &envelope)
    }

    /// Refus au niveau transport : texte brut, pas d'enveloppe.
    pub fn reject(self, err: &SoapError) -> SoapReply {
        let status = err.status();
        warn!("🚫 [{}] {} ({})", self.request_id, err, status.as_u16());
        SoapReply {
            status,
            content_type: Some("text/plain; charset=utf-8".to_string()),
            body: err.to_string().into_bytes(),
        }
    }

    /// Une enveloppe impossible à écrire devient une erreur 500 en texte brut.
    fn envelope(self, status: StatusCode, envelope: &Envelope) -> SoapReply {
        match envelope.marshal() {
            Ok(body) => {
                debug!("📤 [{}] {} bytes of envelope", self.request_id, body.len());
                SoapReply {
                    status,
                    content_type: Some(SOAP_RESPONSE_CONTENT_TYPE.to_string()),
                    body,
                }
            }
            Err(e) => {
                error!("❌ [{}] Failed to serialize SOAP envelope: {}", self.request_id, e);
                SoapReply {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    content_type: Some("text/plain; charset=utf-8".to_string()),
                    body: format!("Response serialization failed: {}", e).into_bytes(),
                }
            }
        }
    }
}
