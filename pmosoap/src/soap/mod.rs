//! # Module SOAP - modèle d'enveloppe SOAP 1.2
//!
//! Ce module implémente le modèle de données de l'enveloppe SOAP 1.2 et sa
//! sérialisation dans les deux sens.
//!
//! ## Fonctionnalités
//!
//! - ✅ Parsing d'enveloppes SOAP 1.2 (`Envelope::unmarshal`)
//! - ✅ Sérialisation déterministe (`Envelope::marshal`)
//! - ✅ Blocs d'en-tête opaques avec leurs attributs SOAP
//! - ✅ Faults avec chaîne de sous-codes qualifiés
//!
//! ## Architecture
//!
//! - [`Envelope`] : Enveloppe SOAP complète
//! - [`Header`] / [`HeaderItem`] : En-tête et blocs d'en-tête
//! - [`Body`] : Contenu applicatif **ou** fault
//! - [`Fault`] : Erreur SOAP
//! - [`Extension`] : Élément XML opaque
//!
//! ## Example
//!
//! ```rust
//! use pmosoap::soap::{Body, Envelope, Extension};
//!
//! let envelope = Envelope::new(Body::Payload(vec![
//!     Extension::new("Echo").with_child(Extension::text("Text", "hello")),
//! ]));
//!
//! let xml = envelope.marshal().unwrap();
//! let decoded = Envelope::unmarshal(&xml).unwrap();
//! assert_eq!(decoded, envelope);
//! ```

mod envelope;
mod extension;
mod fault;
mod parser;
mod qname;
mod writer;

pub use envelope::{Body, Envelope, Header, HeaderItem};
pub use extension::Extension;
pub use fault::{Code, Detail, Fault, FaultCode, PMO_FAULT_NS, ReasonText, Subcode, build_fault, subcodes};
pub use parser::EnvelopeError;
pub use qname::QName;
pub(crate) use qname::is_ncname;

/// Namespace de l'enveloppe SOAP 1.2
pub const SOAP_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// Namespace SOAP RPC (sous-codes `rpc:*`)
pub const RPC_NS: &str = "http://www.w3.org/2003/05/soap-rpc";

/// Type MIME du binding HTTP SOAP 1.2
pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml";

/// Rôles SOAP 1.2 prédéfinis
pub mod roles {
    /// Le nœud SOAP suivant sur le chemin du message
    pub const NEXT: &str = "http://www.w3.org/2003/05/soap-envelope/role/next";

    /// Le destinataire final
    pub const ULTIMATE_RECEIVER: &str =
        "http://www.w3.org/2003/05/soap-envelope/role/ultimateReceiver";

    /// Aucun nœud
    pub const NONE: &str = "http://www.w3.org/2003/05/soap-envelope/role/none";
}
