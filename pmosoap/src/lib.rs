//! # pmosoap - cœur de dispatch SOAP 1.2 sur HTTP
//!
//! Cette crate reçoit des enveloppes SOAP 1.2 postées en HTTP, détermine
//! l'opération demandée, l'exécute et répond par une enveloppe de résultat
//! ou par un fault structurellement correct.
//!
//! ## Modules
//!
//! - [`soap`] : modèle d'enveloppe, sérialisation, faults
//! - [`action`] : résolution de l'action (`Content-Type` puis `SOAPAction`)
//! - [`operations`] : opérations et registre
//! - [`dispatch`] : dispatcher et adaptateur axum
//! - [`client`] : construction des appels
//!
//! ## Exemple
//!
//! ```rust,ignore
//! use pmosoap::{SoapServerExt, operation};
//! use pmosoap::operations::{OperationOutput, OperationRegistry};
//! use pmoserver::ServerBuilder;
//!
//! let mut registry = OperationRegistry::new();
//! registry.register("Echo", operation!(|request| {
//!     let text: String = request.arg("Text")?;
//!     Ok(request.respond([("Text", text)]))
//! }))?;
//!
//! let mut server = ServerBuilder::new_configured().build();
//! server.register_soap_endpoint(registry).await?;
//! server.start().await?;
//! server.wait().await;
//! ```

pub mod action;
pub mod client;
pub mod config_ext;
pub mod dispatch;
pub mod errors;
pub mod operations;
pub mod soap;
pub mod soap_server;

pub use crate::action::resolve_action;
pub use crate::client::{CallBuilder, SoapCall, SoapResult, build_call, parse_reply};
pub use crate::config_ext::SoapConfigExt;
pub use crate::dispatch::{Dispatcher, SoapReply, SoapRequest};
pub use crate::errors::SoapError;
pub use crate::soap_server::SoapServerExt;
