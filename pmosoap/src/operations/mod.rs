//! # Module Operations - opérations invocables
//!
//! - [`OperationHandler`] : fonction asynchrone associée à une action
//! - [`OperationRegistry`] : table action → opération, immuable pendant le service
//! - [`OperationError`] : erreurs d'opération, traduites en faults par le dispatcher

mod errors;
mod handler;
mod registry;

pub use errors::{OperationError, RegistryError};
pub use handler::{OperationFuture, OperationHandler, OperationOutput, OperationRequest};
pub use registry::OperationRegistry;
