use thiserror::Error;

use crate::soap::Fault;

/// Erreur retournée par une opération.
///
/// La catégorie détermine le fault renvoyé à l'appelant : les arguments
/// refusés sont imputés à l'émetteur, les échecs au récepteur.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("Bad arguments: {0}")]
    BadArguments(String),

    #[error("Operation failed: {0}")]
    Failed(String),

    /// Fault construit par l'opération, renvoyé tel quel.
    #[error("SOAP fault: {}", .0.message().unwrap_or("(no reason)"))]
    Fault(Fault),
}

impl OperationError {
    pub fn bad_arguments(msg: impl Into<String>) -> Self {
        OperationError::BadArguments(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        OperationError::Failed(msg.into())
    }
}

impl From<std::io::Error> for OperationError {
    fn from(err: std::io::Error) -> Self {
        OperationError::Failed(format!("IO error: {}", err))
    }
}

impl From<Fault> for OperationError {
    fn from(fault: Fault) -> Self {
        OperationError::Fault(fault)
    }
}

/// Erreur de construction du registre.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Action identifier must not be empty")]
    EmptyAction,

    #[error("Action {0} is already registered")]
    DuplicateAction(String),
}
