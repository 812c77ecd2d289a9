//! Types et utilitaires pour les opérations SOAP.
//!
//! Une opération est une fonction asynchrone partageable qui reçoit la
//! requête décodée et produit le contenu du Body de la réponse.
//!
//! ```text
//! OperationRequest (action, header, payload)
//!       ↓
//! OperationHandler (async processing)
//!       ↓
//! OperationOutput (payload de la réponse)
//! ```
//!
//! # Examples
//!
//! ```rust
//! use pmosoap::operation;
//! use pmosoap::operations::OperationHandler;
//!
//! let echo: OperationHandler = operation!(|request| {
//!     let text: String = request.arg("Text")?;
//!     Ok(request.respond([("Text", text)]))
//! });
//! ```

use std::{collections::HashMap, future::Future, pin::Pin, str::FromStr, sync::Arc};

use crate::operations::OperationError;
use crate::soap::{Body, Extension, Header};

/// Requête transmise à une opération.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// Action résolue pour cette requête
    pub action: String,

    /// En-tête de l'enveloppe reçue
    pub header: Option<Header>,

    /// Éléments du Body, dans l'ordre
    pub payload: Vec<Extension>,
}

impl OperationRequest {
    pub fn new(action: impl Into<String>, header: Option<Header>, payload: Vec<Extension>) -> Self {
        Self {
            action: action.into(),
            header,
            payload,
        }
    }

    /// Élément d'appel (premier élément du Body).
    pub fn call_element(&self) -> Option<&Extension> {
        self.payload.first()
    }

    /// Arguments de l'appel : nom local de chaque enfant de l'élément
    /// d'appel associé à son texte.
    pub fn arguments(&self) -> HashMap<String, String> {
        self.call_element()
            .map(|call| {
                call.children()
                    .map(|arg| (arg.name().to_string(), arg.text_content()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Extrait un argument typé.
    ///
    /// # Errors
    ///
    /// Retourne `OperationError::BadArguments` si l'argument est absent ou
    /// ne peut pas être converti vers `T`.
    pub fn arg<T>(&self, name: &str) -> Result<T, OperationError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self
            .call_element()
            .and_then(|call| call.child(name))
            .map(|arg| arg.text_content())
            .ok_or_else(|| OperationError::bad_arguments(format!("Missing argument {}", name)))?;

        raw.parse::<T>().map_err(|e| {
            OperationError::bad_arguments(format!("Invalid value '{}' for {}: {}", raw, name, e))
        })
    }

    /// Construit la réponse RPC conventionnelle `<{élément d'appel}Response>`,
    /// dans le namespace de l'élément d'appel.
    pub fn respond<I, K, V>(&self, values: I) -> OperationOutput
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let name = self
            .call_element()
            .map(|call| call.name().to_string())
            .unwrap_or_else(|| self.action.clone());
        let namespace = self.call_element().and_then(|call| call.namespace());

        let element = match namespace {
            Some(ns) => Extension::qualified("m", ns, &format!("{}Response", name)),
            None => Extension::new(format!("{}Response", name)),
        };
        OperationOutput::single(with_values(element, values))
    }
}

/// Contenu du Body d'une réponse réussie.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationOutput {
    pub payload: Vec<Extension>,
}

impl OperationOutput {
    /// Réponse sans contenu.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(element: Extension) -> Self {
        Self {
            payload: vec![element],
        }
    }

    pub fn from_payload(payload: Vec<Extension>) -> Self {
        Self { payload }
    }

    /// Élément `<{action}Response>` sans namespace, un enfant texte par valeur.
    pub fn response<I, K, V>(action: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        Self::single(with_values(
            Extension::new(format!("{}Response", action)),
            values,
        ))
    }

    pub fn into_body(self) -> Body {
        Body::Payload(self.payload)
    }
}

fn with_values<I, K, V>(element: Extension, values: I) -> Extension
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    values.into_iter().fold(element, |element, (name, value)| {
        element.with_child(Extension::text(name, value.to_string()))
    })
}

/// Future retourné par un [`OperationHandler`].
pub type OperationFuture =
    Pin<Box<dyn Future<Output = Result<OperationOutput, OperationError>> + Send>>;

/// Opération SOAP asynchrone.
///
/// Le handler capture son contexte par `move` ; il doit être `Send + Sync`
/// pour être partagé entre les tâches du serveur.
pub type OperationHandler = Arc<dyn Fn(OperationRequest) -> OperationFuture + Send + Sync>;

/// Macro pour créer facilement un [`OperationHandler`].
///
/// Le bloc est exécuté dans un `async move` et doit produire un
/// `Result<OperationOutput, OperationError>` ; `?` y est utilisable.
///
/// ```ignore
/// operation!(|request| {
///     let a: i64 = request.arg("a")?;
///     Ok(OperationOutput::response("Double", [("result", a * 2)]))
/// })
/// ```
#[macro_export]
macro_rules! operation {
    (|$request:ident| $body:block) => {{
        let handler: $crate::operations::OperationHandler = std::sync::Arc::new(
            move |$request: $crate::operations::OperationRequest| -> $crate::operations::OperationFuture {
                Box::pin(async move {
                    let outcome: ::std::result::Result<
                        $crate::operations::OperationOutput,
                        $crate::operations::OperationError,
                    > = $body;
                    outcome
                })
            },
        );
        handler
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OperationRequest {
        OperationRequest::new(
            "Add",
            None,
            vec![
                Extension::qualified("m", "urn:calc", "Add")
                    .with_child(Extension::text("a", "2"))
                    .with_child(Extension::text("b", "x")),
            ],
        )
    }

    #[test]
    fn test_arguments() {
        let args = request().arguments();
        assert_eq!(args.get("a").map(String::as_str), Some("2"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_typed_arg() {
        let req = request();
        assert_eq!(req.arg::<i64>("a").unwrap(), 2);
        assert!(matches!(req.arg::<i64>("b"), Err(OperationError::BadArguments(_))));
        assert!(matches!(req.arg::<i64>("c"), Err(OperationError::BadArguments(_))));
    }

    #[test]
    fn test_respond_keeps_namespace() {
        let output = request().respond([("sum", 4)]);
        let element = &output.payload[0];
        assert_eq!(element.name(), "AddResponse");
        assert_eq!(element.namespace(), Some("urn:calc"));
        assert_eq!(element.child("sum").unwrap().text_content(), "4");
    }

    #[tokio::test]
    async fn test_operation_macro() {
        let handler = crate::operation!(|request| {
            let a: i64 = request.arg("a")?;
            Ok(OperationOutput::response("Double", [("result", a * 2)]))
        });

        let output = handler(request()).await.unwrap();
        assert_eq!(output.payload[0].name(), "DoubleResponse");
        assert_eq!(output.payload[0].child("result").unwrap().text_content(), "4");

        let err = handler(OperationRequest::new("Double", None, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::BadArguments(_)));
    }
}
