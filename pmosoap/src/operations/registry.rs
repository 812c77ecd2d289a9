//! Registre des opérations exposées par le serveur.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::operations::{OperationHandler, RegistryError};
use crate::soap::QName;

/// Table action → opération.
///
/// Construit une fois au démarrage puis partagé en lecture seule (via `Arc`)
/// entre les tâches du serveur. Enregistre aussi les blocs d'en-tête que le
/// serveur sait traiter, pour la vérification `mustUnderstand`.
#[derive(Default, Clone)]
pub struct OperationRegistry {
    operations: HashMap<String, OperationHandler>,
    understood_headers: HashSet<QName>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre une opération.
    ///
    /// # Errors
    ///
    /// Refuse un identifiant vide ou déjà présent.
    pub fn register(
        &mut self,
        action: impl Into<String>,
        handler: OperationHandler,
    ) -> Result<(), RegistryError> {
        let action = action.into();
        if action.is_empty() {
            return Err(RegistryError::EmptyAction);
        }
        if self.operations.contains_key(&action) {
            return Err(RegistryError::DuplicateAction(action));
        }

        debug!("📝 Registered SOAP operation {}", action);
        self.operations.insert(action, handler);
        Ok(())
    }

    /// Variante chaînable de [`register`](Self::register).
    pub fn with_operation(
        mut self,
        action: impl Into<String>,
        handler: OperationHandler,
    ) -> Result<Self, RegistryError> {
        self.register(action, handler)?;
        Ok(self)
    }

    /// Recherche l'opération associée à une action.
    pub fn lookup(&self, action: &str) -> Option<&OperationHandler> {
        self.operations.get(action)
    }

    pub fn contains(&self, action: &str) -> bool {
        self.operations.contains_key(action)
    }

    /// Déclare un bloc d'en-tête traité par le serveur.
    pub fn understand_header(&mut self, namespace: &str, local: &str) {
        self.understood_headers.insert(QName {
            prefix: None,
            namespace: Some(namespace.to_string()).filter(|ns| !ns.is_empty()),
            local: local.to_string(),
        });
    }

    /// Vrai si le bloc d'en-tête de ce nom est traité par le serveur.
    pub fn understands(&self, name: &QName) -> bool {
        self.understood_headers
            .iter()
            .any(|known| known.matches(name.namespace.as_deref(), &name.local))
    }

    /// Actions enregistrées, triées.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("actions", &self.actions())
            .field("understood_headers", &self.understood_headers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation;
    use crate::operations::OperationOutput;

    fn noop() -> OperationHandler {
        operation!(|_request| { Ok(OperationOutput::empty()) })
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = OperationRegistry::new();
        registry.register("Echo", noop()).unwrap();
        registry.register("Add", noop()).unwrap();

        assert!(registry.lookup("Echo").is_some());
        assert!(registry.lookup("echo").is_none());
        assert_eq!(registry.actions(), ["Add", "Echo"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_rejects_empty_and_duplicates() {
        let mut registry = OperationRegistry::new();
        assert_eq!(registry.register("", noop()), Err(RegistryError::EmptyAction));

        registry.register("Echo", noop()).unwrap();
        assert_eq!(
            registry.register("Echo", noop()),
            Err(RegistryError::DuplicateAction("Echo".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_understood_headers_ignore_prefix() {
        let mut registry = OperationRegistry::new();
        registry.understand_header("urn:trace", "Trace");

        assert!(registry.understands(&QName::new("t", "urn:trace", "Trace")));
        assert!(registry.understands(&QName::new("other", "urn:trace", "Trace")));
        assert!(!registry.understands(&QName::new("t", "urn:other", "Trace")));
    }
}
