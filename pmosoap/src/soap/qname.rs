//! Noms qualifiés XML (`prefix:local`) utilisés par les codes de fault.

use std::fmt;

/// Nom qualifié XML.
///
/// Le préfixe est conservé pour la sérialisation, l'URI de namespace est
/// celle que le préfixe désigne. Sur le fil, la valeur s'écrit
/// `prefix:local` et le namespace est déclaré sur l'élément qui la porte
/// s'il n'est pas déjà en portée.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    /// Crée un nom qualifié lié à un namespace.
    pub fn new(prefix: impl Into<String>, namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }

    /// Crée un nom sans préfixe ni namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            namespace: None,
            local: local.into(),
        }
    }

    /// Forme lexicale `prefix:local` (ou `local` sans préfixe).
    pub fn lexical(&self) -> String {
        match &self.prefix {
            Some(p) if !p.is_empty() => format!("{}:{}", p, self.local),
            _ => self.local.clone(),
        }
    }

    /// Compare namespace et nom local, en ignorant le préfixe.
    pub fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        self.namespace.as_deref() == namespace && self.local == local
    }

    /// Découpe une forme lexicale `prefix:local` et résout le préfixe.
    ///
    /// `resolve` reçoit le préfixe (chaîne vide pour le namespace par défaut)
    /// et retourne l'URI en portée.
    pub(crate) fn parse_lexical<'a, F>(text: &str, resolve: F) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let text = text.trim();
        match text.split_once(':') {
            Some((prefix, local)) => Self {
                prefix: Some(prefix.to_string()),
                namespace: resolve(prefix).map(str::to_string),
                local: local.to_string(),
            },
            None => Self {
                prefix: None,
                namespace: resolve("").filter(|ns| !ns.is_empty()).map(str::to_string),
                local: text.to_string(),
            },
        }
    }
}

/// Nom XML sans deux-points (NCName).
///
/// Les classes de caractères d'XML 1.0 sont approchées par celles d'Unicode.
pub(crate) fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}'))
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}
