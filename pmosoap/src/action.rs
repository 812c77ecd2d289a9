//! Résolution de l'action demandée par une requête SOAP 1.2.
//!
//! Deux sources sont possibles :
//!
//! - le paramètre `action` du `Content-Type` (binding HTTP SOAP 1.2), prioritaire ;
//! - l'en-tête historique `SOAPAction`, dont on garde le dernier segment après `/`.
//!
//! ```rust
//! use pmosoap::resolve_action;
//!
//! assert_eq!(
//!     resolve_action("application/soap+xml; action=Foo", "http://x/y/Bar").as_deref(),
//!     Some("Foo")
//! );
//! assert_eq!(
//!     resolve_action("application/soap+xml", "http://example.org/foo-header").as_deref(),
//!     Some("foo-header")
//! );
//! assert_eq!(resolve_action("", ""), None);
//! ```

/// Détermine l'identifiant d'action d'une requête.
///
/// Retourne `None` quand aucune action n'est spécifiée. La fonction est pure.
pub fn resolve_action(content_type: &str, soap_action: &str) -> Option<String> {
    if let Some(action) = content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("action="))
    {
        return Some(unquote(action).to_string());
    }

    let soap_action = unquote(soap_action.trim());
    if soap_action.is_empty() {
        return None;
    }

    // Dernier segment seulement, pas de traitement d'URI.
    let action = soap_action
        .rsplit_once('/')
        .map(|(_, last)| last)
        .unwrap_or(soap_action);
    Some(action.to_string())
}

/// Retire une paire de guillemets englobants.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_wins() {
        assert_eq!(
            resolve_action("application/soap+xml; action=Foo", "http://x/y/Bar"),
            Some("Foo".to_string())
        );
        assert_eq!(
            resolve_action("application/soap+xml;charset=utf-8;action=urn:svc/Op", ""),
            Some("urn:svc/Op".to_string())
        );
    }

    #[test]
    fn test_soap_action_fallback() {
        assert_eq!(
            resolve_action("application/soap+xml", "http://example.org/foo-header"),
            Some("foo-header".to_string())
        );
        assert_eq!(
            resolve_action("application/soap+xml", "Plain"),
            Some("Plain".to_string())
        );
    }

    #[test]
    fn test_nothing_specified() {
        assert_eq!(resolve_action("", ""), None);
        assert_eq!(resolve_action("application/soap+xml; charset=utf-8", ""), None);
    }

    #[test]
    fn test_action_prefix_is_case_sensitive() {
        assert_eq!(resolve_action("application/soap+xml; Action=Foo", ""), None);
    }

    #[test]
    fn test_quotes_are_stripped() {
        assert_eq!(
            resolve_action("application/soap+xml", "\"http://x/ns#Op/Echo\""),
            Some("Echo".to_string())
        );
        assert_eq!(
            resolve_action("application/soap+xml; action=\"Add\"", ""),
            Some("Add".to_string())
        );
    }

    #[test]
    fn test_trailing_slash_yields_empty_action() {
        assert_eq!(
            resolve_action("application/soap+xml", "http://x/y/"),
            Some(String::new())
        );
    }
}
