//! Structures de l'enveloppe SOAP 1.2

use super::{Extension, Fault, QName, parser, writer};
use crate::soap::EnvelopeError;

/// Enveloppe SOAP complète
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// En-tête optionnel. Un en-tête sans bloc n'est jamais écrit.
    pub header: Option<Header>,

    /// Corps : contenu applicatif ou fault
    pub body: Body,
}

/// En-tête SOAP : blocs ordonnés (l'ordre est celui du traitement).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    pub items: Vec<HeaderItem>,
}

/// Bloc d'en-tête.
///
/// Le contenu est opaque ; seuls les quatre attributs SOAP sont extraits.
/// Un attribut absent reste `None`, il n'est pas ramené à `false`.
/// `mustUnderstand` et `relay` sont des xs:boolean déjà validés : leur
/// forme écrite est `true` / `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderItem {
    pub content: Extension,
    pub encoding_style: Option<String>,
    pub role: Option<String>,
    must_understand: Option<bool>,
    relay: Option<bool>,
}

/// Corps SOAP : soit un contenu applicatif, soit un fault, jamais les deux.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Payload(Vec<Extension>),
    Fault(Fault),
}

impl Envelope {
    /// Crée une nouvelle enveloppe sans en-tête
    pub fn new(body: Body) -> Self {
        Self { header: None, body }
    }

    /// Crée une nouvelle enveloppe avec header
    pub fn with_header(header: Header, body: Body) -> Self {
        Self {
            header: Some(header),
            body,
        }
    }

    /// Enveloppe dont le corps est un fault.
    pub fn fault(fault: Fault) -> Self {
        Self::new(Body::Fault(fault))
    }

    /// Blocs d'en-tête (vide si pas d'en-tête).
    pub fn header_items(&self) -> &[HeaderItem] {
        self.header.as_ref().map(|h| h.items.as_slice()).unwrap_or(&[])
    }

    /// Sérialise l'enveloppe en XML.
    pub fn to_xml(&self) -> Result<String, EnvelopeError> {
        let bytes = self.marshal()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Sérialise l'enveloppe en octets UTF-8.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::InvalidName`] si un nom d'élément ou d'attribut n'est
    /// pas un nom XML valide ou utilise un préfixe non déclaré.
    pub fn marshal(&self) -> Result<Vec<u8>, EnvelopeError> {
        writer::write_envelope(self)
    }

    /// Parse une enveloppe SOAP 1.2.
    ///
    /// # Errors
    ///
    /// Toute erreur retournée correspond à une enveloppe malformée.
    pub fn unmarshal(xml: &[u8]) -> Result<Self, EnvelopeError> {
        parser::parse_envelope(xml)
    }
}

impl Header {
    pub fn new(items: Vec<HeaderItem>) -> Self {
        Self { items }
    }

    /// Un en-tête sans bloc ne porte aucune information.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: HeaderItem) {
        self.items.push(item);
    }
}

impl HeaderItem {
    pub fn new(content: Extension) -> Self {
        Self {
            content,
            encoding_style: None,
            role: None,
            must_understand: None,
            relay: None,
        }
    }

    pub fn with_encoding_style(mut self, uri: impl Into<String>) -> Self {
        self.encoding_style = Some(uri.into());
        self
    }

    pub fn with_role(mut self, uri: impl Into<String>) -> Self {
        self.role = Some(uri.into());
        self
    }

    pub fn with_must_understand(mut self, value: bool) -> Self {
        self.must_understand = Some(value);
        self
    }

    pub fn with_relay(mut self, value: bool) -> Self {
        self.relay = Some(value);
        self
    }

    pub fn set_must_understand(&mut self, value: Option<bool>) {
        self.must_understand = value;
    }

    pub fn set_relay(&mut self, value: Option<bool>) {
        self.relay = value;
    }

    /// Positionne `mustUnderstand` depuis sa forme lexicale xs:boolean.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::InvalidAttribute`] si la valeur n'est ni `true`,
    /// `false`, `1` ou `0`.
    pub fn with_must_understand_str(self, value: &str) -> Result<Self, EnvelopeError> {
        let flag = lexical_boolean("mustUnderstand", value)?;
        Ok(self.with_must_understand(flag))
    }

    /// Positionne `relay` depuis sa forme lexicale xs:boolean.
    pub fn with_relay_str(self, value: &str) -> Result<Self, EnvelopeError> {
        let flag = lexical_boolean("relay", value)?;
        Ok(self.with_relay(flag))
    }

    /// Nom qualifié du bloc.
    pub fn qname(&self) -> QName {
        self.content.qname()
    }

    /// `mustUnderstand` (`None` si absent).
    pub fn must_understand(&self) -> Option<bool> {
        self.must_understand
    }

    /// `relay` (`None` si absent).
    pub fn relay(&self) -> Option<bool> {
        self.relay
    }
}

impl Body {
    /// Corps sans contenu.
    pub fn empty() -> Self {
        Body::Payload(Vec::new())
    }

    pub fn payload(&self) -> Option<&[Extension]> {
        match self {
            Body::Payload(p) => Some(p),
            Body::Fault(_) => None,
        }
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Body::Fault(f) => Some(f),
            Body::Payload(_) => None,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Body::Fault(_))
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

/// Espace lexical de xs:boolean.
fn parse_xs_boolean(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

pub(crate) fn lexical_boolean(attribute: &str, value: &str) -> Result<bool, EnvelopeError> {
    parse_xs_boolean(value).ok_or_else(|| EnvelopeError::InvalidAttribute {
        attribute: attribute.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_item_booleans() {
        let item = HeaderItem::new(Extension::new("Trace")).with_must_understand(true);
        assert_eq!(item.must_understand(), Some(true));
        assert_eq!(item.relay(), None);

        let raw = HeaderItem::new(Extension::new("Trace"))
            .with_relay_str(" 0 ")
            .unwrap();
        assert_eq!(raw.relay(), Some(false));

        let mut cleared = raw.clone();
        cleared.set_relay(None);
        assert_eq!(cleared.relay(), None);
    }

    #[test]
    fn test_header_item_rejects_invalid_booleans() {
        let err = HeaderItem::new(Extension::new("Trace"))
            .with_must_understand_str("yes")
            .unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::InvalidAttribute { ref attribute, ref value }
                if attribute == "mustUnderstand" && value == "yes"
        ));
        assert!(HeaderItem::new(Extension::new("Trace")).with_relay_str("").is_err());
    }

    #[test]
    fn test_body_accessors() {
        let body = Body::Payload(vec![Extension::new("Foo")]);
        assert_eq!(body.payload().map(|p| p.len()), Some(1));
        assert!(body.fault().is_none());
        assert!(!body.is_fault());
    }
}
