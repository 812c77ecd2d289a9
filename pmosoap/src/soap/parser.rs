//! Parser d'enveloppes SOAP 1.2
//!
//! L'arbre est construit par xmltree. Une seconde lecture quick-xml relève
//! les attributs avec leur préfixe, que l'arbre ne conserve pas : c'est ce
//! préfixe qui distingue `env:role` d'un `role` étranger.

use std::io::BufReader;

use quick_xml::{Reader, events::Event};
use xmltree::{Element, XMLNode};

use super::envelope::lexical_boolean;
use super::extension::{attribute, is_namespace_declaration};
use super::{
    Body, Code, Detail, Envelope, Extension, Fault, FaultCode, Header, HeaderItem, QName,
    ReasonText, SOAP_ENV_NS, Subcode,
};

/// Erreur de lecture ou d'écriture d'enveloppe.
///
/// Les variantes de lecture relèvent de la catégorie « enveloppe malformée ».
/// `InvalidName` et `Write` sont produites à la sérialisation.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("XML parse error: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("XML syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),

    #[error("Root element is not a SOAP 1.2 Envelope (found {0})")]
    NotAnEnvelope(String),

    #[error("Missing SOAP Body")]
    MissingBody,

    #[error("Unexpected element {0} in SOAP Envelope")]
    UnexpectedElement(String),

    #[error("Invalid value '{value}' for attribute {attribute}")]
    InvalidAttribute { attribute: String, value: String },

    #[error("Invalid SOAP Fault: {0}")]
    InvalidFault(String),

    #[error("Invalid XML name '{0}'")]
    InvalidName(String),

    #[error("XML write error: {0}")]
    Write(#[from] xmltree::Error),
}

/// Parse une enveloppe SOAP complète
pub fn parse_envelope(xml: &[u8]) -> Result<Envelope, EnvelopeError> {
    let reader = BufReader::new(xml);
    let mut root = Element::parse(reader)?;
    let mut attributes = qualified_attributes(xml)?.into_iter();
    restore_attributes(&mut root, &mut attributes);

    if !is_env(&root, "Envelope") {
        return Err(EnvelopeError::NotAnEnvelope(describe(&root)));
    }

    let mut header = None;
    let mut body = None;

    for child in child_elements(&root) {
        if is_env(child, "Header") && header.is_none() && body.is_none() {
            header = parse_header(child)?;
        } else if is_env(child, "Body") && body.is_none() {
            body = Some(parse_body(child)?);
        } else {
            return Err(EnvelopeError::UnexpectedElement(describe(child)));
        }
    }

    let body = body.ok_or(EnvelopeError::MissingBody)?;
    Ok(Envelope { header, body })
}

/// Attributs de chaque élément, dans l'ordre du document, avec leur nom tel
/// qu'écrit (`prefix:local`). Les déclarations de namespace sont écartées.
fn qualified_attributes(xml: &[u8]) -> Result<Vec<Vec<(String, String)>>, EnvelopeError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut elements = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                let mut attributes = Vec::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    if attr.key.as_namespace_binding().is_some() {
                        continue;
                    }
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr.decode_and_unescape_value(reader.decoder())?.into_owned();
                    attributes.push((key, value));
                }
                elements.push(attributes);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(elements)
}

/// Remplace les attributs de l'arbre, parcouru en préordre, par leur forme
/// préfixée.
fn restore_attributes<I>(element: &mut Element, attributes: &mut I)
where
    I: Iterator<Item = Vec<(String, String)>>,
{
    if let Some(found) = attributes.next() {
        element.attributes.clear();
        for (key, value) in found {
            element.attributes.insert(key, value);
        }
    }
    for child in element.children.iter_mut() {
        if let XMLNode::Element(e) = child {
            restore_attributes(e, attributes);
        }
    }
}

/// Sépare un nom d'attribut en (namespace, nom local).
fn attribute_name<'e>(element: &'e Element, key: &'e str) -> (Option<&'e str>, &'e str) {
    match key.split_once(':') {
        Some((prefix, local)) => (
            element.namespaces.as_ref().and_then(|ns| ns.get(prefix)),
            local,
        ),
        None => (None, key),
    }
}

fn is_env(element: &Element, local: &str) -> bool {
    element.name == local && element.namespace.as_deref() == Some(SOAP_ENV_NS)
}

fn describe(element: &Element) -> String {
    match element.namespace.as_deref() {
        Some(ns) if !ns.is_empty() => format!("{{{}}}{}", ns, element.name),
        _ => element.name.clone(),
    }
}

fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|n| n.as_element())
}

fn text_of(element: &Element) -> String {
    element
        .children
        .iter()
        .filter_map(|n| match n {
            XMLNode::Text(t) | XMLNode::CData(t) => Some(t.as_str()),
            _ => None,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Un en-tête sans bloc est normalisé en absence d'en-tête.
fn parse_header(element: &Element) -> Result<Option<Header>, EnvelopeError> {
    let items = child_elements(element)
        .map(parse_header_item)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((!items.is_empty()).then(|| Header::new(items)))
}

/// Seuls les attributs du namespace SOAP sont extraits ; un `role` ou un
/// `mustUnderstand` d'un autre namespace, ou sans namespace, reste dans le
/// contenu du bloc.
fn parse_header_item(element: &Element) -> Result<HeaderItem, EnvelopeError> {
    let is_soap_attribute = |key: &str| {
        let (namespace, local) = attribute_name(element, key);
        namespace == Some(SOAP_ENV_NS)
            && matches!(local, "encodingStyle" | "role" | "mustUnderstand" | "relay")
    };

    let mut content = element.clone();
    content
        .attributes
        .retain(|k, _| is_namespace_declaration(k) || !is_soap_attribute(k.as_str()));
    let mut item = HeaderItem::new(Extension::from(content));

    for (key, value) in element.attributes.iter().filter(|(k, _)| is_soap_attribute(k.as_str())) {
        let (_, local) = attribute_name(element, key);
        match local {
            "encodingStyle" => item.encoding_style = Some(value.clone()),
            "role" => item.role = Some(value.clone()),
            "mustUnderstand" => item.set_must_understand(Some(lexical_boolean(local, value)?)),
            _ => item.set_relay(Some(lexical_boolean(local, value)?)),
        }
    }

    Ok(item)
}

fn parse_body(element: &Element) -> Result<Body, EnvelopeError> {
    let mut children = child_elements(element).peekable();
    match children.peek() {
        Some(first) if is_env(first, "Fault") => Ok(Body::Fault(parse_fault(first)?)),
        _ => Ok(Body::Payload(
            children.map(|e| Extension::from(e.clone())).collect(),
        )),
    }
}

fn parse_fault(element: &Element) -> Result<Fault, EnvelopeError> {
    let mut code = None;
    let mut fault_reason = Vec::new();
    let mut node = None;
    let mut role = None;
    let mut detail = None;

    for child in child_elements(element) {
        if is_env(child, "Code") {
            code = Some(parse_code(child)?);
        } else if is_env(child, "Reason") {
            for text in child_elements(child).filter(|e| is_env(e, "Text")) {
                fault_reason.push(ReasonText {
                    lang: attribute(text, "lang").unwrap_or_default().to_string(),
                    text: text_of(text),
                });
            }
        } else if is_env(child, "Node") {
            node = Some(text_of(child));
        } else if is_env(child, "Role") {
            role = Some(text_of(child));
        } else if is_env(child, "Detail") {
            detail = Some(Detail {
                entries: child_elements(child)
                    .map(|e| Extension::from(e.clone()))
                    .collect(),
            });
        } else {
            return Err(EnvelopeError::InvalidFault(format!(
                "unexpected element {}",
                describe(child)
            )));
        }
    }

    let code = code.ok_or_else(|| EnvelopeError::InvalidFault("missing Code".to_string()))?;
    Ok(Fault {
        code,
        reason: fault_reason,
        node,
        role,
        detail,
    })
}

fn parse_code(element: &Element) -> Result<Code, EnvelopeError> {
    let value = child_elements(element)
        .find(|e| is_env(e, "Value"))
        .map(parse_qname_value)
        .ok_or_else(|| EnvelopeError::InvalidFault("missing Code/Value".to_string()))?;

    let value = FaultCode::from_qname(&value)
        .ok_or_else(|| EnvelopeError::InvalidFault(format!("unknown fault code {}", value)))?;

    let subcode = child_elements(element)
        .find(|e| is_env(e, "Subcode"))
        .map(parse_subcode)
        .transpose()?
        .map(Box::new);

    Ok(Code { value, subcode })
}

fn parse_subcode(element: &Element) -> Result<Subcode, EnvelopeError> {
    let value = child_elements(element)
        .find(|e| is_env(e, "Value"))
        .map(parse_qname_value)
        .ok_or_else(|| EnvelopeError::InvalidFault("missing Subcode/Value".to_string()))?;

    let subcode = child_elements(element)
        .find(|e| is_env(e, "Subcode"))
        .map(parse_subcode)
        .transpose()?
        .map(Box::new);

    Ok(Subcode { value, subcode })
}

/// Lit une valeur de type xs:QName en résolvant son préfixe dans les
/// déclarations en portée sur l'élément.
fn parse_qname_value(element: &Element) -> QName {
    let text = text_of(element);
    QName::parse_lexical(&text, |prefix| {
        element.namespaces.as_ref().and_then(|ns| ns.get(prefix))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "http://www.w3.org/2003/05/soap-envelope";

    #[test]
    fn test_parse_payload() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<e:Envelope xmlns:e="http://www.w3.org/2003/05/soap-envelope">
  <e:Body>
    <Foo>
      <a>alpha</a>
      <b>bandit</b>
      <c>42</c>
    </Foo>
  </e:Body>
</e:Envelope>"#;

        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        assert!(envelope.header.is_none());

        let payload = envelope.body.payload().unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].name(), "Foo");
        assert_eq!(payload[0].child("c").unwrap().text_content(), "42");
    }

    #[test]
    fn test_reject_foreign_root() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body/></s:Envelope>"#;
        let err = parse_envelope(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, EnvelopeError::NotAnEnvelope(_)));

        let err = parse_envelope(b"<Envelope/>").unwrap_err();
        assert!(matches!(err, EnvelopeError::NotAnEnvelope(_)));
    }

    #[test]
    fn test_reject_missing_body_and_garbage() {
        let xml = format!(r#"<env:Envelope xmlns:env="{}"></env:Envelope>"#, NS);
        assert!(matches!(
            parse_envelope(xml.as_bytes()),
            Err(EnvelopeError::MissingBody)
        ));

        assert!(matches!(
            parse_envelope(b"not xml at all"),
            Err(EnvelopeError::Xml(_))
        ));

        let xml = format!(
            r#"<env:Envelope xmlns:env="{}"><env:Body/><Extra/></env:Envelope>"#,
            NS
        );
        assert!(matches!(
            parse_envelope(xml.as_bytes()),
            Err(EnvelopeError::UnexpectedElement(_))
        ));
    }

    #[test]
    fn test_header_items_keep_order_and_attributes() {
        let xml = format!(
            r#"<env:Envelope xmlns:env="{}" xmlns:t="urn:t">
  <env:Header>
    <t:First env:mustUnderstand="1" env:role="urn:role" custom="x">one</t:First>
    <t:Second env:relay="false"><t:Nested/></t:Second>
  </env:Header>
  <env:Body/>
</env:Envelope>"#,
            NS
        );

        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        let items = envelope.header_items();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].content.name(), "First");
        assert_eq!(items[0].content.namespace(), Some("urn:t"));
        assert_eq!(items[0].must_understand(), Some(true));
        assert_eq!(items[0].role.as_deref(), Some("urn:role"));
        assert_eq!(items[0].content.attribute("custom"), Some("x"));
        assert_eq!(items[0].content.attribute("role"), None);

        assert_eq!(items[1].relay(), Some(false));
        assert!(items[1].must_understand().is_none());
        assert_eq!(items[1].content.children().count(), 1);
    }

    #[test]
    fn test_empty_header_normalized() {
        let xml = format!(
            r#"<env:Envelope xmlns:env="{}"><env:Header/><env:Body/></env:Envelope>"#,
            NS
        );
        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        assert!(envelope.header.is_none());
    }

    #[test]
    fn test_invalid_must_understand() {
        let xml = format!(
            r#"<env:Envelope xmlns:env="{}"><env:Header><X env:mustUnderstand="yes"/></env:Header><env:Body/></env:Envelope>"#,
            NS
        );
        assert!(matches!(
            parse_envelope(xml.as_bytes()),
            Err(EnvelopeError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_foreign_role_stays_in_content() {
        let xml = format!(
            r#"<env:Envelope xmlns:env="{}" xmlns:x="urn:x">
  <env:Header>
    <t:Trace xmlns:t="urn:t" x:role="urn:not-soap" env:role="urn:soap-role">1</t:Trace>
  </env:Header>
  <env:Body/>
</env:Envelope>"#,
            NS
        );

        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        let item = &envelope.header_items()[0];
        assert_eq!(item.role.as_deref(), Some("urn:soap-role"));
        assert_eq!(item.content.as_element().attributes.get("x:role").map(String::as_str), Some("urn:not-soap"));
        assert!(!item.content.as_element().attributes.contains_key("env:role"));
    }

    #[test]
    fn test_foreign_must_understand_is_not_interpreted() {
        let xml = format!(
            r#"<env:Envelope xmlns:env="{}" xmlns:x="urn:x">
  <env:Header>
    <A x:mustUnderstand="maybe"/>
    <B mustUnderstand="true" relay="whatever"/>
  </env:Header>
  <env:Body/>
</env:Envelope>"#,
            NS
        );

        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        let items = envelope.header_items();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].must_understand(), None);
        assert_eq!(items[0].content.attribute("mustUnderstand"), Some("maybe"));

        assert_eq!(items[1].must_understand(), None);
        assert_eq!(items[1].relay(), None);
        assert_eq!(items[1].content.attribute("mustUnderstand"), Some("true"));
    }

    #[test]
    fn test_foreign_attributes_survive_round_trip() {
        let xml = format!(
            r#"<env:Envelope xmlns:env="{}"><env:Header><t:T xmlns:t="urn:t" xmlns:x="urn:x" x:mustUnderstand="maybe" env:mustUnderstand="0"/></env:Header><env:Body/></env:Envelope>"#,
            NS
        );

        let first = parse_envelope(xml.as_bytes()).unwrap();
        let again = parse_envelope(&first.marshal().unwrap()).unwrap();
        assert_eq!(again, first);
        assert_eq!(again.header_items()[0].must_understand(), Some(false));
        assert_eq!(again.header_items()[0].content.attribute("mustUnderstand"), Some("maybe"));
    }

    #[test]
    fn test_parse_fault_with_subcodes() {
        let xml = format!(
            r#"<env:Envelope xmlns:env="{}" xmlns:rpc="http://www.w3.org/2003/05/soap-rpc">
  <env:Body>
    <env:Fault>
      <env:Code>
        <env:Value>env:Sender</env:Value>
        <env:Subcode>
          <env:Value>rpc:BadArguments</env:Value>
          <env:Subcode><env:Value xmlns:app="urn:app">app:Overflow</env:Value></env:Subcode>
        </env:Subcode>
      </env:Code>
      <env:Reason><env:Text xml:lang="en">Value too large</env:Text></env:Reason>
      <env:Detail><app:Limit xmlns:app="urn:app">10</app:Limit></env:Detail>
    </env:Fault>
  </env:Body>
</env:Envelope>"#,
            NS
        );

        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        let fault = envelope.body.fault().unwrap();
        assert_eq!(fault.kind(), FaultCode::Sender);

        let subcodes = fault.code.subcodes();
        assert_eq!(subcodes.len(), 2);
        assert_eq!(
            subcodes[0],
            &QName::new("rpc", "http://www.w3.org/2003/05/soap-rpc", "BadArguments")
        );
        assert_eq!(subcodes[1], &QName::new("app", "urn:app", "Overflow"));

        assert_eq!(fault.message(), Some("Value too large"));
        assert_eq!(fault.reason[0].lang, "en");
        let detail = fault.detail.as_ref().unwrap();
        assert_eq!(detail.entries[0].text_content(), "10");
    }

    #[test]
    fn test_fault_with_unknown_code_is_rejected() {
        let xml = format!(
            r#"<env:Envelope xmlns:env="{}"><env:Body><env:Fault><env:Code><env:Value>env:Oops</env:Value></env:Code></env:Fault></env:Body></env:Envelope>"#,
            NS
        );
        assert!(matches!(
            parse_envelope(xml.as_bytes()),
            Err(EnvelopeError::InvalidFault(_))
        ));
    }
}
