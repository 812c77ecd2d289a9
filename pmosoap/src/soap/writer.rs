//! Sérialisation des enveloppes.
//!
//! L'enveloppe est convertie en arbre [`xmltree::Element`] puis écrite par
//! l'émetteur xmltree. Les noms sont posés sous leur forme `prefix:local` et
//! les déclarations `xmlns` sont calculées ici :
//!
//! - le préfixe `env` est déclaré une seule fois, sur la racine ;
//! - le namespace d'un élément opaque n'est redéclaré que s'il n'est pas en portée ;
//! - un préfixe déjà lié à un autre namespace est remplacé par un préfixe généré (`ns1`, `ns2`...).

use xmltree::{Element, EmitterConfig, XMLNode};

use super::extension::is_namespace_declaration;
use super::qname::is_ncname;
use super::{Body, Envelope, EnvelopeError, Fault, HeaderItem, QName, SOAP_ENV_NS, Subcode};

const ENV_PREFIX: &str = "env";
const XML_PREFIX: &str = "xml";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

type Binding = (String, String);

/// Sérialise une enveloppe (déclaration XML incluse).
pub(crate) fn write_envelope(envelope: &Envelope) -> Result<Vec<u8>, EnvelopeError> {
    let root = TreeBuilder::new().envelope(envelope)?;

    let mut buf = Vec::new();
    let config = EmitterConfig::new().write_document_declaration(true);
    root.write_with_config(&mut buf, config)?;
    Ok(buf)
}

/// Déclarations portées par l'élément en cours de construction.
struct Frame {
    bindings: Vec<Binding>,
    /// Préfixes employés par le nom de l'élément et ses attributs.
    used: Vec<String>,
    /// `env` doit rester lié au namespace SOAP sur cet élément.
    keeps_env: bool,
}

impl Frame {
    fn new(keeps_env: bool) -> Self {
        Self {
            bindings: Vec::new(),
            used: Vec::new(),
            keeps_env,
        }
    }

    fn uses(&self, prefix: &str) -> bool {
        self.used.iter().any(|p| p == prefix)
    }

    fn declared(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.as_str())
    }

    fn declare(&mut self, prefix: &str, namespace: &str) {
        self.bindings.push((prefix.to_string(), namespace.to_string()));
    }

    fn apply_to(&self, element: &mut Element) {
        let mut bindings = self.bindings.clone();
        bindings.sort();
        for (prefix, namespace) in bindings {
            let key = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", prefix)
            };
            element.attributes.insert(key, namespace);
        }
    }
}

struct TreeBuilder {
    scopes: Vec<Vec<Binding>>,
    generated: usize,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            scopes: vec![vec![
                (String::new(), String::new()),
                (XML_PREFIX.to_string(), XML_NS.to_string()),
            ]],
            generated: 0,
        }
    }

    fn lookup(&self, prefix: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.as_str())
    }

    fn bound<'a>(&'a self, frame: &'a Frame, prefix: &str) -> Option<&'a str> {
        frame.declared(prefix).or_else(|| self.lookup(prefix))
    }

    /// Préfixe sous lequel écrire un nom de `namespace`, en gardant si
    /// possible le préfixe d'origine.
    fn prefix_for(&mut self, frame: &mut Frame, wanted: &str, namespace: &str) -> String {
        let prefix = self.choose_prefix(frame, wanted, namespace);
        frame.used.push(prefix.clone());
        prefix
    }

    fn choose_prefix(&mut self, frame: &mut Frame, wanted: &str, namespace: &str) -> String {
        if namespace == XML_NS {
            return XML_PREFIX.to_string();
        }

        let usable = !wanted.is_empty()
            && wanted != XML_PREFIX
            && wanted != "xmlns"
            && !(frame.keeps_env && wanted == ENV_PREFIX && namespace != SOAP_ENV_NS);

        if usable {
            if self.bound(frame, wanted) == Some(namespace) {
                return wanted.to_string();
            }
            if frame.declared(wanted).is_none() {
                frame.declare(wanted, namespace);
                return wanted.to_string();
            }
        }

        self.fresh_prefix(frame, namespace)
    }

    fn fresh_prefix(&mut self, frame: &mut Frame, namespace: &str) -> String {
        if let Some((prefix, _)) = frame
            .bindings
            .iter()
            .find(|(p, ns)| !p.is_empty() && ns == namespace)
        {
            return prefix.clone();
        }
        loop {
            self.generated += 1;
            let candidate = format!("ns{}", self.generated);
            if self.bound(frame, &candidate).is_none() {
                frame.declare(&candidate, namespace);
                return candidate;
            }
        }
    }

    fn default_namespace(&self, frame: &mut Frame, namespace: &str) {
        if self.bound(frame, "") != Some(namespace) {
            frame.declare("", namespace);
        }
        frame.used.push(String::new());
    }

    fn envelope(mut self, envelope: &Envelope) -> Result<Element, EnvelopeError> {
        let mut root = env_element("Envelope");
        root.attributes
            .insert(format!("xmlns:{}", ENV_PREFIX), SOAP_ENV_NS.to_string());
        self.scopes
            .push(vec![(ENV_PREFIX.to_string(), SOAP_ENV_NS.to_string())]);

        if let Some(header) = envelope.header.as_ref().filter(|h| !h.is_empty()) {
            let mut element = env_element("Header");
            for item in &header.items {
                element
                    .children
                    .push(XMLNode::Element(self.header_item(item)?));
            }
            root.children.push(XMLNode::Element(element));
        }

        let mut body = env_element("Body");
        match &envelope.body {
            Body::Payload(payload) => {
                for entry in payload {
                    let element = self.opaque(entry.as_element(), &[], &[])?;
                    body.children.push(XMLNode::Element(element));
                }
            }
            Body::Fault(fault) => body.children.push(XMLNode::Element(self.fault(fault)?)),
        }
        root.children.push(XMLNode::Element(body));

        Ok(root)
    }

    fn header_item(&mut self, item: &HeaderItem) -> Result<Element, EnvelopeError> {
        let mut soap_attributes = Vec::new();
        for (name, value) in [
            ("encodingStyle", item.encoding_style.clone()),
            ("role", item.role.clone()),
            ("mustUnderstand", item.must_understand().map(|b| b.to_string())),
            ("relay", item.relay().map(|b| b.to_string())),
        ] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                soap_attributes.push((name, value));
            }
        }
        self.opaque(item.content.as_element(), &[], &soap_attributes)
    }

    fn fault(&mut self, fault: &Fault) -> Result<Element, EnvelopeError> {
        let mut element = env_element("Fault");

        let mut code = env_element("Code");
        code.children.push(XMLNode::Element(env_text_element(
            "Value",
            &format!("{}:{}", ENV_PREFIX, fault.code.value.as_str()),
        )));
        if let Some(subcode) = &fault.code.subcode {
            code.children.push(XMLNode::Element(self.subcode(subcode)?));
        }
        element.children.push(XMLNode::Element(code));

        if !fault.reason.is_empty() {
            let mut reason = env_element("Reason");
            for text in &fault.reason {
                let mut entry = env_text_element("Text", &text.text);
                entry
                    .attributes
                    .insert(format!("{}:lang", XML_PREFIX), text.lang.clone());
                reason.children.push(XMLNode::Element(entry));
            }
            element.children.push(XMLNode::Element(reason));
        }

        if let Some(node) = &fault.node {
            element
                .children
                .push(XMLNode::Element(env_text_element("Node", node)));
        }
        if let Some(role) = &fault.role {
            element
                .children
                .push(XMLNode::Element(env_text_element("Role", role)));
        }

        if let Some(detail) = &fault.detail {
            let mut entries = env_element("Detail");
            for entry in &detail.entries {
                let child = self.opaque(entry.as_element(), &[], &[])?;
                entries.children.push(XMLNode::Element(child));
            }
            element.children.push(XMLNode::Element(entries));
        }

        Ok(element)
    }

    fn subcode(&mut self, subcode: &Subcode) -> Result<Element, EnvelopeError> {
        let mut element = env_element("Subcode");
        element
            .children
            .push(XMLNode::Element(self.qname_value(&subcode.value)?));
        if let Some(inner) = &subcode.subcode {
            element.children.push(XMLNode::Element(self.subcode(inner)?));
        }
        Ok(element)
    }

    /// `env:Value` portant une valeur xs:QName, avec la déclaration de son
    /// préfixe si nécessaire.
    fn qname_value(&mut self, value: &QName) -> Result<Element, EnvelopeError> {
        check_ncname(&value.local)?;
        let mut frame = Frame::new(true);

        let prefix = value.prefix.as_deref().filter(|p| !p.is_empty());
        let namespace = value.namespace.as_deref().filter(|ns| !ns.is_empty());
        let lexical = match (prefix, namespace) {
            (Some(prefix), Some(namespace)) => {
                check_ncname(prefix)?;
                let prefix = self.prefix_for(&mut frame, prefix, namespace);
                format!("{}:{}", prefix, value.local)
            }
            (None, Some(namespace)) => {
                self.default_namespace(&mut frame, namespace);
                value.local.clone()
            }
            (None, None) => {
                self.default_namespace(&mut frame, "");
                value.local.clone()
            }
            (Some(_), None) => return Err(EnvelopeError::InvalidName(value.lexical())),
        };

        let mut element = env_text_element("Value", &lexical);
        frame.apply_to(&mut element);
        Ok(element)
    }

    /// Reconstruit un élément opaque et ses descendants.
    ///
    /// `inherited` contient les liaisons connues des ancêtres construits à la
    /// main, pour résoudre les préfixes de leurs attributs.
    fn opaque(
        &mut self,
        source: &Element,
        inherited: &[Binding],
        soap_attributes: &[(&str, String)],
    ) -> Result<Element, EnvelopeError> {
        let mut frame = Frame::new(!soap_attributes.is_empty());
        let name = self.element_name(&mut frame, source)?;

        let mut keys: Vec<(&String, &String)> = source
            .attributes
            .iter()
            .filter(|(k, _)| !is_namespace_declaration(k))
            .collect();
        keys.sort();

        let mut attributes = Vec::with_capacity(keys.len());
        for (key, value) in keys {
            let written = match key.split_once(':') {
                None => {
                    check_ncname(key)?;
                    key.clone()
                }
                Some((prefix, local)) => {
                    check_ncname(prefix)?;
                    check_ncname(local)?;
                    let namespace = source_namespace(source, inherited, prefix)
                        .ok_or_else(|| EnvelopeError::InvalidName(key.clone()))?;
                    let prefix = self.prefix_for(&mut frame, prefix, &namespace);
                    format!("{}:{}", prefix, local)
                }
            };
            attributes.push((written, value.clone()));
        }

        for (key, namespace) in source
            .attributes
            .iter()
            .filter(|(k, _)| is_namespace_declaration(k))
        {
            let prefix = key.trim_start_matches("xmlns").trim_start_matches(':');
            let skip = frame.declared(prefix).is_some()
                || frame.uses(prefix)
                || self.bound(&frame, prefix) == Some(namespace.as_str())
                || prefix == XML_PREFIX
                || prefix == "xmlns"
                || (!prefix.is_empty() && namespace.is_empty())
                || (frame.keeps_env && prefix == ENV_PREFIX);
            if !skip {
                frame.declare(prefix, namespace);
            }
        }

        let mut soap = Vec::with_capacity(soap_attributes.len());
        for (local, value) in soap_attributes {
            let prefix = self.prefix_for(&mut frame, ENV_PREFIX, SOAP_ENV_NS);
            soap.push((format!("{}:{}", prefix, local), value.clone()));
        }

        let mut element = Element::new(&name);
        frame.apply_to(&mut element);
        for (key, value) in attributes.into_iter().chain(soap) {
            element.attributes.insert(key, value);
        }

        let mut scope = inherited.to_vec();
        scope.extend(source_bindings(source));

        self.scopes.push(frame.bindings);
        let children = self.opaque_children(source, &scope);
        self.scopes.pop();
        element.children = children?;

        Ok(element)
    }

    fn opaque_children(
        &mut self,
        source: &Element,
        scope: &[Binding],
    ) -> Result<Vec<XMLNode>, EnvelopeError> {
        source
            .children
            .iter()
            .map(|child| match child {
                XMLNode::Element(e) => Ok(XMLNode::Element(self.opaque(e, scope, &[])?)),
                other => Ok(other.clone()),
            })
            .collect()
    }

    fn element_name(&mut self, frame: &mut Frame, source: &Element) -> Result<String, EnvelopeError> {
        check_ncname(&source.name)?;
        let prefix = source.prefix.as_deref().unwrap_or("");
        let namespace = source.namespace.as_deref().unwrap_or("");

        if namespace.is_empty() {
            if !prefix.is_empty() {
                return Err(EnvelopeError::InvalidName(format!("{}:{}", prefix, source.name)));
            }
            self.default_namespace(frame, "");
            return Ok(source.name.clone());
        }
        if prefix.is_empty() {
            self.default_namespace(frame, namespace);
            return Ok(source.name.clone());
        }

        check_ncname(prefix)?;
        let prefix = self.prefix_for(frame, prefix, namespace);
        Ok(format!("{}:{}", prefix, source.name))
    }
}

/// Namespace désigné par `prefix` sur un élément source, parsé ou construit.
fn source_namespace(element: &Element, inherited: &[Binding], prefix: &str) -> Option<String> {
    if prefix == XML_PREFIX {
        return Some(XML_NS.to_string());
    }
    element
        .namespaces
        .as_ref()
        .and_then(|ns| ns.get(prefix))
        .map(str::to_string)
        .or_else(|| {
            element
                .attributes
                .get(format!("xmlns:{}", prefix).as_str())
                .cloned()
        })
        .or_else(|| {
            (element.prefix.as_deref() == Some(prefix))
                .then(|| element.namespace.clone())
                .flatten()
        })
        .or_else(|| {
            inherited
                .iter()
                .rev()
                .find(|(p, _)| p == prefix)
                .map(|(_, ns)| ns.clone())
        })
        .filter(|ns| !ns.is_empty())
}

/// Liaisons qu'un élément source rend visibles à ses enfants.
fn source_bindings(element: &Element) -> Vec<Binding> {
    let mut bindings: Vec<Binding> = element
        .attributes
        .iter()
        .filter(|(k, _)| is_namespace_declaration(k))
        .map(|(k, v)| {
            let prefix = k.trim_start_matches("xmlns").trim_start_matches(':');
            (prefix.to_string(), v.clone())
        })
        .collect();
    if let (Some(prefix), Some(namespace)) = (&element.prefix, &element.namespace) {
        bindings.push((prefix.clone(), namespace.clone()));
    }
    bindings
}

fn check_ncname(name: &str) -> Result<(), EnvelopeError> {
    if is_ncname(name) {
        Ok(())
    } else {
        Err(EnvelopeError::InvalidName(name.to_string()))
    }
}

fn env_element(local: &str) -> Element {
    let name = format!("{}:{}", ENV_PREFIX, local);
    Element::new(&name)
}

fn env_text_element(local: &str, text: &str) -> Element {
    let mut element = env_element(local);
    element.children.push(XMLNode::Text(text.to_string()));
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::{Extension, FaultCode, Header, build_fault};

    fn to_xml(envelope: &Envelope) -> String {
        envelope.to_xml().expect("envelope should serialize")
    }

    #[test]
    fn test_empty_envelope() {
        let xml = to_xml(&Envelope::new(Body::empty()));
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope">"#));
        assert!(xml.contains("env:Body"));
        assert!(!xml.contains("env:Header"));
    }

    #[test]
    fn test_empty_header_is_elided() {
        let without = Envelope::new(Body::empty()).marshal().unwrap();
        let with_empty = Envelope::with_header(Header::default(), Body::empty())
            .marshal()
            .unwrap();
        assert_eq!(without, with_empty);
        assert!(!String::from_utf8_lossy(&with_empty).contains("Header"));
    }

    #[test]
    fn test_header_item_attributes_omitted_when_unset() {
        let item = HeaderItem::new(Extension::qualified("t", "urn:trace", "Trace").with_text("42"))
            .with_role("http://www.w3.org/2003/05/soap-envelope/role/next");
        let xml = to_xml(&Envelope::with_header(Header::new(vec![item]), Body::empty()));

        assert!(xml.contains(r#"xmlns:t="urn:trace""#));
        assert!(xml.contains(r#"env:role="http://www.w3.org/2003/05/soap-envelope/role/next""#));
        assert!(xml.contains(">42</t:Trace>"));
        assert!(!xml.contains("mustUnderstand"));
        assert!(!xml.contains("relay"));
        assert!(!xml.contains("encodingStyle"));
    }

    #[test]
    fn test_fault_serialization() {
        let fault = build_fault(
            FaultCode::Sender,
            "Action Nope not found",
            [QName::new("rpc", "http://www.w3.org/2003/05/soap-rpc", "ProcedureNotPresent")],
        );
        let xml = to_xml(&Envelope::fault(fault));

        assert!(xml.contains("<env:Code><env:Value>env:Sender</env:Value>"));
        assert!(xml.contains(
            r#"<env:Value xmlns:rpc="http://www.w3.org/2003/05/soap-rpc">rpc:ProcedureNotPresent</env:Value>"#
        ));
        assert!(xml.contains(r#"<env:Text xml:lang="en">Action Nope not found</env:Text>"#));
        assert!(!xml.contains("env:Detail"));
    }

    #[test]
    fn test_default_namespace_reset() {
        let inner = Extension::new("plain").with_text("x");
        let outer = Extension::qualified("", "urn:outer", "Outer").with_child(inner);
        let xml = to_xml(&Envelope::new(Body::Payload(vec![outer])));
        assert!(xml.contains(r#"<Outer xmlns="urn:outer"><plain xmlns="">x</plain></Outer>"#));
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = to_xml(&Envelope::new(Body::Payload(vec![Extension::text("a", "<b>&")])));
        assert!(xml.contains("<a>&lt;b&gt;&amp;</a>"));
    }

    #[test]
    fn test_subcode_prefix_env_gets_fresh_prefix() {
        let fault = build_fault(FaultCode::Sender, "clash", [QName::new("env", "urn:other", "Clash")]);
        let xml = to_xml(&Envelope::fault(fault));

        assert!(xml.contains("<env:Value>env:Sender</env:Value>"));
        assert!(xml.contains(r#"<env:Value xmlns:ns1="urn:other">ns1:Clash</env:Value>"#));
    }

    #[test]
    fn test_header_content_prefix_env_keeps_soap_attributes() {
        let item = HeaderItem::new(Extension::qualified("env", "urn:other", "Trace"))
            .with_must_understand(true);
        let xml = to_xml(&Envelope::with_header(Header::new(vec![item]), Body::empty()));

        assert!(xml.contains(r#"<ns1:Trace xmlns:ns1="urn:other" env:mustUnderstand="true""#));
        assert!(!xml.contains(r#"xmlns:env="urn:other""#));
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let err = Envelope::new(Body::Payload(vec![Extension::new("urn:svc/Op")]))
            .marshal()
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidName(_)));

        let err = Envelope::new(Body::Payload(vec![Extension::new("Op").with_attribute("a:b", "1")]))
            .marshal()
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidName(name) if name == "a:b"));

        let err = Envelope::new(Body::Payload(vec![Extension::new("a b")]))
            .marshal()
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidName(_)));
    }

    #[test]
    fn test_explicit_declaration_cannot_rebind_element_prefix() {
        let element = Extension::qualified("a", "urn:a", "Item").with_attribute("xmlns:a", "urn:b");
        let xml = to_xml(&Envelope::new(Body::Payload(vec![element])));
        assert!(xml.contains(r#"<a:Item xmlns:a="urn:a""#));
        assert!(!xml.contains("urn:b"));
    }

    #[test]
    fn test_attribute_prefix_from_parent_declaration() {
        let child = Extension::new("Leaf").with_attribute("x:id", "7");
        let parent = Extension::new("Root")
            .with_attribute("xmlns:x", "urn:x")
            .with_child(child);
        let xml = to_xml(&Envelope::new(Body::Payload(vec![parent])));

        assert!(xml.contains(r#"<Root xmlns:x="urn:x">"#));
        assert!(xml.contains(r#"<Leaf x:id="7""#));
    }
}
