//! Capture opaque des éléments XML non interprétés.
//!
//! Les blocs d'en-tête, le contenu du Body et le `Detail` d'un fault sont
//! conservés tels quels sous forme d'arbre [`xmltree::Element`], pour
//! pouvoir être relayés sans re-parsing.

use xmltree::{Element, XMLNode};

use super::QName;

/// Élément XML opaque.
///
/// L'égalité est structurelle et tient compte des namespaces : URI de
/// namespace, nom local, attributs, éléments enfants et texte non blanc.
/// Les préfixes et les déclarations `xmlns` n'y participent pas.
#[derive(Debug, Clone)]
pub struct Extension {
    element: Element,
}

impl Extension {
    /// Crée un élément sans namespace.
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            element: Element::new(&name),
        }
    }

    /// Crée un élément dans un namespace, écrit avec le préfixe donné.
    pub fn qualified(prefix: &str, namespace: &str, name: &str) -> Self {
        let mut element = Element::new(name);
        if !prefix.is_empty() {
            element.prefix = Some(prefix.to_string());
        }
        element.namespace = Some(namespace.to_string());
        Self { element }
    }

    /// Crée un élément feuille contenant du texte.
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name).with_text(text)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.element.children.push(XMLNode::Text(text.into()));
        self
    }

    pub fn with_child(mut self, child: Extension) -> Self {
        self.element.children.push(XMLNode::Element(child.element));
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.element.attributes.insert(name.into(), value.into());
        self
    }

    /// Nom local de l'élément.
    pub fn name(&self) -> &str {
        &self.element.name
    }

    /// URI du namespace de l'élément.
    pub fn namespace(&self) -> Option<&str> {
        self.element.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// Nom qualifié de l'élément.
    pub fn qname(&self) -> QName {
        QName {
            prefix: self.element.prefix.clone(),
            namespace: self.namespace().map(str::to_string),
            local: self.element.name.clone(),
        }
    }

    /// Texte concaténé des nœuds texte directs.
    pub fn text_content(&self) -> String {
        self.element
            .get_text()
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }

    /// Valeur d'un attribut, par nom local.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        attribute(&self.element, local)
    }

    /// Éléments enfants.
    pub fn children(&self) -> impl Iterator<Item = Extension> + '_ {
        self.element
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .map(|e| Extension { element: e.clone() })
    }

    /// Premier enfant portant ce nom local.
    pub fn child(&self, name: &str) -> Option<Extension> {
        self.children().find(|c| c.name() == name)
    }

    pub fn as_element(&self) -> &Element {
        &self.element
    }

    pub fn into_element(self) -> Element {
        self.element
    }
}

impl From<Element> for Extension {
    fn from(element: Element) -> Self {
        Self { element }
    }
}

impl PartialEq for Extension {
    fn eq(&self, other: &Self) -> bool {
        same_element(&self.element, &other.element)
    }
}

/// Recherche un attribut par nom local, qu'il ait été stocké avec ou sans
/// son préfixe.
pub(crate) fn attribute<'e>(element: &'e Element, local: &str) -> Option<&'e str> {
    element
        .attributes
        .iter()
        .find(|(k, _)| attribute_local(k) == local && !is_namespace_declaration(k))
        .map(|(_, v)| v.as_str())
}

pub(crate) fn attribute_local(key: &str) -> &str {
    key.rsplit_once(':').map(|(_, l)| l).unwrap_or(key)
}

pub(crate) fn is_namespace_declaration(key: &str) -> bool {
    key == "xmlns" || key.starts_with("xmlns:")
}

/// Namespace lié à `prefix` sur l'élément, qu'il vienne du parsing ou d'une
/// déclaration posée à la main.
fn prefix_namespace(element: &Element, prefix: &str) -> Option<String> {
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
}

fn same_element(a: &Element, b: &Element) -> bool {
    let ns = |e: &Element| e.namespace.clone().filter(|n| !n.is_empty());
    if a.name != b.name || ns(a) != ns(b) {
        return false;
    }

    let attrs = |e: &Element| {
        let mut v: Vec<(Option<String>, String, String)> = e
            .attributes
            .iter()
            .filter(|(k, _)| !is_namespace_declaration(k))
            .map(|(k, v)| {
                let namespace = k.split_once(':').and_then(|(p, _)| prefix_namespace(e, p));
                (namespace, attribute_local(k).to_string(), v.clone())
            })
            .collect();
        v.sort();
        v
    };
    if attrs(a) != attrs(b) {
        return false;
    }

    let children = |e: &Element| -> Vec<XMLNode> {
        e.children
            .iter()
            .filter(|n| match n {
                XMLNode::Element(_) => true,
                XMLNode::Text(t) | XMLNode::CData(t) => !t.trim().is_empty(),
                _ => false,
            })
            .cloned()
            .collect()
    };
    let (ca, cb) = (children(a), children(b));
    ca.len() == cb.len()
        && ca.iter().zip(cb.iter()).all(|pair| match pair {
            (XMLNode::Element(x), XMLNode::Element(y)) => same_element(x, y),
            (XMLNode::Text(x) | XMLNode::CData(x), XMLNode::Text(y) | XMLNode::CData(y)) => {
                x.trim() == y.trim()
            }
            _ => false,
        })
}
