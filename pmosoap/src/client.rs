//! Construction des appels SOAP côté client.
//!
//! Aucune entrée/sortie ici : le module produit l'enveloppe et les en-têtes
//! HTTP d'un appel, et décode l'enveloppe reçue en retour.

use axum::http::{HeaderName, HeaderValue, header, header::InvalidHeaderValue};

use crate::soap::{
    Body, Envelope, EnvelopeError, Extension, Fault, Header, HeaderItem, SOAP_CONTENT_TYPE,
    is_ncname,
};

/// Construit l'enveloppe d'un appel RPC simple.
///
/// Pas d'en-tête ; le Body contient un élément nommé `action` avec un
/// enfant texte par argument, dans l'ordre donné.
///
/// ```rust
/// use pmosoap::build_call;
///
/// let envelope = build_call("Add", &[("a", "1"), ("b", "2")]).unwrap();
/// let call = &envelope.body.payload().unwrap()[0];
/// assert_eq!(call.name(), "Add");
/// assert_eq!(call.child("b").unwrap().text_content(), "2");
///
/// assert!(build_call("urn:svc/Op", &[]).is_err());
/// ```
///
/// # Errors
///
/// [`EnvelopeError::InvalidName`] si l'action ou un argument n'est pas un
/// nom XML sans préfixe.
pub fn build_call(action: &str, arguments: &[(&str, &str)]) -> Result<Envelope, EnvelopeError> {
    let call = CallBuilder::new(action)
        .args(arguments.iter().copied())
        .build()?;
    Ok(call.envelope)
}

/// Appel SOAP prêt à être envoyé.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapCall {
    pub action: String,
    pub namespace: Option<String>,
    pub envelope: Envelope,
}

impl SoapCall {
    /// `Content-Type` portant l'action (binding SOAP 1.2).
    pub fn content_type(&self) -> String {
        format!("{}; charset=utf-8; action={}", SOAP_CONTENT_TYPE, self.action)
    }

    /// Valeur de l'en-tête `SOAPAction`, entre guillemets.
    ///
    /// Son dernier segment est l'action, comme dans le `Content-Type`.
    pub fn soap_action(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("\"{}/{}\"", ns.trim_end_matches('/'), self.action),
            None => format!("\"{}\"", self.action),
        }
    }

    /// En-têtes HTTP de l'appel.
    ///
    /// # Errors
    ///
    /// Échoue si le namespace contient un caractère interdit dans un
    /// en-tête HTTP.
    pub fn http_headers(&self) -> Result<Vec<(HeaderName, HeaderValue)>, InvalidHeaderValue> {
        [
            (header::CONTENT_TYPE, self.content_type()),
            (HeaderName::from_static("soapaction"), self.soap_action()),
        ]
        .into_iter()
        .map(|(name, value)| Ok((name, HeaderValue::try_from(value)?)))
        .collect()
    }

    /// Corps HTTP de l'appel.
    pub fn body(&self) -> Result<Vec<u8>, EnvelopeError> {
        self.envelope.marshal()
    }
}

/// Builder d'appel SOAP.
///
/// ```rust
/// use pmosoap::CallBuilder;
///
/// let call = CallBuilder::new("Echo")
///     .namespace("urn:pmosoap:demo")
///     .arg("Text", "hello")
///     .build()
///     .unwrap();
///
/// assert_eq!(call.content_type(), "application/soap+xml; charset=utf-8; action=Echo");
/// assert_eq!(call.soap_action(), "\"urn:pmosoap:demo/Echo\"");
/// ```
#[derive(Debug, Clone)]
pub struct CallBuilder {
    action: String,
    namespace: Option<String>,
    arguments: Vec<Extension>,
    header: Vec<HeaderItem>,
}

impl CallBuilder {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            namespace: None,
            arguments: Vec::new(),
            header: Vec::new(),
        }
    }

    /// Namespace de l'élément d'appel (préfixe `m`).
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.push(Extension::text(name, value));
        self
    }

    pub fn args<'a, I>(self, arguments: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        arguments
            .into_iter()
            .fold(self, |builder, (name, value)| builder.arg(name, value))
    }

    /// Argument structuré.
    pub fn element(mut self, argument: Extension) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn header_item(mut self, item: HeaderItem) -> Self {
        self.header.push(item);
        self
    }

    /// # Errors
    ///
    /// [`EnvelopeError::InvalidName`] si l'action ou le nom d'un argument
    /// n'est pas un nom XML sans préfixe.
    pub fn build(self) -> Result<SoapCall, EnvelopeError> {
        let invalid = std::iter::once(self.action.as_str())
            .chain(self.arguments.iter().map(Extension::name))
            .find(|name| !is_ncname(name));
        if let Some(name) = invalid {
            return Err(EnvelopeError::InvalidName(name.to_string()));
        }

        let call = match &self.namespace {
            Some(ns) => Extension::qualified("m", ns, &self.action),
            None => Extension::new(self.action.clone()),
        };
        let call = self
            .arguments
            .into_iter()
            .fold(call, |call, argument| call.with_child(argument));

        let body = Body::Payload(vec![call]);
        let envelope = if self.header.is_empty() {
            Envelope::new(body)
        } else {
            Envelope::with_header(Header::new(self.header), body)
        };

        Ok(SoapCall {
            action: self.action,
            namespace: self.namespace,
            envelope,
        })
    }
}

/// Réponse décodée.
#[derive(Debug, Clone, PartialEq)]
pub enum SoapResult {
    Payload(Vec<Extension>),
    Fault(Fault),
}

/// Décode l'enveloppe d'une réponse.
///
/// # Errors
///
/// Retourne l'erreur de parsing si le corps n'est pas une enveloppe valide.
pub fn parse_reply(body: &[u8]) -> Result<SoapResult, EnvelopeError> {
    let envelope = Envelope::unmarshal(body)?;
    Ok(match envelope.body {
        Body::Payload(payload) => SoapResult::Payload(payload),
        Body::Fault(fault) => SoapResult::Fault(fault),
    })
}
