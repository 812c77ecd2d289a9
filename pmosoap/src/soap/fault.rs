//! SOAP 1.2 Faults et constructeur de faults.

use std::fmt;

use super::{Extension, QName, RPC_NS, SOAP_ENV_NS};

/// Namespace des sous-codes propres à pmosoap.
pub const PMO_FAULT_NS: &str = "urn:pmosoap:faults";

/// Vocabulaire fixe des codes de fault SOAP 1.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    VersionMismatch,
    MustUnderstand,
    DataEncodingUnknown,
    Sender,
    Receiver,
}

impl FaultCode {
    pub const ALL: [FaultCode; 5] = [
        FaultCode::VersionMismatch,
        FaultCode::MustUnderstand,
        FaultCode::DataEncodingUnknown,
        FaultCode::Sender,
        FaultCode::Receiver,
    ];

    /// Nom local dans le namespace de l'enveloppe.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCode::VersionMismatch => "VersionMismatch",
            FaultCode::MustUnderstand => "MustUnderstand",
            FaultCode::DataEncodingUnknown => "DataEncodingUnknown",
            FaultCode::Sender => "Sender",
            FaultCode::Receiver => "Receiver",
        }
    }

    /// Retrouve un code depuis son nom qualifié (namespace de l'enveloppe).
    pub fn from_qname(qname: &QName) -> Option<Self> {
        if qname.namespace.as_deref() != Some(SOAP_ENV_NS) {
            return None;
        }
        Self::ALL.into_iter().find(|c| c.as_str() == qname.local)
    }

    /// Vrai si la faute est imputable à l'émetteur du message.
    pub fn is_sender(&self) -> bool {
        matches!(self, FaultCode::Sender)
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sous-code : valeur qualifiée et sous-code imbriqué optionnel.
#[derive(Debug, Clone, PartialEq)]
pub struct Subcode {
    pub value: QName,
    pub subcode: Option<Box<Subcode>>,
}

impl Subcode {
    pub fn new(value: QName) -> Self {
        Self {
            value,
            subcode: None,
        }
    }

    /// Construit une chaîne de sous-codes, le premier élément étant le plus
    /// proche du code. Retourne `None` pour une liste vide.
    pub fn chain<I>(values: I) -> Option<Box<Subcode>>
    where
        I: IntoIterator<Item = QName>,
    {
        let values: Vec<QName> = values.into_iter().collect();
        values.into_iter().rev().fold(None, |inner, value| {
            Some(Box::new(Subcode {
                value,
                subcode: inner,
            }))
        })
    }
}

/// Code du fault.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub value: FaultCode,
    pub subcode: Option<Box<Subcode>>,
}

impl Code {
    pub fn new(value: FaultCode) -> Self {
        Self {
            value,
            subcode: None,
        }
    }

    /// Valeurs des sous-codes, du plus proche au plus profond.
    pub fn subcodes(&self) -> Vec<&QName> {
        let mut out = Vec::new();
        let mut current = self.subcode.as_deref();
        while let Some(sc) = current {
            out.push(&sc.value);
            current = sc.subcode.as_deref();
        }
        out
    }
}

/// Texte de `env:Reason`, étiqueté par langue.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasonText {
    pub lang: String,
    pub text: String,
}

/// Contenu applicatif de `env:Detail`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detail {
    pub entries: Vec<Extension>,
}

/// SOAP Fault
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub code: Code,
    /// Omis du message si vide.
    pub reason: Vec<ReasonText>,
    pub node: Option<String>,
    pub role: Option<String>,
    pub detail: Option<Detail>,
}

impl Fault {
    pub fn new(code: Code) -> Self {
        Self {
            code,
            reason: Vec::new(),
            node: None,
            role: None,
            detail: None,
        }
    }

    pub fn kind(&self) -> FaultCode {
        self.code.value
    }

    /// Premier texte de raison, quelle que soit sa langue.
    pub fn message(&self) -> Option<&str> {
        self.reason.first().map(|r| r.text.as_str())
    }

    pub fn with_reason(mut self, lang: impl Into<String>, text: impl Into<String>) -> Self {
        self.reason.push(ReasonText {
            lang: lang.into(),
            text: text.into(),
        });
        self
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_detail(mut self, entry: Extension) -> Self {
        self.detail.get_or_insert_with(Detail::default).entries.push(entry);
        self
    }
}

/// Construit un Fault complet, prêt à être sérialisé.
///
/// # Arguments
///
/// * `kind` - Code du fault
/// * `detail_message` - Texte de `env:Reason` (langue `en`)
/// * `subcodes` - Sous-codes applicatifs, le premier étant le plus proche du code
///
/// # Exemple
///
/// ```rust
/// use pmosoap::soap::{FaultCode, build_fault, subcodes};
///
/// let fault = build_fault(FaultCode::Sender, "Unknown action", [subcodes::procedure_not_present()]);
/// assert_eq!(fault.kind(), FaultCode::Sender);
/// assert_eq!(fault.code.subcodes().len(), 1);
/// ```
pub fn build_fault<I>(kind: FaultCode, detail_message: &str, subcodes: I) -> Fault
where
    I: IntoIterator<Item = QName>,
{
    Fault::new(Code {
        value: kind,
        subcode: Subcode::chain(subcodes),
    })
    .with_reason("en", detail_message)
}

/// Sous-codes connus.
pub mod subcodes {
    use super::{PMO_FAULT_NS, QName, RPC_NS};

    /// Action demandée absente du registre (SOAP RPC).
    pub fn procedure_not_present() -> QName {
        QName::new("rpc", RPC_NS, "ProcedureNotPresent")
    }

    /// Arguments refusés par l'opération (SOAP RPC).
    pub fn bad_arguments() -> QName {
        QName::new("rpc", RPC_NS, "BadArguments")
    }

    /// Enveloppe illisible ou non conforme.
    pub fn malformed_envelope() -> QName {
        QName::new("pmo", PMO_FAULT_NS, "MalformedEnvelope")
    }

    /// Échec interne d'une opération.
    pub fn operation_failed() -> QName {
        QName::new("pmo", PMO_FAULT_NS, "OperationFailed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_fault_without_subcodes() {
        let fault = build_fault(FaultCode::Receiver, "boom", []);
        assert_eq!(fault.kind(), FaultCode::Receiver);
        assert!(fault.code.subcode.is_none());
        assert_eq!(fault.message(), Some("boom"));
        assert_eq!(fault.reason[0].lang, "en");
    }

    #[test]
    fn test_subcode_chain_order() {
        let fault = build_fault(
            FaultCode::Sender,
            "bad",
            [
                QName::new("a", "urn:a", "First"),
                QName::new("a", "urn:a", "Second"),
                QName::new("a", "urn:a", "Third"),
            ],
        );

        let first = fault.code.subcode.as_ref().unwrap();
        assert_eq!(first.value.local, "First");
        let second = first.subcode.as_ref().unwrap();
        assert_eq!(second.value.local, "Second");
        let third = second.subcode.as_ref().unwrap();
        assert_eq!(third.value.local, "Third");
        assert!(third.subcode.is_none());

        let locals: Vec<&str> = fault.code.subcodes().iter().map(|q| q.local.as_str()).collect();
        assert_eq!(locals, ["First", "Second", "Third"]);
    }

    #[test]
    fn test_fault_code_from_qname() {
        let q = QName::new("soap", SOAP_ENV_NS, "MustUnderstand");
        assert_eq!(FaultCode::from_qname(&q), Some(FaultCode::MustUnderstand));
        assert_eq!(FaultCode::from_qname(&QName::local("Sender")), None);
    }
}
