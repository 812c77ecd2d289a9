//! Extension pour intégrer la configuration SOAP dans pmoconfig
//!
//! Ce module fournit le trait `SoapConfigExt` qui ajoute à
//! `pmoconfig::Config` les réglages du point d'accès SOAP.

use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::{Number, Value};

/// Chemin par défaut du point d'accès SOAP
pub const DEFAULT_SOAP_ENDPOINT: &str = "/soap";

/// Taille maximale par défaut d'une enveloppe reçue (1 Mio)
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Trait d'extension pour ajouter la configuration SOAP à pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmosoap::SoapConfigExt;
///
/// let config = get_config();
/// let endpoint = config.get_soap_endpoint()?;
/// let limit = config.get_soap_max_body_size()?;
/// ```
pub trait SoapConfigExt {
    /// Chemin HTTP du point d'accès (défaut: "/soap")
    fn get_soap_endpoint(&self) -> Result<String>;

    fn set_soap_endpoint(&self, endpoint: String) -> Result<()>;

    /// Taille maximale en octets d'un corps de requête (défaut: 1 Mio)
    fn get_soap_max_body_size(&self) -> Result<usize>;

    fn set_soap_max_body_size(&self, size: usize) -> Result<()>;
}

impl SoapConfigExt for Config {
    fn get_soap_endpoint(&self) -> Result<String> {
        match self.get_value(&["soap", "endpoint"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => {
                Ok(format!("/{}", s.trim().trim_start_matches('/')))
            }
            _ => Ok(DEFAULT_SOAP_ENDPOINT.to_string()),
        }
    }

    fn set_soap_endpoint(&self, endpoint: String) -> Result<()> {
        self.set_value(&["soap", "endpoint"], Value::String(endpoint))
    }

    fn get_soap_max_body_size(&self) -> Result<usize> {
        match self.get_value(&["soap", "max_body_size"]) {
            Ok(Value::Number(n)) => Ok(n
                .as_u64()
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_MAX_BODY_SIZE)),
            _ => Ok(DEFAULT_MAX_BODY_SIZE),
        }
    }

    fn set_soap_max_body_size(&self, size: usize) -> Result<()> {
        self.set_value(&["soap", "max_body_size"], Value::Number(Number::from(size)))
    }
}
