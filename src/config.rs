//! Environment configuration.

use thiserror::Error;

use crate::sunat::BETA_URL;

/// A required environment variable is missing.
#[derive(Debug, Error)]
#[error("environment variable {0} is required")]
pub struct MissingVariable(&'static str);

/// Runtime configuration, loaded from the environment (a `.env` file is
/// honored by the binary before this runs).
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the PKCS#12 signing bundle.
    pub cert_path: String,
    /// PKCS#12 passphrase.
    pub cert_pass: String,
    /// Concatenated `{RUC}{SOL-user}`.
    pub sunat_user: String,
    /// SOL password.
    pub sunat_pass: String,
    /// billService URL; defaults to the beta environment.
    pub sunat_url: String,
    /// HTTP bind address; defaults to `0.0.0.0:8080`.
    pub listen_addr: String,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, MissingVariable> {
        Ok(Self {
            cert_path: required("CERT_PATH")?,
            cert_pass: required("CERT_PASS")?,
            sunat_user: required("SUNAT_USER")?,
            sunat_pass: required("SUNAT_PASS")?,
            sunat_url: std::env::var("SUNAT_URL").unwrap_or_else(|_| BETA_URL.to_string()),
            listen_addr: normalize_addr(
                std::env::var("LISTEN_ADDR").unwrap_or_else(|_| ":8080".to_string()),
            ),
        })
    }
}

fn required(name: &'static str) -> Result<String, MissingVariable> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(MissingVariable(name))
}

/// Accept the `:{port}` shorthand for all-interfaces binding.
fn normalize_addr(addr: String) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr
    }
}
