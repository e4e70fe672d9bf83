//! XAdES-BES enveloped signing of UBL documents.
//!
//! The signer loads a PKCS#12 bundle once at startup and is safe for
//! concurrent callers: key and certificate are immutable, and every
//! `sign` call builds its own canonicalizer state.
//!
//! Signature construction follows the profile the tax authority's
//! verifier accepts: one `Reference URI=""` over the document root with
//! the enveloped-signature and exclusive-C14N transforms, SHA-256
//! digests, RSA-SHA256 signature, and the certificate embedded as
//! Base64 DER. The finished `ds:Signature` is spliced into the empty
//! `ext:ExtensionContent` slot created by the UBL builder.

pub mod c14n;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::sign::{Signer as RsaSigner, Verifier};
use openssl::x509::X509;
use thiserror::Error;

use crate::core::FacturaError;
use crate::ubl::{parse_document, serialize_document, Element, EXTENSION_SLOT_PATH};
use c14n::canonicalize;

/// Algorithm identifiers emitted inside `ds:SignedInfo`.
mod alg {
    pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    pub const ENVELOPED: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
}

/// Id attribute of the emitted `ds:Signature`.
pub const SIGNATURE_ID: &str = "SignatureSP";

/// Signer failure modes.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The PKCS#12 bundle could not be loaded or lacks an RSA key pair.
    #[error("key unavailable: {0}")]
    KeyUnavailable(String),

    /// The document could not be parsed or canonicalized.
    #[error("canonicalization failure: {0}")]
    Canonicalization(String),

    /// The RSA signing operation itself failed.
    #[error("signing operation failed: {0}")]
    Signing(String),

    /// The signature element could not be placed into the document.
    #[error("signature attachment failure: {0}")]
    SignatureAttachment(String),

    /// The document already carries a signature in its extension slot.
    #[error("document is already signed")]
    AlreadySigned,

    /// Verification of an existing signature failed.
    #[error("signature verification failed: {0}")]
    Verification(String),
}

impl From<SignerError> for FacturaError {
    fn from(e: SignerError) -> Self {
        match e {
            SignerError::KeyUnavailable(msg) => FacturaError::SignerUnavailable(msg),
            other => FacturaError::Signature(other.to_string()),
        }
    }
}

/// Holds the issuer's RSA key pair for the lifetime of the process.
pub struct XadesSigner {
    key: PKey<Private>,
    certificate_b64: String,
    certificate: X509,
}

impl XadesSigner {
    /// Load and decrypt a PKCS#12 file. Fails when the bundle cannot be
    /// decrypted, has no private key or certificate, or the key is not RSA.
    pub fn from_pkcs12_file(path: &str, passphrase: &str) -> Result<Self, SignerError> {
        let der = std::fs::read(path)
            .map_err(|e| SignerError::KeyUnavailable(format!("cannot read '{path}': {e}")))?;
        Self::from_pkcs12_der(&der, passphrase)
    }

    /// Load a PKCS#12 bundle from memory.
    pub fn from_pkcs12_der(der: &[u8], passphrase: &str) -> Result<Self, SignerError> {
        let pkcs12 = Pkcs12::from_der(der)
            .map_err(|e| SignerError::KeyUnavailable(format!("not a PKCS#12 bundle: {e}")))?;
        let parsed = pkcs12
            .parse2(passphrase)
            .map_err(|e| SignerError::KeyUnavailable(format!("cannot decrypt bundle: {e}")))?;
        let key = parsed
            .pkey
            .ok_or_else(|| SignerError::KeyUnavailable("bundle has no private key".into()))?;
        let certificate = parsed
            .cert
            .ok_or_else(|| SignerError::KeyUnavailable("bundle has no certificate".into()))?;
        if key.rsa().is_err() {
            return Err(SignerError::KeyUnavailable(
                "private key is not RSA".into(),
            ));
        }
        let cert_der = certificate
            .to_der()
            .map_err(|e| SignerError::KeyUnavailable(format!("cannot encode certificate: {e}")))?;
        Ok(Self {
            key,
            certificate_b64: BASE64.encode(cert_der),
            certificate,
        })
    }

    /// The loaded end-entity certificate.
    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// Sign serialized document bytes, returning the re-serialized
    /// document with the `ds:Signature` in its extension slot.
    ///
    /// Signing an already-signed document fails with
    /// [`SignerError::AlreadySigned`].
    pub fn sign(&self, xml: &[u8]) -> Result<Vec<u8>, SignerError> {
        let mut root = parse_document(xml)
            .map_err(|e| SignerError::Canonicalization(e.to_string()))?;

        let slot = root.find_path(EXTENSION_SLOT_PATH).ok_or_else(|| {
            SignerError::SignatureAttachment(
                "document has no ext:UBLExtensions/ext:UBLExtension/ext:ExtensionContent slot"
                    .into(),
            )
        })?;
        if slot.child_elements().next().is_some() {
            return Err(SignerError::AlreadySigned);
        }

        // Reference digest over the enveloped-transformed, exclusively
        // canonicalized root. The slot is empty, so the tree as built is
        // already the transform output.
        let canonical = canonicalize(&root, &[])
            .map_err(|e| SignerError::Canonicalization(e.to_string()))?;
        let digest_b64 = BASE64.encode(sha256(canonical.as_bytes())?);

        let signed_info = build_signed_info(&digest_b64);
        let si_canonical = canonicalize(&signed_info, &[("ds", crate::ubl::ns::DS)])
            .map_err(|e| SignerError::Canonicalization(e.to_string()))?;
        let signature_value = self.rsa_sign(si_canonical.as_bytes())?;

        let signature = Element::new("ds:Signature")
            .attr("xmlns:ds", crate::ubl::ns::DS)
            .attr("Id", SIGNATURE_ID)
            .child(signed_info)
            .child(Element::new("ds:SignatureValue").text(BASE64.encode(signature_value)))
            .child(
                Element::new("ds:KeyInfo").child(
                    Element::new("ds:X509Data").child(
                        Element::new("ds:X509Certificate").text(&self.certificate_b64),
                    ),
                ),
            );

        root.find_path_mut(EXTENSION_SLOT_PATH)
            .ok_or_else(|| {
                SignerError::SignatureAttachment("extension slot vanished during signing".into())
            })?
            .push(signature);

        serialize_document(&root).map_err(|e| SignerError::SignatureAttachment(e.to_string()))
    }

    fn rsa_sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        let mut signer = RsaSigner::new(MessageDigest::sha256(), &self.key)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        signer
            .update(data)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        signer
            .sign_to_vec()
            .map_err(|e| SignerError::Signing(e.to_string()))
    }
}

/// Verify a signed document: recompute the reference digest, canonicalize
/// `SignedInfo`, and check the RSA signature against the embedded
/// certificate's public key. Succeeds only on byte-consistent output of
/// [`XadesSigner::sign`].
pub fn verify_signature(xml: &[u8]) -> Result<(), SignerError> {
    let mut root =
        parse_document(xml).map_err(|e| SignerError::Verification(e.to_string()))?;

    let slot = root
        .find_path_mut(EXTENSION_SLOT_PATH)
        .ok_or_else(|| SignerError::Verification("document has no extension slot".into()))?;
    let signature = slot
        .remove_child("ds:Signature")
        .ok_or_else(|| SignerError::Verification("document is not signed".into()))?;

    // Enveloped-signature transform: the tree with the signature removed.
    let canonical = canonicalize(&root, &[])
        .map_err(|e| SignerError::Verification(e.to_string()))?;
    let digest_b64 = BASE64.encode(sha256(canonical.as_bytes())?);

    let signed_info = signature
        .first("ds:SignedInfo")
        .ok_or_else(|| SignerError::Verification("signature has no SignedInfo".into()))?;
    let stored_digest = signed_info
        .find_path(&["ds:Reference", "ds:DigestValue"])
        .map(|e| e.text_content())
        .ok_or_else(|| SignerError::Verification("signature has no DigestValue".into()))?;
    if stored_digest.trim() != digest_b64 {
        return Err(SignerError::Verification(
            "reference digest does not match document content".into(),
        ));
    }

    // Prefix scope for the standalone SignedInfo: declarations on the
    // document root and on the signature element itself.
    let mut scope: Vec<(String, String)> = Vec::new();
    for source in [&root, &signature] {
        for (name, value) in &source.attributes {
            if name == "xmlns" {
                scope.push((String::new(), value.clone()));
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                scope.push((prefix.to_string(), value.clone()));
            }
        }
    }
    let scope_refs: Vec<(&str, &str)> = scope
        .iter()
        .map(|(p, u)| (p.as_str(), u.as_str()))
        .collect();
    let si_canonical = canonicalize(signed_info, &scope_refs)
        .map_err(|e| SignerError::Verification(e.to_string()))?;

    let signature_value = signature
        .first("ds:SignatureValue")
        .map(|e| e.text_content())
        .ok_or_else(|| SignerError::Verification("signature has no SignatureValue".into()))?;
    let signature_bytes = BASE64
        .decode(signature_value.trim())
        .map_err(|e| SignerError::Verification(format!("bad SignatureValue encoding: {e}")))?;

    let certificate_b64 = signature
        .find_path(&["ds:KeyInfo", "ds:X509Data", "ds:X509Certificate"])
        .map(|e| e.text_content())
        .ok_or_else(|| SignerError::Verification("signature has no X509Certificate".into()))?;
    let certificate_der = BASE64
        .decode(certificate_b64.trim())
        .map_err(|e| SignerError::Verification(format!("bad certificate encoding: {e}")))?;
    let certificate = X509::from_der(&certificate_der)
        .map_err(|e| SignerError::Verification(format!("bad certificate DER: {e}")))?;
    let public_key = certificate
        .public_key()
        .map_err(|e| SignerError::Verification(e.to_string()))?;

    let mut verifier = Verifier::new(MessageDigest::sha256(), &public_key)
        .map_err(|e| SignerError::Verification(e.to_string()))?;
    verifier
        .update(si_canonical.as_bytes())
        .map_err(|e| SignerError::Verification(e.to_string()))?;
    let valid = verifier
        .verify(&signature_bytes)
        .map_err(|e| SignerError::Verification(e.to_string()))?;
    if !valid {
        return Err(SignerError::Verification(
            "RSA signature does not verify against the embedded certificate".into(),
        ));
    }
    Ok(())
}

fn build_signed_info(digest_b64: &str) -> Element {
    Element::new("ds:SignedInfo")
        .child(Element::new("ds:CanonicalizationMethod").attr("Algorithm", alg::EXC_C14N))
        .child(Element::new("ds:SignatureMethod").attr("Algorithm", alg::RSA_SHA256))
        .child(
            Element::new("ds:Reference")
                .attr("URI", "")
                .child(
                    Element::new("ds:Transforms")
                        .child(Element::new("ds:Transform").attr("Algorithm", alg::ENVELOPED))
                        .child(Element::new("ds:Transform").attr("Algorithm", alg::EXC_C14N)),
                )
                .child(Element::new("ds:DigestMethod").attr("Algorithm", alg::SHA256))
                .child(Element::new("ds:DigestValue").text(digest_b64)),
        )
}

fn sha256(data: &[u8]) -> Result<Vec<u8>, SignerError> {
    openssl::hash::hash(MessageDigest::sha256(), data)
        .map(|d| d.to_vec())
        .map_err(|e| SignerError::Signing(e.to_string()))
}
