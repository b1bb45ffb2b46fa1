//! Detached signature builder: `export.bin` bytes -> `export.sig` bytes.

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{DerSignature, SigningKey, VerifyingKey};
use p256::pkcs8::DecodePrivateKey;
use prost::Message;

use crate::error::{ExportError, ExportResult};
use crate::model;
use crate::wire;

/// Signs export payloads with the operator's active ECDSA P-256 key.
///
/// The signature covers the entire encoded payload, magic header included,
/// and is DER-encoded as clients expect. A malformed key fails construction
/// — an unsigned bundle is never produced.
#[derive(Debug)]
pub struct BundleSigner {
    key: SigningKey,
}

impl BundleSigner {
    /// Wrap an already-loaded signing key.
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Load the signing key from PKCS#8 PEM.
    pub fn from_pkcs8_pem(pem: &str) -> ExportResult<Self> {
        let key = SigningKey::from_pkcs8_pem(pem).map_err(|e| ExportError::Crypto {
            reason: format!("invalid PKCS#8 signing key: {e}"),
        })?;
        Ok(Self { key })
    }

    /// Public half of the signing key, for verification tooling.
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.key.verifying_key()
    }

    /// Sign an encoded export payload and serialize the one-entry signature
    /// list.
    pub fn sign_export(
        &self,
        payload: &[u8],
        info: &model::SignatureInfo,
        batch_num: i32,
        batch_size: i32,
    ) -> ExportResult<Vec<u8>> {
        let signature: DerSignature =
            self.key.try_sign(payload).map_err(|e| ExportError::Crypto {
                reason: format!("signing failed: {e}"),
            })?;

        let list = wire::TekSignatureList {
            signatures: vec![wire::TekSignature {
                signature_info: Some(info.into()),
                batch_num: Some(batch_num),
                batch_size: Some(batch_size),
                signature: Some(signature.as_bytes().to_vec()),
            }],
        };

        Ok(list.encode_to_vec())
    }
}
