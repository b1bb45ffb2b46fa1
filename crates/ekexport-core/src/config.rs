//! Export configuration, passed explicitly into the orchestrator.
//!
//! No process-wide state: every invocation receives its own config value,
//! so nothing persists across runs.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};
use crate::model::SignatureInfo;

/// Region policy and signature descriptor for one deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Region that natively served keys collapse into.
    pub default_region: String,
    /// Region codes the operator serves directly; may contain `*` meaning
    /// "serve all natively".
    #[serde(default)]
    pub native_regions: Vec<String>,
    /// Embedded unchanged into every bundle.
    pub signature_info: SignatureInfo,
}

impl ExportConfig {
    /// Reject configs the orchestrator cannot run with.
    pub fn validate(&self) -> ExportResult<()> {
        if self.default_region.trim().is_empty() {
            return Err(ExportError::InvalidConfig {
                reason: "default_region must not be empty".to_string(),
            });
        }
        if self.signature_info.verification_key_id.trim().is_empty() {
            return Err(ExportError::InvalidConfig {
                reason: "signature_info.verification_key_id must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
