//! Binary export encoder: region batch -> `export.bin` payload bytes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use prost::Message;

use crate::error::{ExportError, ExportResult};
use crate::model::{self, ExportKey, KEY_LENGTH};
use crate::wire::{self, EXPORT_MAGIC};

/// An encoded export payload plus what went into it.
#[derive(Debug, Clone)]
pub struct EncodedExport {
    /// `EXPORT_MAGIC || serialized message` — the exact bytes that get
    /// signed, and the `export.bin` entry of the archive.
    pub bytes: Vec<u8>,
    /// Keys that survived length filtering and made it onto the wire.
    pub key_count: usize,
    /// Window start, floor-to-seconds, over the unfiltered batch.
    pub start_timestamp: i64,
    /// Window end, floor-to-seconds, over the unfiltered batch.
    pub end_timestamp: i64,
}

/// Encode one region batch into the fixed wire format.
///
/// Keys whose base64 decodes to anything other than [`KEY_LENGTH`] bytes are
/// dropped with a warning, never a failure. Window timestamps are computed
/// over the unfiltered batch so they reflect the true export window even
/// when keys are dropped. An empty `records` slice is a caller bug and
/// returns [`ExportError::EmptyBatch`].
pub fn encode_export(
    records: &[ExportKey],
    region: &str,
    info: &model::SignatureInfo,
    batch_num: i32,
    batch_size: i32,
) -> ExportResult<EncodedExport> {
    let start_timestamp = records
        .iter()
        .map(|r| r.created_at.timestamp())
        .min()
        .ok_or(ExportError::EmptyBatch)?;
    let end_timestamp = records
        .iter()
        .map(|r| r.created_at.timestamp())
        .max()
        .ok_or(ExportError::EmptyBatch)?;

    let mut keys = Vec::with_capacity(records.len());
    for record in records {
        match BASE64.decode(&record.key_data) {
            Ok(raw) if raw.len() == KEY_LENGTH => keys.push(wire::TemporaryExposureKey {
                key_data: Some(raw),
                transmission_risk_level: Some(record.transmission_risk_level),
                rolling_start_interval_number: Some(record.rolling_start_interval_number),
                rolling_period: Some(record.rolling_period),
            }),
            Ok(raw) => {
                tracing::warn!(
                    region,
                    decoded_len = raw.len(),
                    "skipping key with invalid decoded length"
                );
            }
            Err(err) => {
                tracing::warn!(region, %err, "skipping key with undecodable key data");
            }
        }
    }
    let key_count = keys.len();

    let export = wire::TemporaryExposureKeyExport {
        start_timestamp: Some(start_timestamp as u64),
        end_timestamp: Some(end_timestamp as u64),
        region: Some(region.to_string()),
        batch_num: Some(batch_num),
        batch_size: Some(batch_size),
        signature_infos: vec![info.into()],
        keys,
    };

    let mut bytes = Vec::with_capacity(EXPORT_MAGIC.len() + export.encoded_len());
    bytes.extend_from_slice(EXPORT_MAGIC);
    export.encode(&mut bytes).map_err(|e| ExportError::Encode {
        message: e.to_string(),
    })?;

    Ok(EncodedExport {
        bytes,
        key_count,
        start_timestamp,
        end_timestamp,
    })
}
