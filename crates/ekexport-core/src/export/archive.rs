//! Bundle packager: payload + signature list -> zip archive bytes.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ExportError, ExportResult};
use crate::export::{EXPORT_BIN, EXPORT_SIG};

fn archive_err(err: impl std::fmt::Display) -> ExportError {
    ExportError::Archive {
        message: err.to_string(),
    }
}

/// Pack the encoded payload and signature list into a zip archive.
///
/// Exactly two entries, `export.bin` then `export.sig`, accumulated into an
/// owned buffer. Readers only need valid entries by name, so no compression
/// level is part of the contract.
pub fn pack_bundle(export_bin: &[u8], export_sig: &[u8]) -> ExportResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(EXPORT_BIN, options).map_err(archive_err)?;
    writer.write_all(export_bin).map_err(archive_err)?;
    writer.start_file(EXPORT_SIG, options).map_err(archive_err)?;
    writer.write_all(export_sig).map_err(archive_err)?;

    let cursor = writer.finish().map_err(archive_err)?;
    Ok(cursor.into_inner())
}

/// Read `(export.bin, export.sig)` back out of a bundle archive.
///
/// Used by verification tooling and tests; the export path never reads
/// bundles back.
pub fn unpack_bundle(bytes: &[u8]) -> ExportResult<(Vec<u8>, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_err)?;

    let mut export_bin = Vec::new();
    archive
        .by_name(EXPORT_BIN)
        .map_err(archive_err)?
        .read_to_end(&mut export_bin)
        .map_err(archive_err)?;

    let mut export_sig = Vec::new();
    archive
        .by_name(EXPORT_SIG)
        .map_err(archive_err)?
        .read_to_end(&mut export_sig)
        .map_err(archive_err)?;

    Ok((export_bin, export_sig))
}
