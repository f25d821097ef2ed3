//! Zip packaging for multi-document results

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::FormError;
use crate::output::OutputDocument;

/// Pack `documents` into a deflate zip, one entry per filename.
pub fn build_archive(documents: &[OutputDocument]) -> Result<Vec<u8>, FormError> {
    if documents.is_empty() {
        return Err(FormError::Archive("No documents to archive".into()));
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for document in documents {
        writer.start_file(document.filename.as_str(), options)?;
        writer
            .write_all(&document.bytes)
            .map_err(|e| FormError::Archive(format!("{}: {}", document.filename, e)))?;
    }

    Ok(writer.finish()?.into_inner())
}
