//! Backend selection

use std::path::Path;

use sheetsync_core::{BackendKind, Error, Result, Source, WorkbookAccess};
use sheetsync_xls::XlsReader;
use sheetsync_xlsx::XlsxReader;

/// Compound file signature of legacy workbooks
const CFB_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];

/// ZIP local file header signature of packaged workbooks
const ZIP_MAGIC: [u8; 2] = [0x50, 0x4B];

/// Pick the backend for a file by its extension
pub fn backend_for_path(path: &Path) -> Result<BackendKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("xls") => Ok(BackendKind::Xls),
        Some("xlsx") | Some("xlsm") => Ok(BackendKind::Xlsx),
        _ => Err(Error::UnsupportedFormat(path.display().to_string())),
    }
}

/// Pick the backend for in-memory contents by their signature
pub fn backend_for_bytes(bytes: &[u8]) -> Result<BackendKind> {
    if bytes.starts_with(&CFB_MAGIC) {
        Ok(BackendKind::Xls)
    } else if bytes.starts_with(&ZIP_MAGIC) {
        Ok(BackendKind::Xlsx)
    } else {
        Err(Error::UnsupportedFormat("<buffer>".into()))
    }
}

/// Open a workbook with the backend its source calls for.
///
/// Read failures come back as [`Error::Backend`] naming the source.
pub fn open_workbook(source: Source) -> Result<Box<dyn WorkbookAccess>> {
    let origin = source.describe();
    let workbook: Box<dyn WorkbookAccess> = match source {
        Source::Buffer(bytes) => match backend_for_bytes(&bytes)? {
            BackendKind::Xls => Box::new(
                XlsReader::read_bytes(&bytes).map_err(|e| e.into_core(&origin))?,
            ),
            BackendKind::Xlsx => Box::new(
                XlsxReader::read_bytes(bytes).map_err(|e| e.into_core(&origin))?,
            ),
        },
        path_like => {
            let path = path_like
                .path()
                .ok_or_else(|| Error::other("source has no path"))?;
            match backend_for_path(&path)? {
                BackendKind::Xls => Box::new(
                    XlsReader::read_file(&path).map_err(|e| e.into_core(&origin))?,
                ),
                BackendKind::Xlsx => Box::new(
                    XlsxReader::read_file(&path).map_err(|e| e.into_core(&origin))?,
                ),
            }
        }
    };

    tracing::debug!(source = %origin, backend = %workbook.kind(), "opened workbook");
    Ok(workbook)
}
