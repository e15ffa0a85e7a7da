use std::fs;
use std::path::{Path, PathBuf};

use image::Luma;
use qrcode::QrCode;
use tracing::{debug, info};

use crate::error::QrError;

/// Pixels per QR module.
pub const QR_MODULE_SCALE: u32 = 8;

/// The address a ticket's QR code points at.
pub fn ticket_url(base_url: &str, token: &str) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}token={token}")
}

/// Writes `qr_{token}.png` into `out_dir` for every token, creating the
/// directory first. Stops at the first failure.
pub fn emit_qr_codes(
    base_url: &str,
    tokens: &[String],
    out_dir: &Path,
) -> Result<Vec<PathBuf>, QrError> {
    fs::create_dir_all(out_dir).map_err(|source| QrError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(tokens.len());
    for token in tokens {
        let url = ticket_url(base_url, token);
        debug!("Encoding {url}");

        let code = QrCode::new(url.as_bytes()).map_err(|source| QrError::Encode {
            url: url.clone(),
            source,
        })?;
        let image = code
            .render::<Luma<u8>>()
            .module_dimensions(QR_MODULE_SCALE, QR_MODULE_SCALE)
            .build();

        let path = out_dir.join(format!("qr_{token}.png"));
        image.save(&path).map_err(|source| QrError::Write {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }

    info!("Wrote {} QR codes to {}", written.len(), out_dir.display());
    Ok(written)
}
