//! One HTTP GET attempt, streamed sequentially to a `.part` file.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Error from a single transfer attempt, kept structured so the retry layer
/// can classify it before it is flattened into a job failure reason.
#[derive(Debug)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Local write failed (disk full, permission denied). Not retried.
    Storage(std::io::Error),
    /// The abort token was set mid-stream.
    Aborted,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Curl(e) => write!(f, "{}", e),
            TransferError::Http(code) => write!(f, "HTTP {}", code),
            TransferError::Storage(e) => write!(f, "storage: {}", e),
            TransferError::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Curl(e) => Some(e),
            TransferError::Storage(e) => Some(e),
            TransferError::Http(_) | TransferError::Aborted => None,
        }
    }
}

/// What a successful attempt produced.
#[derive(Debug)]
pub struct TransferOutcome {
    pub bytes_written: u64,
    /// Raw Content-Disposition header value, if the server sent one.
    pub content_disposition: Option<String>,
}

/// Issues one GET for `url`, truncating and writing `part_path` sequentially.
///
/// The abort token is checked in the write callback, so a pause/cancel stops
/// the stream promptly and leaves only the `.part` file behind. Response
/// headers are scanned for Content-Disposition.
pub fn fetch_to_part(
    url: &str,
    part_path: &Path,
    abort: &Arc<AtomicBool>,
) -> Result<TransferOutcome, TransferError> {
    let mut file = File::create(part_path).map_err(TransferError::Storage)?;

    let written = Arc::new(AtomicU64::new(0));
    let disposition: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let storage_err: Arc<Mutex<Option<std::io::Error>>> = Arc::new(Mutex::new(None));

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(TransferError::Curl)?;
    easy.get(true).map_err(TransferError::Curl)?;
    easy.follow_location(true).map_err(TransferError::Curl)?;
    easy.max_redirections(10).map_err(TransferError::Curl)?;
    easy.connect_timeout(Duration::from_secs(30))
        .map_err(TransferError::Curl)?;
    easy.low_speed_limit(1024).map_err(TransferError::Curl)?;
    easy.low_speed_time(Duration::from_secs(60))
        .map_err(TransferError::Curl)?;
    easy.timeout(Duration::from_secs(3600))
        .map_err(TransferError::Curl)?;

    let perform_result = {
        let mut transfer = easy.transfer();
        let disposition_cb = Arc::clone(&disposition);
        transfer
            .header_function(move |data| {
                if let Ok(line) = str::from_utf8(data) {
                    let line = line.trim_end();
                    if let Some((name, value)) = line.split_once(':') {
                        if name.trim().eq_ignore_ascii_case("content-disposition") {
                            *disposition_cb.lock().unwrap() = Some(value.trim().to_string());
                        }
                    }
                }
                true
            })
            .map_err(TransferError::Curl)?;

        let written_cb = Arc::clone(&written);
        let storage_cb = Arc::clone(&storage_err);
        let abort_cb = Arc::clone(abort);
        transfer
            .write_function(move |data| {
                if abort_cb.load(Ordering::Relaxed) {
                    return Ok(0); // abort transfer
                }
                match file.write_all(data) {
                    Ok(()) => {
                        written_cb.fetch_add(data.len() as u64, Ordering::Relaxed);
                        Ok(data.len())
                    }
                    Err(e) => {
                        *storage_cb.lock().unwrap() = Some(e);
                        Ok(0)
                    }
                }
            })
            .map_err(TransferError::Curl)?;

        transfer.perform()
    };

    if let Err(e) = perform_result {
        if abort.load(Ordering::Relaxed) {
            return Err(TransferError::Aborted);
        }
        if let Some(io_err) = storage_err.lock().unwrap().take() {
            return Err(TransferError::Storage(io_err));
        }
        return Err(TransferError::Curl(e));
    }

    let code = easy.response_code().map_err(TransferError::Curl)?;
    if !(200..300).contains(&code) {
        return Err(TransferError::Http(code));
    }

    let content_disposition = disposition.lock().unwrap().take();
    Ok(TransferOutcome {
        bytes_written: written.load(Ordering::Relaxed),
        content_disposition,
    })
}
