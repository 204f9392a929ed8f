// File-backed port ledger (single host)
// reason: nix flock for cross-process exclusion around one JSON document
use rand::Rng;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use autocoder_core::domain::LedgerDocument;
use autocoder_core::error::AllocationError;
use autocoder_core::port::{LedgerBackend, LedgerWrite};

/// Default bound on waiting for another process to release the lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);
const LOCK_POLL_JITTER_MS: u64 = 10;

/// JSON ledger guarded by an advisory exclusive lock
///
/// Every transaction opens the file, takes `flock(LOCK_EX | LOCK_NB)` with a
/// bounded retry, reads the whole document, and rewrites it in place when
/// the caller asks to persist. The lock is released when the file closes.
/// Empty or unparseable content is treated as an empty ledger.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
    lock_timeout: Duration,
}

impl FileLedger {
    /// Create a ledger at `path` (created on first use, parents included)
    ///
    /// # Example
    /// ```ignore
    /// let ledger = FileLedger::new("/tmp/autocoder/port_ledger.json")
    ///     .with_lock_timeout(Duration::from_secs(2));
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> AllocationError {
        AllocationError::LedgerUnavailable {
            location: self.location(),
            reason: reason.to_string(),
        }
    }

    fn open(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
    }

    /// Non-blocking exclusive lock, polled with jitter until `lock_timeout`
    #[cfg(unix)]
    fn lock(&self, file: File) -> Result<nix::fcntl::Flock<File>, AllocationError> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};

        let start = Instant::now();
        let mut file = file;
        loop {
            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(guard) => return Ok(guard),
                Err((returned, errno)) if errno == Errno::EWOULDBLOCK || errno == Errno::EINTR => {
                    let elapsed = start.elapsed();
                    if elapsed >= self.lock_timeout {
                        return Err(self.unavailable(format!(
                            "lock held by another process for {}ms",
                            elapsed.as_millis()
                        )));
                    }
                    file = returned;
                    let jitter_ms = rand::thread_rng().gen_range(0..=LOCK_POLL_JITTER_MS);
                    std::thread::sleep(LOCK_POLL_INTERVAL + Duration::from_millis(jitter_ms));
                }
                Err((_, errno)) => return Err(self.unavailable(format!("flock failed: {}", errno))),
            }
        }
    }

    fn read_document(&self, file: &mut File) -> io::Result<LedgerDocument> {
        file.seek(SeekFrom::Start(0))?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(LedgerDocument::new());
        }

        match serde_json::from_slice(&raw) {
            Ok(document) => Ok(document),
            Err(e) => {
                warn!(
                    ledger = %self.path.display(),
                    error = %e,
                    "Corrupt port ledger, reinitializing"
                );
                Ok(LedgerDocument::new())
            }
        }
    }

    fn write_document(&self, file: &mut File, document: &LedgerDocument) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&bytes)?;
        file.sync_all()
    }
}

impl LedgerBackend for FileLedger {
    fn transact(
        &self,
        apply: &mut dyn FnMut(&mut LedgerDocument) -> LedgerWrite,
    ) -> Result<(), AllocationError> {
        let file = self.open().map_err(|e| self.unavailable(e))?;

        #[cfg(unix)]
        let mut file = self.lock(file)?;
        #[cfg(not(unix))]
        let mut file = file;

        let mut document = self
            .read_document(&mut file)
            .map_err(|e| self.unavailable(e))?;

        if apply(&mut document) == LedgerWrite::Persist {
            self.write_document(&mut file, &document)
                .map_err(|e| self.unavailable(e))?;
            debug!(
                ledger = %self.path.display(),
                entries = document.len(),
                "Port ledger written"
            );
        }

        // lock released when `file` drops
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
