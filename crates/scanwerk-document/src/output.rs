// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output delivery — move the finished PDF to its destination, falling back to
// a SHA-256-verified copy when a rename is impossible (e.g. across devices).

use std::fs;
use std::io;
use std::path::Path;

use scanwerk_core::error::{Result, ScanwerkError};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

/// How the staged file reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivered {
    Renamed,
    Copied,
}

/// Stream a file through SHA-256.
fn hash_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Rename, or copy + verify + remove the source. Only both failing is fatal.
#[instrument(skip(rename, copy), fields(staged = %staged.display(), destination = %destination.display()))]
pub fn deliver_with<R, C>(staged: &Path, destination: &Path, rename: R, copy: C) -> Result<Delivered>
where
    R: FnOnce(&Path, &Path) -> io::Result<()>,
    C: FnOnce(&Path, &Path) -> io::Result<()>,
{
    let rename_err = match rename(staged, destination) {
        Ok(()) => {
            info!("Moved output into place");
            return Ok(Delivered::Renamed);
        }
        Err(err) => err,
    };
    warn!(err = %rename_err, "Rename failed; copying instead");

    let failed = |detail: String| ScanwerkError::Delivery {
        from: staged.to_path_buf(),
        to: destination.to_path_buf(),
        detail,
    };

    let expected = hash_file(staged).map_err(|err| failed(err.to_string()))?;
    copy(staged, destination).map_err(|err| failed(format!("rename: {rename_err}; copy: {err}")))?;

    let actual = hash_file(destination).map_err(|err| failed(err.to_string()))?;
    if actual != expected {
        if let Err(err) = fs::remove_file(destination) {
            debug!(%err, "Could not remove corrupt copy");
        }
        return Err(failed(
            ScanwerkError::IntegrityMismatch { expected, actual }.to_string(),
        ));
    }

    if let Err(err) = fs::remove_file(staged) {
        warn!(%err, "Copied output but could not remove the staged file");
    }
    info!(sha256 = %expected, "Copied output into place");
    Ok(Delivered::Copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SHA-256 of the empty byte slice (well-known constant).
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn cross_device() -> io::Error {
        io::Error::new(io::ErrorKind::CrossesDevices, "cross-device link")
    }

    fn staged(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("staged.pdf");
        fs::write(&path, b"%PDF-1.7 scanwerk").expect("write staged");
        path
    }

    #[test]
    fn hashes_known_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let empty = dir.path().join("empty");
        let hello = dir.path().join("hello");
        fs::write(&empty, b"").expect("write");
        fs::write(&hello, b"hello").expect("write");
        assert_eq!(hash_file(&empty).expect("hash"), EMPTY_SHA256);
        assert_eq!(
            hash_file(&hello).expect("hash"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn rename_is_preferred() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from = staged(dir.path());
        let to = dir.path().join("out.pdf");
        let result = deliver_with(&from, &to, |a, b| fs::rename(a, b), |_, _| {
            panic!("copy must not run after a successful rename")
        });
        assert_eq!(result.expect("deliver"), Delivered::Renamed);
        assert!(to.exists());
        assert!(!from.exists());
    }

    #[test]
    fn copy_fallback_verifies_and_removes_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from = staged(dir.path());
        let to = dir.path().join("out.pdf");
        let result = deliver_with(&from, &to, |_, _| Err(cross_device()), |a, b| {
            fs::copy(a, b).map(|_| ())
        });
        assert_eq!(result.expect("copy fallback"), Delivered::Copied);
        assert_eq!(fs::read(&to).expect("read"), b"%PDF-1.7 scanwerk");
        assert!(!from.exists());
    }

    #[test]
    fn both_failing_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from = staged(dir.path());
        let to = dir.path().join("out.pdf");
        let result = deliver_with(&from, &to, |_, _| Err(cross_device()), |_, _| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        });
        match result {
            Err(ScanwerkError::Delivery { detail, .. }) => assert!(detail.contains("read-only")),
            other => panic!("expected delivery error, got {other:?}"),
        }
        assert!(from.exists());
    }

    #[test]
    fn corrupt_copy_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from = staged(dir.path());
        let to = dir.path().join("out.pdf");
        let result = deliver_with(&from, &to, |_, _| Err(cross_device()), |_, b| {
            fs::write(b, b"truncated")
        });
        assert!(matches!(result, Err(ScanwerkError::Delivery { .. })));
        assert!(!to.exists());
        assert!(from.exists());
    }
}
