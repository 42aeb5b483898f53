//! Per-attempt credential directories.
//!
//! Every pairing attempt owns `{auth_root}/auth_{process_id}`. The linking
//! driver writes its credential material there; the orchestrator reads
//! [`CREDENTIALS_FILE`] on success and removes the directory on every exit.

use std::io;
use std::path::{Path, PathBuf};

use pairlink_protocol::ProcessId;
use tracing::{info, warn};

pub const AUTH_DIR_PREFIX: &str = "auth_";
pub const CREDENTIALS_FILE: &str = "creds.json";

pub fn auth_dir_for(auth_root: &Path, process_id: &ProcessId) -> PathBuf {
	auth_root.join(format!("{AUTH_DIR_PREFIX}{process_id}"))
}

pub async fn create_auth_dir(dir: &Path) -> io::Result<()> {
	tokio::fs::create_dir_all(dir).await
}

/// Removes the directory tree. Returns `false` if it was already gone.
pub async fn remove_auth_dir(dir: &Path) -> io::Result<bool> {
	match tokio::fs::remove_dir_all(dir).await {
		Ok(()) => Ok(true),
		Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
		Err(err) => Err(err),
	}
}

/// Reads the credential file, or `None` if the driver never wrote one.
pub async fn read_credentials(dir: &Path) -> io::Result<Option<Vec<u8>>> {
	match tokio::fs::read(dir.join(CREDENTIALS_FILE)).await {
		Ok(bytes) => Ok(Some(bytes)),
		Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
		Err(err) => Err(err),
	}
}

/// Removes every `auth_*` directory under `auth_root`.
///
/// Must only run while no attempt is registered, i.e. at startup: any such
/// directory then belongs to a previous run of the service.
pub async fn reclaim_orphans(auth_root: &Path) -> io::Result<usize> {
	let mut entries = match tokio::fs::read_dir(auth_root).await {
		Ok(entries) => entries,
		Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
		Err(err) => return Err(err),
	};

	let mut reclaimed = 0;
	while let Some(entry) = entries.next_entry().await? {
		let name = entry.file_name();
		if !name.to_string_lossy().starts_with(AUTH_DIR_PREFIX) || !entry.file_type().await?.is_dir() {
			continue;
		}
		let path = entry.path();
		match remove_auth_dir(&path).await {
			Ok(_) => reclaimed += 1,
			Err(err) => warn!(target = "pairlink.credentials", path = %path.display(), error = %err, "failed to reclaim orphaned auth dir"),
		}
	}

	if reclaimed > 0 {
		info!(target = "pairlink.credentials", root = %auth_root.display(), reclaimed, "reclaimed orphaned auth dirs");
	}
	Ok(reclaimed)
}
