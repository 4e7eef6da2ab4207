//! Ban-list loader
//!
//! Reads every file in the ban-list directory into a fresh snapshot. The
//! load is transactional: if the directory or any file in it cannot be read,
//! the whole load fails and the caller keeps its previous store untouched.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serenity::all::UserId;
use tokio::task::JoinSet;
use tracing::warn;

use crate::error::{WardenError, WardenResult};
use crate::store::{BanListSnapshot, Reason};

/// Load every ban list in `dir` into a fresh snapshot.
///
/// Enumeration is non-recursive; subdirectory entries are skipped. Files are
/// read and parsed concurrently since lists are independent of each other.
/// An empty directory yields an empty snapshot.
///
/// # Errors
/// Returns `ListDir` if the directory cannot be enumerated and `ListRead` if
/// any file in it cannot be read. On error no partial result is produced.
pub async fn load_dir(dir: &Path) -> WardenResult<BanListSnapshot> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|source| {
        WardenError::ListDir {
            path: dir.to_path_buf(),
            source,
        }
    })?;

    let mut tasks: JoinSet<WardenResult<(Reason, HashSet<UserId>)>> = JoinSet::new();
    loop {
        let entry = entries.next_entry().await.map_err(|source| {
            WardenError::ListDir {
                path: dir.to_path_buf(),
                source,
            }
        })?;
        let Some(entry) = entry else { break };

        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|source| {
            WardenError::ListRead {
                path: path.clone(),
                source,
            }
        })?;
        if !file_type.is_file() {
            continue;
        }
        tasks.spawn(load_file(path));
    }

    let mut lists = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (reason, members) = joined??;
        // Stem collisions (spam.txt vs spam.csv) are last-write-wins within
        // this one load.
        lists.insert(reason, members);
    }

    Ok(BanListSnapshot::new(lists))
}

/// Read one list file into its (reason, member set) pair.
async fn load_file(path: PathBuf) -> WardenResult<(Reason, HashSet<UserId>)> {
    let text = tokio::fs::read_to_string(&path).await.map_err(|source| {
        WardenError::ListRead {
            path: path.clone(),
            source,
        }
    })?;

    let mut members = HashSet::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<u64>() {
            Ok(id) if id != 0 => {
                members.insert(UserId::new(id));
            }
            _ => {
                // Not a snowflake, so it cannot name a Discord user.
                warn!(
                    path = %path.display(),
                    line,
                    "Skipping ban-list line that is not a user id"
                );
            }
        }
    }

    Ok((reason_for(&path), members))
}

/// Derive the reason from a list file's base name, extension stripped.
fn reason_for(path: &Path) -> Reason {
    let stem = path.file_stem().map_or_else(
        || path.as_os_str().to_string_lossy(),
        |stem| stem.to_string_lossy(),
    );
    Reason::from(stem.into_owned())
}
