//! File-backed checkpoint store: one JSON document per conversation

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{sort_summaries, Checkpoint, CheckpointStore, CheckpointSummary};
use crate::error::StoreError;

/// Stores checkpoints as `<dir>/<encoded id>.json`.
///
/// Saves go to a temporary file that is fsynced and renamed over the
/// previous checkpoint, so a crash leaves either the old or the new one.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    base_dir: PathBuf,
}

impl FileCheckpointStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed
    pub async fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| StoreError::io(&base_dir, e))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn checkpoint_path(&self, conversation_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.json", encode_file_stem(conversation_id)))
    }

    async fn read_checkpoint(&self, path: &Path, conversation_id: &str) -> Result<Checkpoint, StoreError> {
        let json = match fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(conversation_id.to_string()))
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let checkpoint: Checkpoint =
            serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
                conversation_id: conversation_id.to_string(),
                reason: format!("unparseable checkpoint: {}", e),
            })?;
        checkpoint.verify(conversation_id)?;
        Ok(checkpoint)
    }

    async fn sync_dir(&self) {
        // Makes the rename itself durable; not supported everywhere
        #[cfg(unix)]
        {
            if let Ok(dir) = fs::File::open(&self.base_dir).await {
                if let Err(e) = dir.sync_all().await {
                    debug!(error = %e, "Directory fsync failed");
                }
            }
        }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let path = self.checkpoint_path(checkpoint.conversation_id());
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(checkpoint)?;

        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        file.write_all(&json)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        self.sync_dir().await;

        debug!(
            conversation_id = %checkpoint.conversation_id(),
            sequence = checkpoint.sequence,
            path = %path.display(),
            "Saved checkpoint"
        );
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> Result<Checkpoint, StoreError> {
        let path = self.checkpoint_path(conversation_id);
        let checkpoint = self.read_checkpoint(&path, conversation_id).await?;
        debug!(
            conversation_id = %conversation_id,
            sequence = checkpoint.sequence,
            messages = checkpoint.state.len(),
            "Loaded checkpoint"
        );
        Ok(checkpoint)
    }

    async fn list(&self) -> Result<Vec<CheckpointSummary>, StoreError> {
        let mut summaries = Vec::new();
        let mut entries = fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| StoreError::io(&self.base_dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.base_dir, e))?
        {
            let path = entry.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_file_stem)
            else {
                continue;
            };
            match self.read_checkpoint(&path, &id).await {
                Ok(checkpoint) => summaries.push(checkpoint.summary()),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable checkpoint"),
            }
        }

        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), StoreError> {
        let path = self.checkpoint_path(conversation_id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(conversation_id = %conversation_id, "Deleted checkpoint");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(conversation_id.to_string()))
            }
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

/// Map a conversation id onto a safe file stem: ASCII alphanumerics, `-`
/// and `_` pass through, every other byte becomes `%XX`.
fn encode_file_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn decode_file_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
