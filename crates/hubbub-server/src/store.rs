//! Durable JSON-file store for credentials and the chat transcript.
//!
//! Layout on disk, under the configured data directory:
//! - `users.json`: JSON object, username → password hash
//! - `messages.json`: JSON array of wire messages, in arrival order
//!
//! Both files are loaded once at startup and rewritten in full on every
//! mutation. A missing file loads as empty; any other I/O or parse failure
//! is an error the caller must handle.

use hubbub_core::{ChatMessage, RelayError, RelayResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// File-backed credential map and transcript.
pub struct JsonStore {
    users_path: PathBuf,
    messages_path: PathBuf,
    users: HashMap<String, String>,
    messages: Vec<ChatMessage>,
}

impl JsonStore {
    /// Open the store rooted at `data_dir`, creating the directory if needed
    /// and loading both files.
    pub fn open(data_dir: &Path) -> RelayResult<Self> {
        std::fs::create_dir_all(data_dir)?;

        let users_path = data_dir.join("users.json");
        let messages_path = data_dir.join("messages.json");

        let users = load_json(&users_path, HashMap::new)?;
        let messages = load_json(&messages_path, Vec::new)?;

        info!(
            path = %data_dir.display(),
            users = users.len(),
            messages = messages.len(),
            "store loaded"
        );

        Ok(Self {
            users_path,
            messages_path,
            users,
            messages,
        })
    }

    /// Stored password hash for `username`, if registered.
    pub fn user_hash(&self, username: &str) -> Option<&str> {
        self.users.get(username).map(String::as_str)
    }

    /// Whether `username` is already registered.
    pub fn has_user(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    /// Insert a credential and flush the credential map to disk.
    pub fn insert_user(&mut self, username: String, hash: String) -> RelayResult<()> {
        self.users.insert(username, hash);
        write_json(&self.users_path, &self.users)
    }

    /// Append one message to the transcript and flush it to disk.
    ///
    /// The whole array is rewritten on each append; transcript order is
    /// insertion order and is never touched afterwards.
    pub fn append(&mut self, msg: ChatMessage) -> RelayResult<()> {
        self.messages.push(msg);
        if let Err(e) = write_json(&self.messages_path, &self.messages) {
            // Keep the in-memory transcript consistent with disk.
            self.messages.pop();
            return Err(e);
        }
        Ok(())
    }

    /// The transcript, in arrival order.
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.messages
    }
}

fn load_json<T: serde::de::DeserializeOwned>(
    path: &Path,
    empty: impl FnOnce() -> T,
) -> RelayResult<T> {
    match std::fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data).map_err(|e| {
            RelayError::Persistence(format!("parse {}: {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(empty()),
        Err(e) => Err(RelayError::Persistence(format!(
            "read {}: {e}",
            path.display()
        ))),
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> RelayResult<()> {
    let data = serde_json::to_string_pretty(value)
        .map_err(|e| RelayError::Persistence(format!("encode {}: {e}", path.display())))?;
    std::fs::write(path, data)
        .map_err(|e| RelayError::Persistence(format!("write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubbub_core::MessageKind;

    #[test]
    fn missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        assert!(!store.has_user("alice"));
        assert!(store.transcript().is_empty());
    }

    #[test]
    fn users_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = JsonStore::open(dir.path()).unwrap();
            store
                .insert_user("alice".into(), "somehash".into())
                .unwrap();
        }
        let store = JsonStore::open(dir.path()).unwrap();
        assert_eq!(store.user_hash("alice"), Some("somehash"));
    }

    #[test]
    fn transcript_keeps_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(dir.path()).unwrap();
        store.append(ChatMessage::room_chat("alice", "first")).unwrap();
        store.append(ChatMessage::room_chat("bob", "second")).unwrap();

        let reopened = JsonStore::open(dir.path()).unwrap();
        let texts: Vec<&str> = reopened
            .transcript()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(reopened
            .transcript()
            .iter()
            .all(|m| m.kind == MessageKind::RoomChat));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("users.json"), "{oops").unwrap();
        assert!(JsonStore::open(dir.path()).is_err());
    }
}
