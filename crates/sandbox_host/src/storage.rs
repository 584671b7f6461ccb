//! Durable storage for the two lists a host session keeps across restarts: the conversation
//! transcript and the apps installed in the sandbox.
//!
//! Each list is stored as one JSON array under its configured key.

use std::{cell::RefCell, collections::HashMap, future::Future, pin::Pin, rc::Rc};

use sandbox_contract::AppDefinition;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::conversation::ConversationMessage;

/// Boxed future returned by [`KeyValueStore`] so the trait stays object-safe.
pub type KeyValueFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store backend failed for `{key}`: {message}")]
    Backend { key: String, message: String },
    #[error("stored `{key}` is not valid: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Where session lists live between runs. Writes must survive a restart.
pub trait KeyValueStore {
    /// Raw JSON text under `key`, or `None` when nothing was saved yet.
    fn load_value<'a>(
        &'a self,
        key: &'a str,
    ) -> KeyValueFuture<'a, Result<Option<String>, StorageError>>;

    /// Replaces the raw JSON text under `key`.
    fn save_value<'a>(
        &'a self,
        key: &'a str,
        raw_json: &'a str,
    ) -> KeyValueFuture<'a, Result<(), StorageError>>;
}

/// In-memory store. Clones share one map, so a clone outlives a session and can be reopened
/// as if after a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    inner: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn load_value<'a>(
        &'a self,
        key: &'a str,
    ) -> KeyValueFuture<'a, Result<Option<String>, StorageError>> {
        Box::pin(async move { Ok(self.raw(key)) })
    }

    fn save_value<'a>(
        &'a self,
        key: &'a str,
        raw_json: &'a str,
    ) -> KeyValueFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.inner
                .borrow_mut()
                .insert(key.to_string(), raw_json.to_string());
            Ok(())
        })
    }
}

/// Reads the persisted transcript. A key that was never written yields an empty transcript.
///
/// # Errors
///
/// Returns [`StorageError`] when the store fails or the stored text is not a transcript.
pub async fn load_transcript<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Vec<ConversationMessage>, StorageError> {
    load_list(store, key).await
}

/// # Errors
///
/// Returns [`StorageError`] when encoding or the store write fails.
pub async fn save_transcript<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
    transcript: &[ConversationMessage],
) -> Result<(), StorageError> {
    save_list(store, key, transcript).await
}

/// Reads the installed app definitions, in install order.
///
/// # Errors
///
/// Returns [`StorageError`] when the store fails or the stored text is not a list of apps.
pub async fn load_installed_apps<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Vec<AppDefinition>, StorageError> {
    load_list(store, key).await
}

/// # Errors
///
/// Returns [`StorageError`] when encoding or the store write fails.
pub async fn save_installed_apps<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
    apps: &[AppDefinition],
) -> Result<(), StorageError> {
    save_list(store, key, apps).await
}

async fn load_list<S: KeyValueStore + ?Sized, T: DeserializeOwned>(
    store: &S,
    key: &str,
) -> Result<Vec<T>, StorageError> {
    let Some(raw) = store.load_value(key).await? else {
        return Ok(Vec::new());
    };
    serde_json::from_str(&raw).map_err(|source| StorageError::Decode {
        key: key.to_string(),
        source,
    })
}

async fn save_list<S: KeyValueStore + ?Sized, T: Serialize>(
    store: &S,
    key: &str,
    items: &[T],
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(items).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.save_value(key, &raw).await
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    use super::*;

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn load_value<'a>(
            &'a self,
            key: &'a str,
        ) -> KeyValueFuture<'a, Result<Option<String>, StorageError>> {
            Box::pin(async move {
                Err(StorageError::Backend {
                    key: key.to_string(),
                    message: "disk gone".to_string(),
                })
            })
        }

        fn save_value<'a>(
            &'a self,
            key: &'a str,
            _raw_json: &'a str,
        ) -> KeyValueFuture<'a, Result<(), StorageError>> {
            Box::pin(async move {
                Err(StorageError::Backend {
                    key: key.to_string(),
                    message: "disk gone".to_string(),
                })
            })
        }
    }

    #[test]
    fn lists_survive_a_reopened_store() {
        let store = MemoryKeyValueStore::default();
        let reopened = store.clone();
        let apps = vec![
            AppDefinition::markup("<div id=\"calc\"></div>"),
            AppDefinition::titled("Notes", "<div id=\"notes\"></div>"),
        ];
        let transcript = vec![
            ConversationMessage::user("make a calculator"),
            ConversationMessage::model("Done."),
        ];

        block_on(save_installed_apps(&store, "apps", &apps)).expect("save apps");
        block_on(save_transcript(&store, "chat", &transcript)).expect("save transcript");

        assert_eq!(block_on(load_installed_apps(&reopened, "apps")).expect("apps"), apps);
        assert_eq!(
            block_on(load_transcript(&reopened, "chat")).expect("transcript"),
            transcript
        );
    }

    #[test]
    fn unwritten_key_loads_empty() {
        let store = MemoryKeyValueStore::default();
        assert!(block_on(load_installed_apps(&store, "apps"))
            .expect("load")
            .is_empty());
    }

    #[test]
    fn corrupt_list_names_its_key() {
        let store = MemoryKeyValueStore::default();
        block_on(store.save_value("apps", "{\"not\": \"a list\"}")).expect("save");
        let err = block_on(load_installed_apps(&store, "apps")).expect_err("corrupt");
        assert!(matches!(err, StorageError::Decode { ref key, .. } if key == "apps"));
    }

    #[test]
    fn backend_failures_surface_as_errors() {
        let store: &dyn KeyValueStore = &FailingStore;
        let err = block_on(save_transcript(store, "chat", &[])).expect_err("write fails");
        assert_eq!(err.to_string(), "store backend failed for `chat`: disk gone");
    }
}
