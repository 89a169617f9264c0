// KeyValueStorage port (spec §6) — secret/config resolution for
// `{placeholder}` substitutions in step config.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryKeyValueStorage {
        values: Mutex<HashMap<String, String>>,
    }

    impl InMemoryKeyValueStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(entries: impl IntoIterator<Item = (String, String)>) -> Self {
            Self {
                values: Mutex::new(entries.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl KeyValueStorage for InMemoryKeyValueStorage {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }
}
