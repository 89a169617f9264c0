// AuthStorage / SourceStorage ports (spec §6). Out of scope as domain
// logic (credential/source store internals); narrow contracts only, with
// in-memory mocks so StepManagers that need an `auth_id`/`source_id`
// lookup can be exercised in tests.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait AuthStorage: Send + Sync {
    async fn get_credential(&self, auth_id: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait SourceStorage: Send + Sync {
    async fn get_source(&self, source_id: &str) -> Result<Option<String>>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;

    pub struct InMemoryAuthStorage(pub HashMap<String, String>);

    #[async_trait]
    impl AuthStorage for InMemoryAuthStorage {
        async fn get_credential(&self, auth_id: &str) -> Result<Option<String>> {
            Ok(self.0.get(auth_id).cloned())
        }
    }

    pub struct InMemorySourceStorage(pub HashMap<String, String>);

    #[async_trait]
    impl SourceStorage for InMemorySourceStorage {
        async fn get_source(&self, source_id: &str) -> Result<Option<String>> {
            Ok(self.0.get(source_id).cloned())
        }
    }
}
