//! File-backed stores under `<data_dir>/db/network/<family>/<store_name>`.

use std::sync::Arc;

use shared_persistence::{FilePersistence, StoreLayout};
use tracing::warn;

use crate::domain::DataFamily;
use crate::ports::{AppendOnlyPersistence, AuthenticatedPersistence, StorePersistenceProvider};

#[derive(Debug, Clone)]
pub struct FileStoreProvider {
    layout: StoreLayout,
}

impl FileStoreProvider {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }
}

impl StorePersistenceProvider for FileStoreProvider {
    fn append_only(&self, store_name: &str) -> AppendOnlyPersistence {
        Arc::new(FilePersistence::new(
            self.layout
                .network_store(DataFamily::AppendOnly.as_str(), store_name),
        ))
    }

    fn authenticated(&self, store_name: &str) -> AuthenticatedPersistence {
        Arc::new(FilePersistence::new(
            self.layout
                .network_store(DataFamily::Authenticated.as_str(), store_name),
        ))
    }

    fn persisted_store_names(&self, family: DataFamily) -> Vec<String> {
        let placeholder = self.layout.network_store(family.as_str(), "_");
        let Some(dir) = placeholder.parent() else {
            return Vec::new();
        };
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot list persisted stores");
                return Vec::new();
            }
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.ends_with(".tmp"))
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AddAppendOnlyDataRequest, DataPayload, DataStore, DistributedDataExt, MetaData};
    use shared_persistence::PersistenceStore;

    #[tokio::test]
    async fn test_lists_persisted_stores() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileStoreProvider::new(StoreLayout::new(dir.path()));
        assert!(provider.persisted_store_names(DataFamily::AppendOnly).is_empty());

        let request = AddAppendOnlyDataRequest::new(DataPayload::new(
            "Witness",
            MetaData::new("Witness", 0),
            vec![1, 2],
        ));
        let store: DataStore<_> = [(request.hash(), request.clone())].into_iter().collect();
        provider.append_only("Witness").store(store).await.unwrap();

        assert_eq!(
            provider.persisted_store_names(DataFamily::AppendOnly),
            vec!["Witness".to_string()]
        );
        let loaded = provider.append_only("Witness").load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.get(&request.hash()).is_some());
        assert!(request.append_only_data.is_structurally_valid());
    }
}
