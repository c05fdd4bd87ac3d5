use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::network::{contains, parse_network};
use crate::types::{ListEntry, ListKind};

/// Persistence of the white and black lists.
#[async_trait]
pub trait ListRepository: Send + Sync {
    /// Adding an entry that is already present is not an error.
    async fn add(&self, kind: ListKind, entry: &ListEntry) -> Result<(), StoreError>;
    /// Deletes every entry with `entry.ip`; `StoreError::NotFound` when none matched.
    async fn delete(&self, kind: ListKind, entry: &ListEntry) -> Result<(), StoreError>;
    async fn exists(&self, kind: ListKind, entry: &ListEntry) -> Result<bool, StoreError>;
    /// Bare addresses of all entries, masks dropped.
    async fn list_all(&self, kind: ListKind) -> Result<Vec<String>, StoreError>;

    async fn add_to_whitelist(&self, entry: &ListEntry) -> Result<(), StoreError> {
        self.add(ListKind::White, entry).await
    }

    async fn add_to_blacklist(&self, entry: &ListEntry) -> Result<(), StoreError> {
        self.add(ListKind::Black, entry).await
    }

    async fn delete_from_whitelist(&self, entry: &ListEntry) -> Result<(), StoreError> {
        self.delete(ListKind::White, entry).await
    }

    async fn delete_from_blacklist(&self, entry: &ListEntry) -> Result<(), StoreError> {
        self.delete(ListKind::Black, entry).await
    }

    async fn exists_in_whitelist(&self, entry: &ListEntry) -> Result<bool, StoreError> {
        self.exists(ListKind::White, entry).await
    }

    async fn exists_in_blacklist(&self, entry: &ListEntry) -> Result<bool, StoreError> {
        self.exists(ListKind::Black, entry).await
    }

    async fn list_all_whitelist(&self) -> Result<Vec<String>, StoreError> {
        self.list_all(ListKind::White).await
    }

    async fn list_all_blacklist(&self) -> Result<Vec<String>, StoreError> {
        self.list_all(ListKind::Black).await
    }
}

/// Source of the attempt limits, keyed `ipAttempts`, `loginAttempts`, `passwordAttempts`.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn get_limits(&self) -> Result<HashMap<String, i64>, StoreError>;
}

#[async_trait]
impl ConfigRepository for HashMap<String, i64> {
    async fn get_limits(&self) -> Result<HashMap<String, i64>, StoreError> {
        Ok(self.clone())
    }
}

/// In-process list storage.
#[derive(Clone, Default)]
pub struct MemoryListRepository {
    entries: Arc<RwLock<HashMap<ListKind, Vec<ListEntry>>>>,
}

impl MemoryListRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListRepository for MemoryListRepository {
    async fn add(&self, kind: ListKind, entry: &ListEntry) -> Result<(), StoreError> {
        let mut map = self.entries.write().await;
        let list = map.entry(kind).or_default();
        if !list.contains(entry) {
            list.push(entry.clone());
        }
        Ok(())
    }

    async fn delete(&self, kind: ListKind, entry: &ListEntry) -> Result<(), StoreError> {
        let mut map = self.entries.write().await;
        let list = map.entry(kind).or_default();
        let before = list.len();
        list.retain(|e| e.ip != entry.ip);
        if list.len() == before {
            return Err(StoreError::NotFound {
                kind,
                entry: entry.to_string(),
            });
        }
        Ok(())
    }

    async fn exists(&self, kind: ListKind, entry: &ListEntry) -> Result<bool, StoreError> {
        let map = self.entries.read().await;
        Ok(map
            .get(&kind)
            .is_some_and(|list| list.iter().any(|e| e.ip == entry.ip)))
    }

    async fn list_all(&self, kind: ListKind) -> Result<Vec<String>, StoreError> {
        let map = self.entries.read().await;
        Ok(map
            .get(&kind)
            .map(|list| list.iter().map(|e| e.ip.clone()).collect())
            .unwrap_or_default())
    }
}

/// Classifies request networks against the white and black lists.
#[derive(Clone)]
pub struct ListMatcher {
    repo: Arc<dyn ListRepository>,
}

impl ListMatcher {
    pub fn new(repo: Arc<dyn ListRepository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<dyn ListRepository> {
        &self.repo
    }

    /// True when the request network `ip` contains any address stored in the list.
    ///
    /// An unparseable request or an unreachable repository counts as no match.
    pub async fn contains(&self, kind: ListKind, ip: &str) -> bool {
        let network = match parse_network(ip) {
            Ok(network) => network,
            Err(e) => {
                warn!(ip = %ip, error = %e, "parse address error");
                return false;
            }
        };

        let list = match self.repo.list_all(kind).await {
            Ok(list) => list,
            Err(e) => {
                error!(list = %kind, error = %e, "get list error");
                return false;
            }
        };

        let found = list
            .iter()
            .filter_map(|stored| stored.parse::<IpAddr>().ok())
            .any(|stored| contains(&network, &stored));
        if found {
            info!(ip = %ip, list = %kind, "network matched list entry");
        }
        found
    }

    pub async fn contains_in_whitelist(&self, ip: &str) -> bool {
        self.contains(ListKind::White, ip).await
    }

    pub async fn contains_in_blacklist(&self, ip: &str) -> bool {
        self.contains(ListKind::Black, ip).await
    }

    pub async fn add(&self, kind: ListKind, entry: &ListEntry) -> Result<(), StoreError> {
        self.repo.add(kind, entry).await?;
        debug!(entry = %entry, list = %kind, "entry added");
        Ok(())
    }

    pub async fn delete(&self, kind: ListKind, entry: &ListEntry) -> Result<(), StoreError> {
        self.repo.delete(kind, entry).await?;
        debug!(entry = %entry, list = %kind, "entry deleted");
        Ok(())
    }

    pub async fn add_to_whitelist(&self, entry: &ListEntry) -> Result<(), StoreError> {
        self.add(ListKind::White, entry).await
    }

    pub async fn add_to_blacklist(&self, entry: &ListEntry) -> Result<(), StoreError> {
        self.add(ListKind::Black, entry).await
    }

    pub async fn delete_from_whitelist(&self, entry: &ListEntry) -> Result<(), StoreError> {
        self.delete(ListKind::White, entry).await
    }

    pub async fn delete_from_blacklist(&self, entry: &ListEntry) -> Result<(), StoreError> {
        self.delete(ListKind::Black, entry).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Repository whose backing database is down.
    pub(crate) struct FailingLists;

    #[async_trait]
    impl ListRepository for FailingLists {
        async fn add(&self, _kind: ListKind, _entry: &ListEntry) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }

        async fn delete(&self, _kind: ListKind, _entry: &ListEntry) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }

        async fn exists(&self, _kind: ListKind, _entry: &ListEntry) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }

        async fn list_all(&self, _kind: ListKind) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }
    }

    async fn matcher(kind: ListKind, ips: &[&str]) -> ListMatcher {
        let repo = MemoryListRepository::new();
        for ip in ips {
            repo.add(kind, &ListEntry::from_network(ip)).await.unwrap();
        }
        ListMatcher::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn wide_request_network_matches_narrower_stored_address() {
        let lists = matcher(ListKind::White, &["192.1.1.0", "255.255.255.128"]).await;
        assert!(lists.contains_in_whitelist("192.1.1.0/25").await);
        assert!(!lists.contains_in_blacklist("192.1.1.0/25").await);
    }

    #[tokio::test]
    async fn unrelated_addresses_do_not_match() {
        let lists = matcher(ListKind::Black, &["1.1.1.0", "2.2.2.2"]).await;
        assert!(!lists.contains_in_blacklist("192.1.1.0/25").await);
    }

    #[tokio::test]
    async fn host_request_matches_only_identical_address() {
        let lists = matcher(ListKind::Black, &["10.0.0.0/8"]).await;
        // stored entry is the bare network address 10.0.0.0
        assert!(lists.contains_in_blacklist("10.0.0.0/32").await);
        assert!(lists.contains_in_blacklist("10.0.0.0").await);
        assert!(!lists.contains_in_blacklist("10.1.2.3/32").await);
    }

    #[tokio::test]
    async fn unparseable_entries_and_requests_never_match() {
        let lists = matcher(ListKind::White, &["0.0.0"]).await;
        assert!(!lists.contains_in_whitelist("0.0.0.0/0").await);
        assert!(!lists.contains_in_whitelist("not-an-ip").await);
    }

    #[tokio::test]
    async fn repository_outage_is_no_match() {
        let lists = ListMatcher::new(Arc::new(FailingLists));
        assert!(!lists.contains_in_whitelist("192.1.1.0/25").await);
        assert!(!lists.contains_in_blacklist("192.1.1.0/25").await);
        assert!(
            lists
                .add_to_blacklist(&ListEntry::from_network("192.1.1.0/25"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn add_is_idempotent_and_delete_reports_missing_entries() {
        let repo = Arc::new(MemoryListRepository::new());
        let lists = ListMatcher::new(repo.clone());
        let entry = ListEntry::from_network("194.4.4.0/25");

        lists.add_to_blacklist(&entry).await.unwrap();
        lists.add_to_blacklist(&entry).await.unwrap();
        assert_eq!(repo.list_all_blacklist().await.unwrap(), vec!["194.4.4.0"]);
        assert!(repo.exists_in_blacklist(&entry).await.unwrap());
        assert!(!repo.exists_in_whitelist(&entry).await.unwrap());

        lists.delete_from_blacklist(&entry).await.unwrap();
        let err = lists.delete_from_blacklist(&entry).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: ListKind::Black, .. }));
        assert!(err.to_string().contains("194.4.4.0/25"));
    }
}
