use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::database::models::{Message, UserRecord};
use crate::utils::config::Config;
use crate::utils::enums::UserStatus;
use crate::utils::errors::{RelayError, Result};
use crate::utils::types::ConnId;

#[derive(Debug, Clone)]
pub enum Registration {
    Created(Arc<UserRecord>),
    Existing(Arc<UserRecord>),
}

impl Registration {
    pub fn record(&self) -> &Arc<UserRecord> {
        match self {
            Registration::Created(r) | Registration::Existing(r) => r,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Registration::Created(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Connected,
    Everyone,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

/// Every user the relay has ever seen, in first-seen order.
///
/// Two lock levels: the registry lock covers the record list (lookups, appends, counting), each
/// record's own lock covers its binding and mailbox. Callers take the registry lock, pull out what
/// they need and release it before touching any record.
#[derive(Debug)]
pub struct UserRegistry {
    records: Mutex<Vec<Arc<UserRecord>>>,
    capacity: usize,
    mailbox_capacity: usize,
}

impl UserRegistry {
    pub fn new(capacity: usize, mailbox_capacity: usize) -> Self {
        Self {
            records: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            mailbox_capacity,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_users, config.mailbox_capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn position(records: &[Arc<UserRecord>], name: &str) -> Option<usize> {
        records.iter().position(|r| r.name() == name)
    }

    pub async fn find_by_name(&self, name: &str) -> Option<usize> {
        let records = self.records.lock().await;
        Self::position(&records, name)
    }

    pub async fn get(&self, index: usize) -> Option<Arc<UserRecord>> {
        let records = self.records.lock().await;
        records.get(index).cloned()
    }

    //Lookup and append happen under one hold of the registry lock, so two connections racing on
    //the same new name end up with one record. An existing record is returned untouched: `active`
    //only applies to a record created here.
    pub async fn register_if_absent(
        &self,
        name: &str,
        active: Option<ConnId>,
    ) -> Result<Registration> {
        let mut records = self.records.lock().await;
        if let Some(index) = Self::position(&records, name) {
            return Ok(Registration::Existing(Arc::clone(&records[index])));
        }
        if records.len() >= self.capacity {
            return Err(RelayError::RegistryFull {
                capacity: self.capacity,
            });
        }
        let record = Arc::new(UserRecord::new(name, active, self.mailbox_capacity));
        records.push(Arc::clone(&record));
        info!("Registered user {} at slot {}", name, records.len() - 1);
        Ok(Registration::Created(record))
    }

    pub async fn snapshot_count(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Records registered at the moment of the call. Late joiners are not included.
    pub async fn snapshot_records(&self) -> Vec<Arc<UserRecord>> {
        self.records.lock().await.clone()
    }

    pub async fn snapshot(&self) -> Vec<(String, UserStatus)> {
        let records = self.snapshot_records().await;
        let mut users = Vec::with_capacity(records.len());
        for record in records {
            let status = record.lock().await.status();
            users.push((record.name().to_string(), status));
        }
        users
    }

    pub async fn known_names(&self) -> Vec<String> {
        self.snapshot().await.into_iter().map(|(name, _)| name).collect()
    }

    pub async fn connected_names(&self) -> Vec<String> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|(_, status)| *status == UserStatus::Online)
            .map(|(name, _)| name)
            .collect()
    }

    /// Looks up a recipient, registering it offline if it has never been seen.
    pub async fn resolve_recipient(&self, name: &str) -> Result<Arc<UserRecord>> {
        let registration = self.register_if_absent(name, None).await?;
        Ok(Arc::clone(registration.record()))
    }

    pub async fn deliver(record: &UserRecord, message: Message) -> bool {
        let mut state = record.lock().await;
        let stored = state.mailbox.push(message);
        if !stored {
            debug!("Mailbox of {} is full, message dropped", record.name());
        }
        stored
    }

    //One record lock at a time, concurrent broadcasts may interleave per recipient
    pub async fn broadcast(&self, message: &Message, scope: Scope) -> Delivery {
        let mut delivery = Delivery::default();
        for record in self.snapshot_records().await {
            let mut state = record.lock().await;
            if scope == Scope::Connected && state.active.is_none() {
                continue;
            }
            if state.mailbox.push(message.clone()) {
                delivery.delivered += 1;
            } else {
                debug!("Mailbox of {} is full, message dropped", record.name());
                delivery.dropped += 1;
            }
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registration_is_insertion_ordered() {
        let registry = UserRegistry::new(100, 10);
        for name in ["Alice", "Bob", "Carol"] {
            let reg = registry.register_if_absent(name, None).await.unwrap();
            assert!(reg.is_new());
        }
        assert_eq!(registry.find_by_name("Bob").await, Some(1));
        assert_eq!(registry.find_by_name("Dave").await, None);
        assert_eq!(registry.known_names().await, vec!["Alice", "Bob", "Carol"]);
        assert_eq!(registry.get(2).await.unwrap().name(), "Carol");
    }

    #[tokio::test]
    async fn existing_record_is_not_rebound() {
        let registry = UserRegistry::new(100, 10);
        registry.register_if_absent("Alice", Some(ConnId(1))).await.unwrap();
        let again = registry.register_if_absent("Alice", Some(ConnId(2))).await.unwrap();
        assert!(!again.is_new());
        assert_eq!(again.record().lock().await.active, Some(ConnId(1)));
        assert_eq!(registry.snapshot_count().await, 1);
    }

    #[tokio::test]
    async fn full_registry_rejects_new_names_only() {
        let registry = UserRegistry::new(2, 10);
        registry.register_if_absent("a", None).await.unwrap();
        registry.register_if_absent("b", None).await.unwrap();
        assert!(matches!(
            registry.register_if_absent("c", None).await,
            Err(RelayError::RegistryFull { capacity: 2 })
        ));
        assert!(registry.resolve_recipient("a").await.is_ok());
        assert_eq!(registry.snapshot_count().await, 2);
    }

    #[tokio::test]
    async fn broadcast_scopes() {
        let registry = UserRegistry::new(100, 10);
        registry.register_if_absent("online", Some(ConnId(7))).await.unwrap();
        registry.register_if_absent("offline", None).await.unwrap();
        assert_eq!(registry.connected_names().await, vec!["online"]);

        let message = Message::new("x", "t", "hello");
        let d = registry.broadcast(&message, Scope::Connected).await;
        assert_eq!(d, Delivery { delivered: 1, dropped: 0 });
        let d = registry.broadcast(&message, Scope::Everyone).await;
        assert_eq!(d.delivered, 2);

        let online = registry.get(0).await.unwrap();
        let offline = registry.get(1).await.unwrap();
        assert_eq!(online.lock().await.mailbox.len(), 2);
        assert_eq!(offline.lock().await.mailbox.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_registration_of_one_name() {
        let registry = Arc::new(UserRegistry::new(100, 10));
        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry
                    .register_if_absent("same", Some(ConnId(i)))
                    .await
                    .unwrap()
                    .is_new()
            }));
        }
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(registry.snapshot_count().await, 1);
    }
}
