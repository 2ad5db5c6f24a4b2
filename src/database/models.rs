use tokio::sync::{Mutex, MutexGuard};

use crate::database::mailbox::Mailbox;
use crate::utils::enums::UserStatus;
use crate::utils::types::ConnId;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Message {
    pub sender: String,
    pub timestamp: String,
    pub body: String,
}

impl Message {
    pub fn new(sender: &str, timestamp: &str, body: &str) -> Self {
        Self {
            sender: sender.to_string(),
            timestamp: timestamp.to_string(),
            body: body.to_string(),
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}, {}", self.sender, self.timestamp, self.body)
    }
}

//Mutable half of a record, only reachable through the record's own lock
#[derive(Debug)]
pub struct RecordState {
    pub active: Option<ConnId>,
    pub mailbox: Mailbox,
}

impl RecordState {
    pub fn status(&self) -> UserStatus {
        match self.active {
            Some(_) => UserStatus::Online,
            None => UserStatus::Offline,
        }
    }

    /// Binds `conn` if nobody holds the record. Returns false and leaves the record alone
    /// otherwise.
    pub fn bind(&mut self, conn: ConnId) -> bool {
        match self.active {
            None => {
                self.active = Some(conn);
                true
            }
            Some(_) => false,
        }
    }

    /// Clears the binding, but only if `conn` is the one holding it.
    pub fn release(&mut self, conn: ConnId) -> bool {
        if self.active == Some(conn) {
            self.active = None;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
pub struct UserRecord {
    name: String,
    state: Mutex<RecordState>,
}

impl UserRecord {
    pub fn new(name: &str, active: Option<ConnId>, mailbox_capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(RecordState {
                active,
                mailbox: Mailbox::new(mailbox_capacity),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn lock(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().await
    }
}
