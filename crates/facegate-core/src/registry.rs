//! Static account registry.

use serde::{Deserialize, Serialize};

/// A registered kiosk account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub full_name: String,
    /// Profile photo, relative to the images prefix. A leading `/` is tolerated.
    pub picture: String,
}

impl Account {
    /// Picture path with any leading slash removed.
    pub fn picture_path(&self) -> &str {
        self.picture.strip_prefix('/').unwrap_or(&self.picture)
    }
}

/// Read-only list of accounts, fixed for the lifetime of the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Registry {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    pub fn find(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, account: &Account) -> bool {
        self.find(&account.id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
