//! Signed-in session: the bearer token and the user it belongs to.

use color_eyre::Result;
use serde::{Deserialize, Serialize};

use crate::db::LocalStore;
use crate::shop::{Role, User};

const SESSION_KEY: &str = "session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
  pub token: String,
  pub user: User,
}

impl Session {
  pub fn is_admin(&self) -> bool {
    self.user.role == Role::Admin
  }
}

/// Session persisted in the local store.
pub struct SessionStore<'a> {
  store: &'a LocalStore,
}

impl<'a> SessionStore<'a> {
  pub fn new(store: &'a LocalStore) -> Self {
    Self { store }
  }

  pub fn current(&self) -> Result<Option<Session>> {
    self.store.get(SESSION_KEY)
  }

  pub fn save(&self, session: &Session) -> Result<()> {
    self.store.set(SESSION_KEY, session)
  }

  pub fn clear(&self) -> Result<()> {
    self.store.remove(SESSION_KEY)
  }

  /// Token to attach to requests. An explicit override wins over the stored
  /// session.
  pub fn token(&self, override_token: Option<String>) -> Result<Option<String>> {
    if override_token.is_some() {
      return Ok(override_token);
    }
    Ok(self.current()?.map(|s| s.token))
  }
}
