//! In-memory repositories and unit of work
//!
//! Mirrors the PostgreSQL schema's behaviour: unique email and group name,
//! composite membership key, foreign keys with cascading deletes. Constraint
//! names match the migration so callers can match on them.
//!
//! A unit of work operates on a private copy of the tables and publishes it
//! on commit. Invocations are serialized by a writer lock, which is also
//! taken by autocommit writes, so nesting `execute` or writing through the
//! store's autocommit repositories from inside `work` deadlocks. Autocommit
//! reads only touch the committed tables and never wait on a unit of work.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use roster_common::RepositoryError;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{GroupRepository, RepositoryContext, RepositoryResult, UnitOfWork, UserRepository};
use crate::domain::entities::{Group, Membership, User};

const USER_PKEY: &str = "user_pkey";
const USER_EMAIL_KEY: &str = "user_email_key";
const GROUP_PKEY: &str = "group_pkey";
const GROUP_NAME_KEY: &str = "group_name_key";
const MEMBERSHIP_PKEY: &str = "user_groups_pkey";
const MEMBERSHIP_USER_FKEY: &str = "user_groups_user_id_fkey";
const MEMBERSHIP_GROUP_FKEY: &str = "user_groups_group_id_fkey";

fn unique(constraint: &str) -> RepositoryError {
    RepositoryError::UniqueViolation {
        constraint: Some(constraint.to_string()),
    }
}

fn foreign_key(constraint: &str) -> RepositoryError {
    RepositoryError::ForeignKeyViolation {
        constraint: Some(constraint.to_string()),
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<Uuid, User>,
    groups: BTreeMap<Uuid, Group>,
    memberships: BTreeSet<Membership>,
}

impl Tables {
    fn insert_user(&mut self, user: &User) -> RepositoryResult<()> {
        if self.users.contains_key(&user.id) {
            return Err(unique(USER_PKEY));
        }
        if self.users.values().any(|u| u.email == user.email) {
            return Err(unique(USER_EMAIL_KEY));
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    fn update_user(&mut self, user: &User) -> RepositoryResult<()> {
        if !self.users.contains_key(&user.id) {
            return Ok(());
        }
        if self
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(unique(USER_EMAIL_KEY));
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    fn delete_user(&mut self, id: Uuid) {
        if self.users.remove(&id).is_some() {
            self.memberships.retain(|m| m.user_id != id);
        }
    }

    fn insert_group(&mut self, group: &Group) -> RepositoryResult<()> {
        if self.groups.contains_key(&group.id) {
            return Err(unique(GROUP_PKEY));
        }
        if self.groups.values().any(|g| g.name == group.name) {
            return Err(unique(GROUP_NAME_KEY));
        }
        self.groups.insert(group.id, group.clone());
        Ok(())
    }

    fn update_group(&mut self, group: &Group) -> RepositoryResult<()> {
        if !self.groups.contains_key(&group.id) {
            return Ok(());
        }
        if self
            .groups
            .values()
            .any(|g| g.id != group.id && g.name == group.name)
        {
            return Err(unique(GROUP_NAME_KEY));
        }
        self.groups.insert(group.id, group.clone());
        Ok(())
    }

    fn delete_group(&mut self, id: Uuid) {
        if self.groups.remove(&id).is_some() {
            self.memberships.retain(|m| m.group_id != id);
        }
    }

    fn add_membership(&mut self, user_id: Uuid, group_id: Uuid) -> RepositoryResult<()> {
        if !self.users.contains_key(&user_id) {
            return Err(foreign_key(MEMBERSHIP_USER_FKEY));
        }
        if !self.groups.contains_key(&group_id) {
            return Err(foreign_key(MEMBERSHIP_GROUP_FKEY));
        }
        if !self.memberships.insert(Membership { user_id, group_id }) {
            return Err(unique(MEMBERSHIP_PKEY));
        }
        Ok(())
    }

    fn users_in_group(&self, group_id: Uuid) -> Vec<User> {
        self.memberships
            .iter()
            .filter(|m| m.group_id == group_id)
            .filter_map(|m| self.users.get(&m.user_id).cloned())
            .collect()
    }

    fn group_ids_for_user(&self, user_id: Uuid) -> Vec<Uuid> {
        self.memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.group_id)
            .collect()
    }

    fn groups_for_user(&self, user_id: Uuid) -> Vec<Group> {
        self.group_ids_for_user(user_id)
            .into_iter()
            .filter_map(|id| self.groups.get(&id).cloned())
            .collect()
    }
}

#[derive(Default)]
struct StoreInner {
    committed: Mutex<Tables>,
    writer: Mutex<()>,
    reject_commits: AtomicBool,
}

/// Shared in-memory database
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<StoreInner>,
}

/// Copy of the committed rows, for assertions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub memberships: Vec<Membership>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Autocommit user repository over the committed rows
    pub fn users(&self) -> InMemoryUserRepository {
        InMemoryUserRepository {
            scope: MemoryScope::Committed(self.clone()),
        }
    }

    /// Autocommit group repository over the committed rows
    pub fn groups(&self) -> InMemoryGroupRepository {
        InMemoryGroupRepository {
            scope: MemoryScope::Committed(self.clone()),
        }
    }

    pub fn unit_of_work(&self) -> InMemoryUnitOfWork {
        InMemoryUnitOfWork {
            store: self.clone(),
        }
    }

    /// Make every subsequent commit fail with a transaction error.
    pub fn reject_commits(&self, reject: bool) {
        self.inner.reject_commits.store(reject, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let tables = self.inner.committed.lock().await;
        StoreSnapshot {
            users: tables.users.values().cloned().collect(),
            groups: tables.groups.values().cloned().collect(),
            memberships: tables.memberships.iter().copied().collect(),
        }
    }
}

#[derive(Clone)]
enum MemoryScope {
    Committed(InMemoryStore),
    Working(Arc<Mutex<Option<Tables>>>),
}

impl MemoryScope {
    async fn read_tables<R, F>(&self, f: F) -> RepositoryResult<R>
    where
        F: FnOnce(&Tables) -> R + Send,
        R: Send,
    {
        match self {
            MemoryScope::Committed(store) => Ok(f(&*store.inner.committed.lock().await)),
            MemoryScope::Working(slot) => {
                let guard = slot.lock().await;
                let tables = guard.as_ref().ok_or(RepositoryError::TransactionClosed)?;
                Ok(f(tables))
            }
        }
    }

    async fn with_tables<R, F>(&self, f: F) -> RepositoryResult<R>
    where
        F: FnOnce(&mut Tables) -> RepositoryResult<R> + Send,
        R: Send,
    {
        match self {
            MemoryScope::Committed(store) => {
                let _writer = store.inner.writer.lock().await;
                let mut tables = store.inner.committed.lock().await;
                f(&mut *tables)
            }
            MemoryScope::Working(slot) => {
                let mut guard = slot.lock().await;
                let tables = guard.as_mut().ok_or(RepositoryError::TransactionClosed)?;
                f(tables)
            }
        }
    }
}

#[derive(Clone)]
pub struct InMemoryUserRepository {
    scope: MemoryScope,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> RepositoryResult<()> {
        self.scope.with_tables(|t| t.insert_user(user)).await
    }

    async fn list(&self) -> RepositoryResult<Vec<User>> {
        self.scope
            .read_tables(|t| t.users.values().cloned().collect())
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        self.scope
            .read_tables(|t| t.users.get(&id).cloned())
            .await
    }

    async fn update(&self, user: &User) -> RepositoryResult<()> {
        self.scope.with_tables(|t| t.update_user(user)).await
    }

    async fn delete_by_id(&self, id: Uuid) -> RepositoryResult<()> {
        self.scope
            .with_tables(|t| {
                t.delete_user(id);
                Ok(())
            })
            .await
    }

    async fn add_to_group(&self, user_id: Uuid, group_id: Uuid) -> RepositoryResult<()> {
        self.scope
            .with_tables(|t| t.add_membership(user_id, group_id))
            .await
    }

    async fn remove_from_group(&self, user_id: Uuid, group_id: Uuid) -> RepositoryResult<()> {
        self.scope
            .with_tables(|t| {
                t.memberships.remove(&Membership { user_id, group_id });
                Ok(())
            })
            .await
    }

    async fn users_in_group(&self, group_id: Uuid) -> RepositoryResult<Vec<User>> {
        self.scope
            .read_tables(|t| t.users_in_group(group_id))
            .await
    }

    async fn group_ids_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Uuid>> {
        self.scope
            .read_tables(|t| t.group_ids_for_user(user_id))
            .await
    }
}

#[derive(Clone)]
pub struct InMemoryGroupRepository {
    scope: MemoryScope,
}

#[async_trait]
impl GroupRepository for InMemoryGroupRepository {
    async fn create(&self, group: &Group) -> RepositoryResult<()> {
        self.scope.with_tables(|t| t.insert_group(group)).await
    }

    async fn list(&self) -> RepositoryResult<Vec<Group>> {
        self.scope
            .read_tables(|t| t.groups.values().cloned().collect())
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Group>> {
        self.scope
            .read_tables(|t| t.groups.get(&id).cloned())
            .await
    }

    async fn update(&self, group: &Group) -> RepositoryResult<()> {
        self.scope.with_tables(|t| t.update_group(group)).await
    }

    async fn delete_by_id(&self, id: Uuid) -> RepositoryResult<()> {
        self.scope
            .with_tables(|t| {
                t.delete_group(id);
                Ok(())
            })
            .await
    }

    async fn groups_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Group>> {
        self.scope
            .read_tables(|t| t.groups_for_user(user_id))
            .await
    }
}

/// Unit of work over an [`InMemoryStore`]
#[derive(Clone)]
pub struct InMemoryUnitOfWork {
    store: InMemoryStore,
}

impl InMemoryUnitOfWork {
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn execute<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(RepositoryContext) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<RepositoryError> + Send,
    {
        let inner = &self.store.inner;
        let _writer = inner.writer.lock().await;
        let snapshot = inner.committed.lock().await.clone();
        let working = Arc::new(Mutex::new(Some(snapshot)));

        let ctx = RepositoryContext::new(
            Arc::new(InMemoryUserRepository {
                scope: MemoryScope::Working(working.clone()),
            }),
            Arc::new(InMemoryGroupRepository {
                scope: MemoryScope::Working(working.clone()),
            }),
        );

        let outcome = work(ctx).await;
        // Closing the slot invalidates any context clone the work kept.
        let tables = working.lock().await.take();

        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!("In-memory unit of work rolled back");
                return Err(err);
            }
        };
        let tables = tables.ok_or(RepositoryError::TransactionClosed)?;
        if inner.reject_commits.load(Ordering::SeqCst) {
            return Err(RepositoryError::Transaction(sqlx::Error::Protocol(
                "commit rejected by in-memory store".to_string(),
            ))
            .into());
        }
        *inner.committed.lock().await = tables;
        tracing::debug!("In-memory unit of work committed");
        Ok(value)
    }
}
