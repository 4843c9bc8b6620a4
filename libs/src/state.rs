use chrono::{DateTime, Duration, Utc};

use crate::{
    error::{StoreError, TaskError},
    filter::{filter_view, PriorityFilter},
    record::{TaskFields, TaskPatch, TaskRecord},
    session::{attribution, Session},
    store::TaskStore,
};

/// Client-side mirror of the signed-in user's to-dos.
///
/// Every mutation goes to the store first; local state is only touched once
/// the store call has succeeded, and then by id, so two racing mutations
/// land the same way whichever finishes first. The mirror is never
/// re-fetched after a mutation: call [`TaskList::load`] again (see
/// [`TaskList::is_stale`]) to pick up changes made elsewhere.
pub struct TaskList<S> {
    store: S,
    session: Option<Session>,
    records: Vec<TaskRecord>,
    loaded_at: Option<DateTime<Utc>>,
}

impl<S: TaskStore> TaskList<S> {
    pub fn new(store: S, session: Option<Session>) -> Self {
        TaskList {
            store,
            session,
            records: Vec::new(),
            loaded_at: None,
        }
    }

    /// Email the list is scoped to, or the anonymous sentinel.
    pub fn identity(&self) -> &str {
        attribution(self.session.as_ref())
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&TaskRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn filtered(&self, criterion: PriorityFilter) -> Vec<&TaskRecord> {
        filter_view(&self.records, criterion)
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// True when the list was never loaded or was loaded more than
    /// `max_age` before `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.loaded_at {
            Some(loaded_at) => now - loaded_at > max_age,
            None => true,
        }
    }

    /// Replaces local state with the store's records owned by this session.
    pub async fn load(&mut self) -> Result<&[TaskRecord], TaskError> {
        let all = self.store.list_all().await?;
        let fetched = all.len();
        let identity = self.identity().to_string();
        self.records = all
            .into_iter()
            .filter(|record| record.created_by == identity)
            .collect();
        self.loaded_at = Some(Utc::now());
        tracing::debug!(
            "loaded {} of {} records for {}",
            self.records.len(),
            fetched,
            identity
        );
        Ok(&self.records)
    }

    /// Creates the record remotely, then appends it locally exactly as sent.
    pub async fn add(&mut self, fields: TaskFields) -> Result<&TaskRecord, TaskError> {
        let fields = fields.validated()?;
        let created = self.store.create(&fields).await?;
        tracing::debug!("created record {}", created.id);

        let record = TaskRecord::from_fields(
            created.id,
            fields,
            self.identity().to_string(),
            created.created_at,
        );
        let index = self.records.len();
        self.records.push(record);
        Ok(&self.records[index])
    }

    /// Updates the present fields of `patch` remotely, then merges them over
    /// the local copy. An empty patch never reaches the store.
    pub async fn replace(&mut self, id: &str, patch: TaskPatch) -> Result<(), TaskError> {
        let patch = patch.validated()?;
        if patch.is_empty() {
            return Ok(());
        }
        self.store.update(id, &patch).await?;
        tracing::debug!("updated record {}", id);

        match self.records.iter_mut().find(|record| record.id == id) {
            Some(record) => record.apply(&patch),
            None => tracing::debug!("record {} not held locally", id),
        }
        Ok(())
    }

    /// Deletes remotely, then drops the local entry. A record the store no
    /// longer has counts as deleted.
    pub async fn remove(&mut self, id: &str) -> Result<(), TaskError> {
        match self.store.delete(id).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                tracing::debug!("record {} was already gone", id);
            }
            Err(err) => return Err(err.into()),
        }

        if let Some(index) = self.records.iter().position(|record| record.id == id) {
            self.records.remove(index);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        payload::CreatedTask,
        record::{Priority, UserProfile},
        session::ANONYMOUS,
        ValidationFailure,
    };

    /// In-process stand-in for the remote `todos` collection.
    #[derive(Default)]
    pub(crate) struct FakeStore {
        pub(crate) records: Mutex<Vec<TaskRecord>>,
        pub(crate) offline: AtomicBool,
        pub(crate) calls: AtomicUsize,
        next_id: AtomicUsize,
    }

    impl FakeStore {
        pub(crate) fn with(records: Vec<TaskRecord>) -> Self {
            FakeStore {
                records: Mutex::new(records),
                ..FakeStore::default()
            }
        }

        pub(crate) fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }

        fn reach(&self) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("network down".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TaskStore for FakeStore {
        async fn list_all(&self) -> Result<Vec<TaskRecord>, StoreError> {
            self.reach()?;
            Ok(self.records.lock().unwrap().clone())
        }

        async fn create(&self, fields: &TaskFields) -> Result<CreatedTask, StoreError> {
            self.reach()?;
            let id = format!("x{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            let created_at = Utc::now();
            self.records.lock().unwrap().push(TaskRecord::from_fields(
                id.clone(),
                fields.clone(),
                "stored-by-fake".to_string(),
                created_at,
            ));
            Ok(CreatedTask { id, created_at })
        }

        async fn update(&self, id: &str, patch: &TaskPatch) -> Result<(), StoreError> {
            self.reach()?;
            let mut records = self.records.lock().unwrap();
            match records.iter_mut().find(|r| r.id == id) {
                Some(record) => {
                    record.apply(patch);
                    Ok(())
                }
                None => Err(StoreError::NotFound(id.to_string())),
            }
        }

        async fn delete(&self, id: &str) -> Result<(), StoreError> {
            self.reach()?;
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| r.id != id);
            if records.len() == before {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        }
    }

    pub(crate) fn session(email: &str) -> Session {
        Session {
            user: UserProfile {
                username: "ann".to_string(),
                email: email.to_string(),
            },
            token: "token".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    pub(crate) fn record(id: &str, owner: &str, priority: Priority) -> TaskRecord {
        TaskRecord::from_fields(
            id.to_string(),
            TaskFields::new(format!("task {}", id), "details").with_priority(priority),
            owner.to_string(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn load_keeps_only_own_records() {
        let store = FakeStore::with(vec![
            record("1", "ann@example.com", Priority::Low),
            record("2", "bob@example.com", Priority::High),
            record("3", "ann@example.com", Priority::High),
        ]);
        let mut list = TaskList::new(store, Some(session("ann@example.com")));

        let ids: Vec<String> = list
            .load()
            .await
            .unwrap()
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert!(list.loaded_at().is_some());
    }

    #[tokio::test]
    async fn add_then_remove_scenario() {
        let mut list = TaskList::new(FakeStore::default(), Some(session("ann@example.com")));
        list.load().await.unwrap();
        assert!(list.records().is_empty());

        let added = list
            .add(TaskFields::new("Buy milk", "2%").with_priority(Priority::High))
            .await
            .unwrap()
            .clone();
        assert_eq!(added.task, "Buy milk");
        assert_eq!(added.description, "2%");
        assert_eq!(added.priority, Priority::High);
        assert_eq!(added.created_by, "ann@example.com");
        assert_eq!(list.records(), &[added.clone()]);

        list.remove(&added.id).await.unwrap();
        assert!(list.records().is_empty());
    }

    #[tokio::test]
    async fn add_defaults_priority_and_attributes_anonymous() {
        let mut list = TaskList::new(FakeStore::default(), None);
        let added = list.add(TaskFields::new("Walk", "dog")).await.unwrap();
        assert_eq!(added.priority, Priority::Low);
        assert_eq!(added.created_by, ANONYMOUS);
    }

    #[tokio::test]
    async fn invalid_add_never_reaches_the_store() {
        let mut list = TaskList::new(FakeStore::default(), None);
        let err = list.add(TaskFields::new(" ", "dog")).await.unwrap_err();
        assert_eq!(err, TaskError::Validation(ValidationFailure::EmptyField("task")));
        assert_eq!(list.store().calls.load(Ordering::SeqCst), 0);
        assert!(list.records().is_empty());
    }

    #[tokio::test]
    async fn failed_add_leaves_state_untouched() {
        let owner = "ann@example.com";
        let store = FakeStore::with(vec![record("1", owner, Priority::Low)]);
        let mut list = TaskList::new(store, Some(session(owner)));
        list.load().await.unwrap();
        let before = list.records().to_vec();

        list.store().go_offline();
        let err = list.add(TaskFields::new("Walk", "dog")).await.unwrap_err();

        assert!(matches!(err, TaskError::StoreUnavailable(_)));
        assert_eq!(list.records(), before.as_slice());
    }

    #[tokio::test]
    async fn remove_drops_exactly_one_entry() {
        let owner = "ann@example.com";
        let store = FakeStore::with(vec![
            record("1", owner, Priority::Low),
            record("2", owner, Priority::Low),
            record("3", owner, Priority::Low),
        ]);
        let mut list = TaskList::new(store, Some(session(owner)));
        list.load().await.unwrap();

        list.remove("2").await.unwrap();
        let ids: Vec<&str> = list.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn failed_remove_is_a_local_no_op() {
        let owner = "ann@example.com";
        let store = FakeStore::with(vec![record("1", owner, Priority::Low)]);
        let mut list = TaskList::new(store, Some(session(owner)));
        list.load().await.unwrap();

        list.store().go_offline();
        assert!(list.remove("1").await.is_err());
        assert_eq!(list.records().len(), 1);
    }

    #[tokio::test]
    async fn removing_a_record_already_gone_remotely_succeeds() {
        let owner = "ann@example.com";
        let store = FakeStore::with(vec![record("1", owner, Priority::Low)]);
        let mut list = TaskList::new(store, Some(session(owner)));
        list.load().await.unwrap();
        list.store().records.lock().unwrap().clear();

        list.remove("1").await.unwrap();
        assert!(list.records().is_empty());
    }

    #[tokio::test]
    async fn replace_merges_only_present_fields() {
        let owner = "ann@example.com";
        let store = FakeStore::with(vec![record("1", owner, Priority::Low)]);
        let mut list = TaskList::new(store, Some(session(owner)));
        list.load().await.unwrap();
        let before = list.get("1").unwrap().clone();

        list.replace(
            "1",
            TaskPatch {
                description: Some("  new details ".to_string()),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();

        let after = list.get("1").unwrap();
        assert_eq!(after.description, "new details");
        assert_eq!(after.task, before.task);
        assert_eq!(after.priority, before.priority);
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_by, before.created_by);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn replace_of_missing_record_reports_not_found() {
        let owner = "ann@example.com";
        let store = FakeStore::with(vec![record("1", owner, Priority::Low)]);
        let mut list = TaskList::new(store, Some(session(owner)));
        list.load().await.unwrap();
        list.store().records.lock().unwrap().clear();
        let before = list.records().to_vec();

        let err = list
            .replace(
                "1",
                TaskPatch {
                    priority: Some(Priority::High),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err, TaskError::NotFound("1".to_string()));
        assert_eq!(list.records(), before.as_slice());
    }

    #[tokio::test]
    async fn mutations_of_records_created_elsewhere_leave_the_mirror_alone() {
        let owner = "ann@example.com";
        let store = FakeStore::with(vec![record("1", owner, Priority::Low)]);
        let mut list = TaskList::new(store, Some(session(owner)));
        list.load().await.unwrap();
        list.store()
            .records
            .lock()
            .unwrap()
            .push(record("2", owner, Priority::Low));
        let before = list.records().to_vec();

        list.replace(
            "2",
            TaskPatch {
                priority: Some(Priority::High),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();
        {
            let records = list.store().records.lock().unwrap();
            let remote = records.iter().find(|r| r.id == "2").unwrap();
            assert_eq!(remote.priority, Priority::High);
        }
        assert_eq!(list.records(), before.as_slice());
        assert!(list.get("2").is_none());

        list.remove("2").await.unwrap();
        assert!(list.store().records.lock().unwrap().iter().all(|r| r.id != "2"));
        assert_eq!(list.records(), before.as_slice());
    }

    #[tokio::test]
    async fn empty_patch_skips_the_store() {
        let mut list = TaskList::new(FakeStore::default(), None);
        list.replace("1", TaskPatch::default()).await.unwrap();
        assert_eq!(list.store().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn staleness_follows_load_time() {
        let mut list = TaskList::new(FakeStore::default(), None);
        let now = Utc::now();
        assert!(list.is_stale(now, Duration::minutes(5)));

        list.load().await.unwrap();
        assert!(!list.is_stale(Utc::now(), Duration::minutes(5)));
        assert!(list.is_stale(Utc::now() + Duration::minutes(6), Duration::minutes(5)));
    }
}
