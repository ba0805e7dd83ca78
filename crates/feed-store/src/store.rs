use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use feed_storage::{ContentMutation, ContentStorage, JournalMutation, JournalStorage, MainThreadRunner};
use feed_types::{
    decode_record, encode_record, live_content_ids, ActionType, ContentKey, PayloadWithId,
    SemanticProperties, Session, StreamAction, StreamPayload, StreamSharedState, StreamStructure,
    SHARED_STATE_PREFIX,
};
use tracing::{debug, info, warn};

use crate::bridge::StorageBridge;
use crate::clock::{Clock, SystemClock};
use crate::config::FeedStoreConfig;
use crate::error::{FeedStoreError, FeedStoreResult};
use crate::gc::ContentGc;
use crate::mutation::{
    ActionMutationBuilder, ContentMutationBuilder, MutationBuilder, PendingAction,
    SemanticPropertiesMutationBuilder, SessionMutationBuilder,
};

/// The persistent content and session store.
///
/// Reads decode records into domain types and skip the ones that fail to
/// decode. Writes go through [`MutationBuilder`]s that commit one batch
/// each. Every method that touches storage blocks the calling thread until
/// the backend answers, so none of them may run on the main thread.
///
/// Cloning is cheap: clones share the same storages.
#[derive(Clone)]
pub struct FeedStore {
    bridge: StorageBridge,
    clock: Arc<dyn Clock>,
    config: FeedStoreConfig,
}

impl FeedStore {
    pub fn new(
        content: Arc<dyn ContentStorage>,
        journal: Arc<dyn JournalStorage>,
        main_thread: Arc<dyn MainThreadRunner>,
        config: FeedStoreConfig,
    ) -> Self {
        let bridge = StorageBridge::new(
            content,
            journal,
            main_thread,
            config.wait_timeout(),
            config.enforce_off_main_thread,
        );
        Self {
            bridge,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the clock used to timestamp actions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &FeedStoreConfig {
        &self.config
    }

    // ---- Reads ----

    /// Fetch and decode the payloads stored under `content_ids`.
    ///
    /// Missing ids are absent from the result and undecodable payloads are
    /// skipped. Results follow request order.
    pub fn get_payloads<S: AsRef<str>>(&self, content_ids: &[S]) -> FeedStoreResult<Vec<PayloadWithId>> {
        let requested = dedup(content_ids);
        let mut entries = self
            .bridge
            .get_content("get_payloads", requested.iter().map(|id| id.to_string()).collect())?;

        let mut payloads = Vec::with_capacity(entries.len());
        for id in requested {
            let Some(bytes) = entries.remove(id) else {
                continue;
            };
            match decode_record::<StreamPayload>(&bytes) {
                Ok(payload) => payloads.push(PayloadWithId::new(id, payload)),
                Err(e) => warn!(content_id = %id, error = %e, "skipping undecodable payload"),
            }
        }
        debug!(requested = content_ids.len(), found = payloads.len(), "payloads read");
        Ok(payloads)
    }

    /// Every shared state in content storage, sorted by content id.
    pub fn get_shared_states(&self) -> FeedStoreResult<Vec<StreamSharedState>> {
        let entries = self
            .bridge
            .get_all_content("get_shared_states", SHARED_STATE_PREFIX)?;
        let entries: BTreeMap<String, Vec<u8>> = entries.into_iter().collect();

        let mut states = Vec::with_capacity(entries.len());
        for (key, bytes) in entries {
            let ContentKey::SharedState(content_id) = ContentKey::parse(&key) else {
                continue;
            };
            match decode_record::<StreamPayload>(&bytes) {
                Ok(StreamPayload::SharedState(data)) => {
                    states.push(StreamSharedState { content_id, data });
                }
                Ok(StreamPayload::Content(_)) => {
                    warn!(key = %key, "skipping content payload stored as shared state");
                }
                Err(e) => warn!(key = %key, error = %e, "skipping undecodable shared state"),
            }
        }
        Ok(states)
    }

    /// The structure records of `session`, in append order.
    ///
    /// Zero-length records (the empty-journal sentinel) and undecodable
    /// records are skipped.
    pub fn get_stream_structures(&self, session: &Session) -> FeedStoreResult<Vec<StreamStructure>> {
        let records = self
            .bridge
            .read_journal("get_stream_structures", session.stream_token())?;

        let mut structures = Vec::with_capacity(records.len());
        for (index, bytes) in records.iter().enumerate() {
            if bytes.is_empty() {
                continue;
            }
            match decode_record::<StreamStructure>(bytes) {
                Ok(structure) => structures.push(structure),
                Err(e) => warn!(
                    session = %session,
                    index,
                    error = %e,
                    "skipping undecodable structure record"
                ),
            }
        }
        Ok(structures)
    }

    /// Every session except HEAD.
    pub fn get_all_sessions(&self) -> FeedStoreResult<Vec<Session>> {
        let names = self.bridge.list_journals("get_all_sessions")?;
        let exclude_actions = self.config.exclude_action_journals_from_sessions;
        Ok(names
            .into_iter()
            .map(Session::from_token)
            .filter(|session| !session.is_head())
            .filter(|session| {
                !(exclude_actions && ActionType::is_action_journal(session.stream_token()))
            })
            .collect())
    }

    /// Semantic properties for whichever of `content_ids` have any.
    ///
    /// Ids without properties are absent from the result. Results follow
    /// request order.
    pub fn get_semantic_properties<S: AsRef<str>>(
        &self,
        content_ids: &[S],
    ) -> FeedStoreResult<Vec<SemanticProperties>> {
        let requested = dedup(content_ids);
        let keys = requested
            .iter()
            .map(|id| ContentKey::SemanticProperties(id.to_string()).storage_key())
            .collect();
        let entries = self.bridge.get_content("get_semantic_properties", keys)?;

        let position: HashMap<&str, usize> = requested
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect();
        let mut found: Vec<(usize, SemanticProperties)> = entries
            .into_iter()
            .filter_map(|(key, data)| match ContentKey::parse(&key) {
                ContentKey::SemanticProperties(id) => {
                    let index = *position.get(id.as_str())?;
                    Some((index, SemanticProperties::new(id, data)))
                }
                _ => None,
            })
            .collect();
        found.sort_by_key(|(index, _)| *index);
        Ok(found.into_iter().map(|(_, properties)| properties).collect())
    }

    /// Every recorded dismissal, in append order.
    pub fn get_all_dismiss_actions(&self) -> FeedStoreResult<Vec<StreamAction>> {
        self.read_actions("get_all_dismiss_actions", ActionType::Dismiss)
    }

    fn read_actions(
        &self,
        operation: &'static str,
        action_type: ActionType,
    ) -> FeedStoreResult<Vec<StreamAction>> {
        let Some(journal_name) = action_type.journal_name() else {
            return Ok(Vec::new());
        };
        let records = self.bridge.read_journal(operation, journal_name)?;

        let mut actions = Vec::with_capacity(records.len());
        for (index, bytes) in records.iter().enumerate() {
            if bytes.is_empty() {
                continue;
            }
            match decode_record::<StreamAction>(bytes) {
                Ok(action) => actions.push(action),
                Err(e) => warn!(
                    journal = journal_name,
                    index,
                    error = %e,
                    "skipping undecodable action record"
                ),
            }
        }
        Ok(actions)
    }

    // ---- Session lifecycle ----

    /// Fork a new session from HEAD.
    ///
    /// Fails if HEAD cannot be read or the journal copy is not committed.
    /// The new session sees HEAD as it was at the moment of the copy.
    pub fn create_new_session(&self) -> FeedStoreResult<Session> {
        let head = Session::head();
        let head_structures = self.get_stream_structures(&head)?;

        let session = Session::random();
        self.bridge.commit_journal(
            "create_new_session",
            JournalMutation::new(head.stream_token()).copy_to(session.stream_token()),
        )?;
        info!(
            session = %session,
            structures = head_structures.len(),
            "session forked from HEAD"
        );
        Ok(session)
    }

    /// The HEAD session handle.
    pub fn get_head_session(&self) -> Session {
        Session::head()
    }

    /// Delete a session's journal. HEAD cannot be removed.
    pub fn remove_session(&self, session: &Session) -> FeedStoreResult<()> {
        if session.is_head() {
            warn!("refusing to remove the HEAD session");
            return Err(FeedStoreError::HeadRemoval);
        }
        self.bridge.commit_journal(
            "remove_session",
            JournalMutation::new(session.stream_token()).delete(),
        )?;
        info!(session = %session, "session removed");
        Ok(())
    }

    /// Reset HEAD to an existing but empty journal.
    pub fn clear_head(&self) -> FeedStoreResult<()> {
        self.bridge.commit_journal(
            "clear_head",
            JournalMutation::new(Session::head().stream_token())
                .delete()
                .append(Vec::new()),
        )?;
        info!("HEAD cleared");
        Ok(())
    }

    // ---- Mutations ----

    /// Start a batch of payload upserts.
    ///
    /// Shared-state payloads are stored under the shared-state namespace;
    /// everything else under the bare content id.
    pub fn edit_content(&self) -> ContentMutationBuilder<'_> {
        MutationBuilder::new(move |changes| self.commit_content(changes))
    }

    /// Start a batch of structure records for `session`.
    ///
    /// Committing an empty batch appends the zero-length sentinel so the
    /// journal exists.
    pub fn edit_session(&self, session: &Session) -> SessionMutationBuilder<'_> {
        let session = session.clone();
        MutationBuilder::new(move |changes| self.commit_session(&session, changes))
    }

    /// Start a batch of semantic property upserts.
    pub fn edit_semantic_properties(&self) -> SemanticPropertiesMutationBuilder<'_> {
        MutationBuilder::new(move |changes| self.commit_semantic_properties(changes))
    }

    /// Start a batch of user actions.
    ///
    /// Each action type is committed to its own journal, one commit per
    /// type in type order. Commits stop at the first failure, so journals
    /// committed before it keep their records even though the call
    /// returns `Err`.
    pub fn edit_actions(&self) -> ActionMutationBuilder<'_> {
        MutationBuilder::new(move |changes| self.commit_actions(changes))
    }

    fn commit_content(&self, changes: Vec<PayloadWithId>) -> FeedStoreResult<()> {
        if changes.is_empty() {
            debug!("empty content batch; nothing to commit");
            return Ok(());
        }
        let count = changes.len();
        let mut mutation = ContentMutation::new();
        for PayloadWithId { content_id, payload } in changes {
            let key = match &payload {
                StreamPayload::Content(_) => ContentKey::content(content_id.as_str()).map_err(|e| {
                    FeedStoreError::InvalidContentId {
                        content_id: content_id.clone(),
                        reason: e.to_string(),
                    }
                })?,
                StreamPayload::SharedState(_) => payload.key_for(&content_id),
            };
            mutation = mutation.upsert(key.storage_key(), encode_record(&payload)?);
        }
        self.bridge.commit_content("edit_content", mutation)?;
        debug!(count, "content committed");
        Ok(())
    }

    fn commit_session(&self, session: &Session, changes: Vec<StreamStructure>) -> FeedStoreResult<()> {
        let count = changes.len();
        let mut mutation = JournalMutation::new(session.stream_token());
        if changes.is_empty() {
            mutation = mutation.append(Vec::new());
        }
        for structure in &changes {
            mutation = mutation.append(encode_record(structure)?);
        }
        self.bridge.commit_journal("edit_session", mutation)?;
        debug!(session = %session, count, "structures committed");
        Ok(())
    }

    fn commit_semantic_properties(&self, changes: Vec<SemanticProperties>) -> FeedStoreResult<()> {
        if changes.is_empty() {
            debug!("empty semantic properties batch; nothing to commit");
            return Ok(());
        }
        let count = changes.len();
        let mutation = changes
            .into_iter()
            .fold(ContentMutation::new(), |mutation, properties| {
                mutation.upsert(
                    ContentKey::SemanticProperties(properties.content_id).storage_key(),
                    properties.data,
                )
            });
        self.bridge
            .commit_content("edit_semantic_properties", mutation)?;
        debug!(count, "semantic properties committed");
        Ok(())
    }

    fn commit_actions(&self, changes: Vec<PendingAction>) -> FeedStoreResult<()> {
        let timestamp_seconds = self.clock.now_seconds();
        let mut by_journal: BTreeMap<&'static str, Vec<Vec<u8>>> = BTreeMap::new();
        for PendingAction {
            action_type,
            content_id,
        } in changes
        {
            let Some(journal_name) = action_type.journal_name() else {
                warn!(
                    action_type = %action_type,
                    content_id = %content_id,
                    "skipping action of unrecognized type"
                );
                continue;
            };
            let record = StreamAction {
                action_type,
                content_id,
                timestamp_seconds,
            };
            by_journal
                .entry(journal_name)
                .or_default()
                .push(encode_record(&record)?);
        }

        for (journal_name, records) in by_journal {
            let count = records.len();
            let mutation = records
                .into_iter()
                .fold(JournalMutation::new(journal_name), JournalMutation::append);
            self.bridge.commit_journal("edit_actions", mutation)?;
            debug!(journal = journal_name, count, "actions committed");
        }
        Ok(())
    }

    // ---- Garbage collection ----

    /// Build a deferred sweep of unreferenced content.
    ///
    /// Nothing happens until [`ContentGc::run`]. `accessible` is only
    /// evaluated during the run.
    pub fn trigger_content_gc<F>(&self, reserved: HashSet<String>, accessible: F) -> ContentGc
    where
        F: FnOnce() -> HashSet<String> + Send + 'static,
    {
        ContentGc::new(
            self.bridge.clone(),
            reserved,
            Box::new(move || Ok(accessible())),
        )
    }

    /// Build a deferred sweep whose accessible set is whatever HEAD and the
    /// live sessions reference when the sweep runs.
    pub fn trigger_session_aware_gc(&self, reserved: HashSet<String>) -> ContentGc {
        let store = self.clone();
        ContentGc::new(
            self.bridge.clone(),
            reserved,
            Box::new(move || store.collect_accessible_content_ids()),
        )
    }

    /// Content ids still referenced by HEAD or any session.
    pub fn collect_accessible_content_ids(&self) -> FeedStoreResult<HashSet<String>> {
        let mut sessions = self.get_all_sessions()?;
        sessions.push(Session::head());

        let mut accessible = HashSet::new();
        for session in &sessions {
            let structures = self.get_stream_structures(session)?;
            accessible.extend(live_content_ids(&structures));
        }
        debug!(
            sessions = sessions.len(),
            accessible = accessible.len(),
            "accessible content computed"
        );
        Ok(accessible)
    }
}

impl std::fmt::Debug for FeedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedStore")
            .field("config", &self.config)
            .finish()
    }
}

/// Request ids with duplicates removed, first occurrence wins.
fn dedup<S: AsRef<str>>(ids: &[S]) -> Vec<&str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(AsRef::as_ref)
        .filter(|id| seen.insert(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gc::GcOutcome;
    use feed_storage::{
        Callback, CommitResult, DedicatedMainThread, InMemoryContentStorage,
        InMemoryJournalStorage, InlineMainThread, StorageResult,
    };
    use feed_types::HEAD_TOKEN;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Harness {
        store: FeedStore,
        content: Arc<InMemoryContentStorage>,
        journal: Arc<InMemoryJournalStorage>,
    }

    fn harness() -> Harness {
        harness_with(FeedStoreConfig::default())
    }

    fn harness_with(config: FeedStoreConfig) -> Harness {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let content = Arc::new(InMemoryContentStorage::new());
        let journal = Arc::new(InMemoryJournalStorage::new());
        let store = FeedStore::new(
            content.clone(),
            journal.clone(),
            Arc::new(InlineMainThread),
            config,
        );
        Harness {
            store,
            content,
            journal,
        }
    }

    fn content(bytes: &[u8]) -> StreamPayload {
        StreamPayload::Content(bytes.to_vec())
    }

    fn ids(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // Payloads
    // -----------------------------------------------------------------------

    #[test]
    fn payloads_round_trip_in_request_order() {
        let h = harness();
        h.store
            .edit_content()
            .add_payload("a", content(b"A"))
            .add_payload("b", content(b"B"))
            .commit()
            .unwrap();

        let payloads = h.store.get_payloads(&["b", "missing", "a", "b"]).unwrap();
        assert_eq!(
            payloads,
            vec![
                PayloadWithId::new("b", content(b"B")),
                PayloadWithId::new("a", content(b"A")),
            ]
        );
    }

    #[test]
    fn corrupt_payload_is_skipped_not_fatal() {
        let h = harness();
        h.store
            .edit_content()
            .add_payload("one", content(b"1"))
            .add_payload("two", content(b"2"))
            .add_payload("three", content(b"3"))
            .commit()
            .unwrap();
        h.content.insert_raw("bad", vec![0xff, 0xff, 0xff, 0xff]);

        let payloads = h
            .store
            .get_payloads(&["one", "bad", "two", "three"])
            .unwrap();
        let found: Vec<&str> = payloads.iter().map(|p| p.content_id.as_str()).collect();
        assert_eq!(found, vec!["one", "two", "three"]);
    }

    #[test]
    fn storage_failure_fails_the_read() {
        let h = harness();
        h.content.set_fail_reads(true);
        let err = h.store.get_payloads(&["a"]).unwrap_err();
        assert!(matches!(err, FeedStoreError::Storage(_)));
    }

    #[test]
    fn shared_state_lands_under_its_namespace() {
        let h = harness();
        h.store
            .edit_content()
            .add_payload("s1", StreamPayload::SharedState(b"state".to_vec()))
            .add_payload("c1", content(b"card"))
            .commit()
            .unwrap();

        assert!(h.content.get_raw("shared-state:s1").is_some());
        assert!(h.content.get_raw("s1").is_none());
        assert!(h.content.get_raw("c1").is_some());

        let states = h.store.get_shared_states().unwrap();
        assert_eq!(
            states,
            vec![StreamSharedState {
                content_id: "s1".into(),
                data: b"state".to_vec(),
            }]
        );
    }

    #[test]
    fn corrupt_shared_state_is_skipped() {
        let h = harness();
        h.store
            .edit_content()
            .add_payload("good", StreamPayload::SharedState(b"ok".to_vec()))
            .commit()
            .unwrap();
        h.content.insert_raw("shared-state:bad", vec![0xff; 4]);
        h.content
            .insert_raw("shared-state:wrong-kind", encode_record(&content(b"x")).unwrap());

        let states = h.store.get_shared_states().unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].content_id, "good");
    }

    #[test]
    fn content_with_reserved_prefix_is_rejected() {
        let h = harness();
        let err = h
            .store
            .edit_content()
            .add_payload("fine", content(b"1"))
            .add_payload("shared-state:sneaky", content(b"2"))
            .commit()
            .unwrap_err();
        assert!(matches!(err, FeedStoreError::InvalidContentId { .. }));
        assert!(h.content.is_empty());
    }

    #[test]
    fn failed_content_commit_is_reported() {
        let h = harness();
        h.content.set_fail_commits(true);
        let err = h
            .store
            .edit_content()
            .add_payload("a", content(b"1"))
            .commit()
            .unwrap_err();
        assert!(matches!(
            err,
            FeedStoreError::CommitFailed {
                operation: "edit_content"
            }
        ));
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    #[test]
    fn empty_session_edit_appends_one_sentinel() {
        let h = harness();
        let session = Session::from_token("s");
        h.store.edit_session(&session).commit().unwrap();

        assert_eq!(h.journal.entries("s"), Some(vec![Vec::new()]));
        assert!(h.store.get_stream_structures(&session).unwrap().is_empty());
    }

    #[test]
    fn session_edits_append_in_order() {
        let h = harness();
        let head = h.store.get_head_session();
        h.store
            .edit_session(&head)
            .add_structure(StreamStructure::update_or_append("root", None))
            .commit()
            .unwrap();
        h.store
            .edit_session(&head)
            .add_structure(StreamStructure::update_or_append("a", Some("root")))
            .add_structure(StreamStructure::remove("a"))
            .commit()
            .unwrap();

        let structures = h.store.get_stream_structures(&head).unwrap();
        assert_eq!(structures.len(), 3);
        assert_eq!(structures[0].content_id, "root");
        assert_eq!(structures[2], StreamStructure::remove("a"));
    }

    #[test]
    fn corrupt_structure_is_skipped() {
        let h = harness();
        let session = Session::from_token("s");
        h.store
            .edit_session(&session)
            .add_structure(StreamStructure::update_or_append("a", None))
            .commit()
            .unwrap();
        h.journal.append_raw("s", vec![0xff; 3]);
        h.store
            .edit_session(&session)
            .add_structure(StreamStructure::update_or_append("b", None))
            .commit()
            .unwrap();

        let structures = h.store.get_stream_structures(&session).unwrap();
        let found: Vec<&str> = structures.iter().map(|s| s.content_id.as_str()).collect();
        assert_eq!(found, vec!["a", "b"]);
    }

    #[test]
    fn journal_read_failure_is_fatal() {
        let h = harness();
        h.journal.set_fail_reads(true);
        let err = h.store.get_stream_structures(&Session::head()).unwrap_err();
        assert!(matches!(err, FeedStoreError::Storage(_)));
    }

    #[test]
    fn new_session_is_a_snapshot_of_head() {
        let h = harness();
        let head = Session::head();
        h.store
            .edit_session(&head)
            .add_structure(StreamStructure::update_or_append("root", None))
            .add_structure(StreamStructure::update_or_append("a", Some("root")))
            .commit()
            .unwrap();

        let session = h.store.create_new_session().unwrap();
        assert_ne!(session, head);
        assert_eq!(
            h.store.get_stream_structures(&session).unwrap(),
            h.store.get_stream_structures(&head).unwrap()
        );

        h.store
            .edit_session(&head)
            .add_structure(StreamStructure::update_or_append("late", Some("root")))
            .commit()
            .unwrap();
        assert_eq!(h.store.get_stream_structures(&session).unwrap().len(), 2);
        assert_eq!(h.store.get_stream_structures(&head).unwrap().len(), 3);
    }

    #[test]
    fn create_session_fails_when_head_is_unreadable() {
        let h = harness();
        h.journal.set_fail_reads(true);
        assert!(h.store.create_new_session().is_err());
        h.journal.set_fail_reads(false);
        assert!(h.store.get_all_sessions().unwrap().is_empty());
    }

    #[test]
    fn create_session_fails_when_copy_fails() {
        let h = harness();
        h.journal.set_fail_commits(true);
        let err = h.store.create_new_session().unwrap_err();
        assert!(matches!(
            err,
            FeedStoreError::CommitFailed {
                operation: "create_new_session"
            }
        ));
    }

    #[test]
    fn all_sessions_exclude_head_and_action_journals() {
        let h = harness();
        h.store.clear_head().unwrap();
        let first = h.store.create_new_session().unwrap();
        let second = h.store.create_new_session().unwrap();
        h.store.edit_actions().dismiss("x").commit().unwrap();

        let mut sessions = h.store.get_all_sessions().unwrap();
        sessions.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(sessions, expected);
    }

    #[test]
    fn action_journals_listed_when_not_excluded() {
        let h = harness_with(FeedStoreConfig {
            exclude_action_journals_from_sessions: false,
            ..FeedStoreConfig::default()
        });
        h.store.edit_actions().dismiss("x").commit().unwrap();
        let sessions = h.store.get_all_sessions().unwrap();
        assert_eq!(sessions, vec![Session::from_token("action:dismiss")]);
    }

    #[test]
    fn head_cannot_be_removed() {
        let h = harness();
        h.store
            .edit_session(&Session::head())
            .add_structure(StreamStructure::update_or_append("root", None))
            .commit()
            .unwrap();

        let err = h.store.remove_session(&Session::head()).unwrap_err();
        assert!(matches!(err, FeedStoreError::HeadRemoval));
        assert!(h.journal.contains(HEAD_TOKEN));
        assert_eq!(h.store.get_stream_structures(&Session::head()).unwrap().len(), 1);
    }

    #[test]
    fn remove_session_deletes_its_journal() {
        let h = harness();
        let session = h.store.create_new_session().unwrap();
        h.store.remove_session(&session).unwrap();
        assert!(!h.journal.contains(session.stream_token()));
        assert!(h.store.get_all_sessions().unwrap().is_empty());
    }

    #[test]
    fn clear_head_leaves_an_empty_journal() {
        let h = harness();
        h.store
            .edit_session(&Session::head())
            .add_structure(StreamStructure::update_or_append("root", None))
            .commit()
            .unwrap();

        h.store.clear_head().unwrap();
        assert_eq!(h.journal.entries(HEAD_TOKEN), Some(vec![Vec::new()]));
        assert!(h.store.get_stream_structures(&Session::head()).unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Semantic properties
    // -----------------------------------------------------------------------

    #[test]
    fn semantic_properties_round_trip() {
        let h = harness();
        h.store
            .edit_semantic_properties()
            .add("A", b"bytes1".to_vec())
            .add("B", b"bytes2".to_vec())
            .commit()
            .unwrap();

        let found = h.store.get_semantic_properties(&["A", "B", "C"]).unwrap();
        assert_eq!(
            found,
            vec![
                SemanticProperties::new("A", b"bytes1".to_vec()),
                SemanticProperties::new("B", b"bytes2".to_vec()),
            ]
        );
        assert!(h.content.get_raw("semantic-properties:A").is_some());
    }

    #[test]
    fn semantic_properties_follow_request_order() {
        let h = harness();
        h.store
            .edit_semantic_properties()
            .add("A", b"1".to_vec())
            .add("B", b"2".to_vec())
            .commit()
            .unwrap();
        let found = h.store.get_semantic_properties(&["B", "A"]).unwrap();
        let order: Vec<&str> = found.iter().map(|p| p.content_id.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    #[test]
    fn dismissals_accumulate_in_order_with_timestamps() {
        let clock = Arc::new(ManualClock::new(1_000));
        let h = harness();
        let store = h.store.clone().with_clock(clock.clone());

        store.edit_actions().dismiss("X").commit().unwrap();
        clock.advance(30);
        store.edit_actions().dismiss("Y").commit().unwrap();

        let actions = store.get_all_dismiss_actions().unwrap();
        let found: Vec<&str> = actions.iter().map(|a| a.content_id.as_str()).collect();
        assert_eq!(found, vec!["X", "Y"]);
        assert_eq!(actions[0].timestamp_seconds, 1_000);
        assert_eq!(actions[1].timestamp_seconds, 1_030);
        assert!(actions.iter().all(|a| a.action_type == ActionType::Dismiss));
    }

    #[test]
    fn unrecognized_action_type_is_skipped() {
        let h = harness();
        h.store
            .edit_actions()
            .add_action(ActionType::Unspecified, "ignored")
            .dismiss("kept")
            .commit()
            .unwrap();

        let actions = h.store.get_all_dismiss_actions().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].content_id, "kept");
    }

    #[test]
    fn one_commit_per_action_type() {
        let h = harness();
        h.store
            .edit_actions()
            .dismiss("a")
            .dismiss("b")
            .dismiss("c")
            .commit()
            .unwrap();
        assert_eq!(h.journal.commit_count(), 1);
        assert_eq!(h.store.get_all_dismiss_actions().unwrap().len(), 3);
    }

    #[test]
    fn corrupt_action_is_skipped() {
        let h = harness();
        h.store.edit_actions().dismiss("a").commit().unwrap();
        h.journal.append_raw("action:dismiss", vec![0xff, 0xff, 0xff, 0xff, 0xff]);
        h.store.edit_actions().dismiss("b").commit().unwrap();

        let actions = h.store.get_all_dismiss_actions().unwrap();
        assert_eq!(actions.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Garbage collection
    // -----------------------------------------------------------------------

    fn seed_population(h: &Harness) {
        h.store
            .edit_content()
            .add_payload("live", content(b"l"))
            .add_payload("held", content(b"h"))
            .add_payload("dead", content(b"d"))
            .add_payload("orphan-state", StreamPayload::SharedState(b"s".to_vec()))
            .commit()
            .unwrap();
        h.store
            .edit_semantic_properties()
            .add("dead", b"props".to_vec())
            .commit()
            .unwrap();
    }

    #[test]
    fn gc_is_deferred_until_run() {
        let h = harness();
        seed_population(&h);
        let gc = h.store.trigger_content_gc(HashSet::new(), HashSet::new);
        assert_eq!(h.content.len(), 5);

        let report = gc.run();
        assert_eq!(report.outcome, GcOutcome::Completed);
        assert_eq!(report.deleted, 3);
    }

    #[test]
    fn gc_removes_only_unreferenced_plain_content() {
        let h = harness();
        seed_population(&h);

        let report = h
            .store
            .trigger_content_gc(ids(&["held"]), || ids(&["live"]))
            .run();
        assert_eq!(report.population, 5);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.exempt, 2);
        assert_eq!(report.retained, 2);
        assert_eq!(
            h.content.keys(),
            vec![
                "held".to_string(),
                "live".to_string(),
                "semantic-properties:dead".to_string(),
                "shared-state:orphan-state".to_string(),
            ]
        );
    }

    #[test]
    fn gc_with_nothing_collectable_skips_the_commit() {
        let h = harness();
        seed_population(&h);
        let before = h.content.commit_count();
        let report = h
            .store
            .trigger_content_gc(ids(&["held", "dead"]), || ids(&["live"]))
            .run();
        assert_eq!(report.outcome, GcOutcome::NothingToDelete);
        assert_eq!(h.content.commit_count(), before);
    }

    #[test]
    fn gc_delete_failure_is_reported_not_raised() {
        let h = harness();
        seed_population(&h);
        h.content.set_fail_commits(true);
        let report = h.store.trigger_content_gc(HashSet::new(), HashSet::new).run();
        assert_eq!(report.outcome, GcOutcome::DeleteFailed);
        assert_eq!(report.deleted, 0);
        assert_eq!(h.content.len(), 5);
    }

    #[test]
    fn gc_listing_failure_aborts() {
        let h = harness();
        seed_population(&h);
        h.content.set_fail_reads(true);
        let report = h.store.trigger_content_gc(HashSet::new(), HashSet::new).run();
        assert_eq!(report.outcome, GcOutcome::PopulationUnavailable);
        h.content.set_fail_reads(false);
        assert_eq!(h.content.len(), 5);
    }

    #[test]
    fn session_aware_gc_keeps_what_sessions_reference() {
        let h = harness();
        seed_population(&h);
        h.store
            .edit_session(&Session::head())
            .add_structure(StreamStructure::update_or_append("live", None))
            .commit()
            .unwrap();
        let session = h.store.create_new_session().unwrap();
        h.store
            .edit_session(&session)
            .add_structure(StreamStructure::update_or_append("held", Some("live")))
            .commit()
            .unwrap();

        let accessible = h.store.collect_accessible_content_ids().unwrap();
        assert_eq!(accessible, ids(&["live", "held"]));

        let report = h.store.trigger_session_aware_gc(HashSet::new()).run();
        assert_eq!(report.outcome, GcOutcome::Completed);
        assert!(h.content.get_raw("dead").is_none());
        assert!(h.content.get_raw("held").is_some());
        assert!(h.content.get_raw("live").is_some());
    }

    #[test]
    fn session_aware_gc_aborts_when_sessions_are_unreadable() {
        let h = harness();
        seed_population(&h);
        h.journal.set_fail_reads(true);
        let report = h.store.trigger_session_aware_gc(HashSet::new()).run();
        assert_eq!(report.outcome, GcOutcome::AccessibleUnavailable);
        assert_eq!(h.content.len(), 5);
    }

    // -----------------------------------------------------------------------
    // Threading and the async boundary
    // -----------------------------------------------------------------------

    #[test]
    fn works_with_callbacks_from_other_threads() {
        let h = harness();
        h.content.set_threaded_callbacks(true);
        h.journal.set_threaded_callbacks(true);

        h.store
            .edit_content()
            .add_payload("a", content(b"A"))
            .commit()
            .unwrap();
        let session = h.store.create_new_session().unwrap();
        assert_eq!(h.store.get_payloads(&["a"]).unwrap().len(), 1);
        assert!(h.store.get_stream_structures(&session).unwrap().is_empty());
    }

    #[test]
    fn commits_run_on_the_dedicated_main_thread() {
        let content = Arc::new(InMemoryContentStorage::new());
        let journal = Arc::new(InMemoryJournalStorage::new());
        let main = Arc::new(DedicatedMainThread::spawn("feed-main-store").unwrap());
        let store = FeedStore::new(content, journal, main, FeedStoreConfig::default());

        store.clear_head().unwrap();
        let session = store.create_new_session().unwrap();
        store
            .edit_session(&session)
            .add_structure(StreamStructure::update_or_append("a", None))
            .commit()
            .unwrap();
        assert_eq!(store.get_stream_structures(&session).unwrap().len(), 1);
    }

    #[test]
    fn blocking_call_on_main_thread_is_rejected() {
        let content = Arc::new(InMemoryContentStorage::new());
        let journal = Arc::new(InMemoryJournalStorage::new());
        let main = Arc::new(DedicatedMainThread::spawn("feed-main-guard").unwrap());
        let store = FeedStore::new(content, journal, main.clone(), FeedStoreConfig::default());

        let (tx, rx) = crossbeam::channel::bounded(1);
        let on_main = store.clone();
        main.execute(
            "probe",
            Box::new(move || {
                tx.send(on_main.get_all_sessions()).unwrap();
            }),
        );
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            result,
            Err(FeedStoreError::OnMainThread {
                operation: "get_all_sessions"
            })
        ));
        assert!(store.get_all_sessions().is_ok());
    }

    #[test]
    fn dropped_callback_interrupts_the_call() {
        let h = harness();
        h.journal.set_drop_callbacks(true);
        let err = h.store.clear_head().unwrap_err();
        assert!(matches!(
            err,
            FeedStoreError::Interrupted {
                operation: "clear_head"
            }
        ));
    }

    /// Journal storage that accepts requests and never answers them.
    #[derive(Default)]
    struct StalledJournal {
        parked: Mutex<usize>,
    }

    impl JournalStorage for StalledJournal {
        fn read(&self, _name: String, callback: Callback<StorageResult<Vec<Vec<u8>>>>) {
            *self.parked.lock().unwrap() += 1;
            std::mem::forget(callback);
        }

        fn get_all_journals(&self, callback: Callback<StorageResult<Vec<String>>>) {
            *self.parked.lock().unwrap() += 1;
            std::mem::forget(callback);
        }

        fn commit(&self, _mutation: JournalMutation, callback: Callback<CommitResult>) {
            *self.parked.lock().unwrap() += 1;
            std::mem::forget(callback);
        }
    }

    #[test]
    fn configured_timeout_bounds_the_wait() {
        let config = FeedStoreConfig {
            wait_timeout_ms: Some(25),
            ..FeedStoreConfig::default()
        };
        let journal = Arc::new(StalledJournal::default());
        let store = FeedStore::new(
            Arc::new(InMemoryContentStorage::new()),
            journal.clone(),
            Arc::new(InlineMainThread),
            config,
        );

        let err = store.get_stream_structures(&Session::head()).unwrap_err();
        assert!(matches!(
            err,
            FeedStoreError::TimedOut {
                operation: "get_stream_structures",
                ..
            }
        ));
        assert_eq!(*journal.parked.lock().unwrap(), 1);
    }

    #[test]
    fn commit_timed_out_behind_a_busy_main_thread_is_not_applied() {
        let journal = Arc::new(InMemoryJournalStorage::new());
        let main = Arc::new(DedicatedMainThread::spawn("feed-main-busy").unwrap());
        let store = FeedStore::new(
            Arc::new(InMemoryContentStorage::new()),
            journal.clone(),
            main.clone(),
            FeedStoreConfig {
                wait_timeout_ms: Some(20),
                ..FeedStoreConfig::default()
            },
        );
        main.execute(
            "busy",
            Box::new(|| std::thread::sleep(Duration::from_millis(200))),
        );

        let session = Session::from_token("s");
        let err = store
            .edit_session(&session)
            .add_structure(StreamStructure::update_or_append("a", None))
            .commit()
            .unwrap_err();
        assert!(matches!(
            err,
            FeedStoreError::TimedOut {
                operation: "edit_session",
                ..
            }
        ));

        let (tx, rx) = crossbeam::channel::bounded(1);
        main.execute("drain", Box::new(move || tx.send(()).unwrap()));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(!journal.contains("s"));

        // A retry lands exactly once.
        store
            .edit_session(&session)
            .add_structure(StreamStructure::update_or_append("a", None))
            .commit()
            .unwrap();
        assert_eq!(store.get_stream_structures(&session).unwrap().len(), 1);
    }

    #[test]
    fn commit_stalled_inside_storage_has_unknown_outcome() {
        let config = FeedStoreConfig {
            wait_timeout_ms: Some(25),
            ..FeedStoreConfig::default()
        };
        let journal = Arc::new(StalledJournal::default());
        let store = FeedStore::new(
            Arc::new(InMemoryContentStorage::new()),
            journal.clone(),
            Arc::new(InlineMainThread),
            config,
        );

        let err = store.clear_head().unwrap_err();
        assert!(matches!(
            err,
            FeedStoreError::CommitUnresolved {
                operation: "clear_head",
                ..
            }
        ));
        assert_eq!(*journal.parked.lock().unwrap(), 1);
    }

    // -----------------------------------------------------------------------
    // Read failures
    // -----------------------------------------------------------------------

    #[test]
    fn shared_state_listing_failure_fails_the_read() {
        let h = harness();
        h.content.set_fail_reads(true);
        let err = h.store.get_shared_states().unwrap_err();
        assert!(matches!(err, FeedStoreError::Storage(_)));
    }

    #[test]
    fn semantic_properties_fetch_failure_fails_the_read() {
        let h = harness();
        h.store
            .edit_semantic_properties()
            .add("A", b"1".to_vec())
            .commit()
            .unwrap();
        h.content.set_fail_reads(true);
        let err = h.store.get_semantic_properties(&["A"]).unwrap_err();
        assert!(matches!(err, FeedStoreError::Storage(_)));
    }

    #[test]
    fn session_listing_failure_fails_the_read() {
        let h = harness();
        h.store.create_new_session().unwrap();
        h.journal.set_fail_reads(true);
        let err = h.store.get_all_sessions().unwrap_err();
        assert!(matches!(err, FeedStoreError::Storage(_)));
    }

    #[test]
    fn dismiss_journal_failure_fails_the_read() {
        let h = harness();
        h.store.edit_actions().dismiss("x").commit().unwrap();
        h.journal.set_fail_reads(true);
        let err = h.store.get_all_dismiss_actions().unwrap_err();
        assert!(matches!(err, FeedStoreError::Storage(_)));
    }
}
