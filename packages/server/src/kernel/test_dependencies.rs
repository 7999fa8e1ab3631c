// TestDependencies - in-memory implementations for testing
//
// Provides doubles for every ServerDeps collaborator so the sync pipeline can
// be driven end to end without Postgres or the network.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use slack::Page;
use uuid::Uuid;

use super::jobs::{
    retry_backoff, ClaimedJob, EnqueueResult, ErrorKind, Job, JobQueue, JobSpec, JobStatus,
};
use super::{BaseErrorReporter, BaseSlackApi, MemoryCache, ServerDeps, SyncStore};
use crate::common::MessageTs;
use crate::config::SyncSettings;
use crate::domains::slack_sync::models::{Channel, Message, SlackUser};
use crate::domains::workspace::models::{Authorization, SyncResource, Workspace};

// =============================================================================
// In-memory Store
// =============================================================================

type ChannelKey = (String, String);
type MessageKey = (String, String, MessageTs);

#[derive(Default)]
struct StoreState {
    workspaces: BTreeMap<String, Workspace>,
    authorizations: HashMap<String, Authorization>,
    channels: BTreeMap<ChannelKey, Channel>,
    users: BTreeMap<ChannelKey, SlackUser>,
    messages: BTreeMap<MessageKey, Message>,
    synced: Vec<(String, SyncResource, DateTime<Utc>)>,
}

/// `SyncStore` over plain maps, with write counting and failure injection.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    writes: AtomicUsize,
    authorization_reads: AtomicUsize,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace(self, workspace: Workspace) -> Self {
        self.state
            .lock()
            .unwrap()
            .workspaces
            .insert(workspace.id.clone(), workspace);
        self
    }

    pub fn with_authorization(self, authorization: Authorization) -> Self {
        self.state
            .lock()
            .unwrap()
            .authorizations
            .insert(authorization.workspace_id.clone(), authorization);
        self
    }

    pub fn with_channel(self, channel: Channel) -> Self {
        self.state
            .lock()
            .unwrap()
            .channels
            .insert((channel.workspace_id.clone(), channel.id.clone()), channel);
        self
    }

    /// Make every subsequent write fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn authorization_reads(&self) -> usize {
        self.authorization_reads.load(Ordering::SeqCst)
    }

    pub fn workspace(&self, id: &str) -> Option<Workspace> {
        self.state.lock().unwrap().workspaces.get(id).cloned()
    }

    pub fn authorization(&self, workspace_id: &str) -> Option<Authorization> {
        self.state
            .lock()
            .unwrap()
            .authorizations
            .get(workspace_id)
            .cloned()
    }

    pub fn channel(&self, workspace_id: &str, channel_id: &str) -> Option<Channel> {
        self.state
            .lock()
            .unwrap()
            .channels
            .get(&(workspace_id.to_string(), channel_id.to_string()))
            .cloned()
    }

    pub fn channels(&self, workspace_id: &str) -> Vec<Channel> {
        self.state
            .lock()
            .unwrap()
            .channels
            .values()
            .filter(|c| c.workspace_id == workspace_id)
            .cloned()
            .collect()
    }

    pub fn users(&self, workspace_id: &str) -> Vec<SlackUser> {
        self.state
            .lock()
            .unwrap()
            .users
            .values()
            .filter(|u| u.workspace_id == workspace_id)
            .cloned()
            .collect()
    }

    /// Stored messages of one channel, newest first
    pub fn messages(&self, workspace_id: &str, channel_id: &str) -> Vec<Message> {
        let state = self.state.lock().unwrap();
        let mut messages: Vec<Message> = state
            .messages
            .values()
            .filter(|m| m.workspace_id == workspace_id && m.channel_id == channel_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.ts.cmp(&a.ts));
        messages
    }

    pub fn synced(&self, workspace_id: &str, resource: SyncResource) -> bool {
        self.state
            .lock()
            .unwrap()
            .synced
            .iter()
            .any(|(id, r, _)| id == workspace_id && *r == resource)
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("store read failed"));
        }
        Ok(())
    }

    fn write<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> Result<T> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("store write failed"));
        }
        let out = f(&mut self.state.lock().unwrap());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(out)
    }
}

#[async_trait]
impl SyncStore for InMemoryStore {
    async fn ensure_workspace(&self, workspace: &Workspace) -> Result<()> {
        self.write(|s| {
            s.workspaces
                .entry(workspace.id.clone())
                .or_insert_with(|| workspace.clone());
        })
    }

    async fn find_workspaces_due(&self, now: DateTime<Utc>) -> Result<Vec<Workspace>> {
        self.check_read()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .workspaces
            .values()
            .filter(|w| w.is_due(now))
            .cloned()
            .collect())
    }

    async fn claim_workspace_update(
        &self,
        workspace_id: &str,
        expected: DateTime<Utc>,
        next_update: DateTime<Utc>,
    ) -> Result<bool> {
        self.write(|s| match s.workspaces.get_mut(workspace_id) {
            Some(w) if w.next_update == expected => {
                w.next_update = next_update;
                true
            }
            _ => false,
        })
    }

    async fn mark_workspace_synced(
        &self,
        workspace_id: &str,
        resource: SyncResource,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.write(|s| {
            if let Some(w) = s.workspaces.get_mut(workspace_id) {
                match resource {
                    SyncResource::Users => w.users_synced_at = Some(at),
                    SyncResource::Channels => w.channels_synced_at = Some(at),
                }
            }
            s.synced.push((workspace_id.to_string(), resource, at));
        })
    }

    async fn get_authorization(&self, workspace_id: &str) -> Result<Option<Authorization>> {
        self.check_read()?;
        self.authorization_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.authorization(workspace_id))
    }

    async fn put_authorization(&self, authorization: &Authorization) -> Result<()> {
        self.write(|s| {
            s.authorizations
                .insert(authorization.workspace_id.clone(), authorization.clone());
        })
    }

    async fn upsert_channel(&self, channel: &Channel) -> Result<()> {
        self.write(|s| {
            let key = (channel.workspace_id.clone(), channel.id.clone());
            match s.channels.get_mut(&key) {
                Some(existing) => {
                    existing.name = channel.name.clone();
                    existing.topic = channel.topic.clone();
                    existing.purpose = channel.purpose.clone();
                    existing.is_archived = channel.is_archived;
                    existing.is_private = channel.is_private;
                    existing.updated_at = channel.updated_at;
                }
                None => {
                    s.channels.insert(key, channel.clone());
                }
            }
        })
    }

    async fn get_channel(&self, workspace_id: &str, channel_id: &str) -> Result<Option<Channel>> {
        self.check_read()?;
        Ok(self.channel(workspace_id, channel_id))
    }

    async fn find_channels_due_for_crawl(&self, now: DateTime<Utc>) -> Result<Vec<Channel>> {
        self.check_read()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .channels
            .values()
            .filter(|c| c.is_due_for_crawl(now))
            .cloned()
            .collect())
    }

    async fn claim_channel_crawl(
        &self,
        workspace_id: &str,
        channel_id: &str,
        expected: DateTime<Utc>,
        next_crawl: DateTime<Utc>,
    ) -> Result<bool> {
        let key = (workspace_id.to_string(), channel_id.to_string());
        self.write(|s| match s.channels.get_mut(&key) {
            Some(c) if c.next_crawl == expected => {
                c.next_crawl = next_crawl;
                true
            }
            _ => false,
        })
    }

    async fn mark_channel_crawled(
        &self,
        workspace_id: &str,
        channel_id: &str,
        watermark: MessageTs,
        next_crawl: DateTime<Utc>,
    ) -> Result<()> {
        let key = (workspace_id.to_string(), channel_id.to_string());
        self.write(|s| {
            let channel = s.channels.entry(key).or_insert_with(|| Channel {
                workspace_id: workspace_id.to_string(),
                id: channel_id.to_string(),
                name: String::new(),
                topic: String::new(),
                purpose: String::new(),
                is_archived: false,
                is_private: false,
                latest_crawled: MessageTs::ZERO,
                next_crawl,
                updated_at: Utc::now(),
            });
            channel.latest_crawled = channel.latest_crawled.max(watermark);
            channel.next_crawl = next_crawl;
        })
    }

    async fn upsert_user(&self, user: &SlackUser) -> Result<()> {
        self.write(|s| {
            s.users
                .insert((user.workspace_id.clone(), user.id.clone()), user.clone());
        })
    }

    async fn upsert_message(&self, message: &Message) -> Result<()> {
        self.write(|s| {
            s.messages.insert(
                (
                    message.workspace_id.clone(),
                    message.channel_id.clone(),
                    message.ts,
                ),
                message.clone(),
            );
        })
    }
}

// =============================================================================
// Mock Slack API
// =============================================================================

/// A call made against the mock, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackCall {
    Users { cursor: Option<String> },
    Channels { cursor: Option<String> },
    History { channel_id: String, latest: MessageTs },
}

type Scripted<T> = Mutex<VecDeque<Result<Page<T>, String>>>;

/// Scripted pages are served first, in order. With no script left, history
/// calls are answered from the simulated channel timelines, and listing
/// calls return an empty final page.
#[derive(Default)]
pub struct MockSlackApi {
    users: Scripted<slack::Member>,
    channels: Scripted<slack::Channel>,
    history: Scripted<slack::Message>,
    timelines: Mutex<HashMap<String, Vec<slack::Message>>>,
    calls: Mutex<Vec<SlackCall>>,
}

/// A history entry with the given `ts` string
pub fn slack_message(ts: &str) -> slack::Message {
    slack::Message {
        ts: ts.to_string(),
        user: Some("U1".to_string()),
        text: Some(format!("message {ts}")),
        ..Default::default()
    }
}

pub fn slack_member(id: &str) -> slack::Member {
    slack::Member {
        id: id.to_string(),
        name: id.to_lowercase(),
        ..Default::default()
    }
}

pub fn slack_channel(id: &str) -> slack::Channel {
    slack::Channel {
        id: id.to_string(),
        name: id.to_lowercase(),
        ..Default::default()
    }
}

impl MockSlackApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users_page(self, members: Vec<slack::Member>, next_cursor: Option<&str>) -> Self {
        self.users.lock().unwrap().push_back(Ok(Page {
            items: members,
            has_more: next_cursor.is_some(),
            next_cursor: next_cursor.map(str::to_string),
        }));
        self
    }

    pub fn with_channels_page(
        self,
        channels: Vec<slack::Channel>,
        next_cursor: Option<&str>,
    ) -> Self {
        self.channels.lock().unwrap().push_back(Ok(Page {
            items: channels,
            has_more: next_cursor.is_some(),
            next_cursor: next_cursor.map(str::to_string),
        }));
        self
    }

    /// Script one history page from `ts` strings, newest first
    pub fn with_history_page(self, timestamps: &[&str], has_more: bool) -> Self {
        self.history.lock().unwrap().push_back(Ok(Page {
            items: timestamps.iter().map(|ts| slack_message(ts)).collect(),
            has_more,
            next_cursor: None,
        }));
        self
    }

    pub fn with_users_error(self, error: &str) -> Self {
        self.users.lock().unwrap().push_back(Err(error.to_string()));
        self
    }

    pub fn with_channels_error(self, error: &str) -> Self {
        self.channels.lock().unwrap().push_back(Err(error.to_string()));
        self
    }

    pub fn with_history_error(self, error: &str) -> Self {
        self.history.lock().unwrap().push_back(Err(error.to_string()));
        self
    }

    /// Simulate a channel whose full history holds these messages
    pub fn with_timeline(self, channel_id: &str, timestamps: &[MessageTs]) -> Self {
        let messages = timestamps
            .iter()
            .map(|ts| slack_message(&ts.to_string()))
            .collect();
        self.timelines
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), messages);
        self
    }

    /// Add messages to a simulated channel after construction
    pub fn post(&self, channel_id: &str, ts: MessageTs) {
        self.timelines
            .lock()
            .unwrap()
            .entry(channel_id.to_string())
            .or_default()
            .push(slack_message(&ts.to_string()));
    }

    pub fn calls(&self) -> Vec<SlackCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn history_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, SlackCall::History { .. }))
            .count()
    }

    fn next_scripted<T>(script: &Scripted<T>) -> Option<Result<Page<T>>> {
        script
            .lock()
            .unwrap()
            .pop_front()
            .map(|r| r.map_err(|e| anyhow!(e)))
    }

    fn timeline_page(
        &self,
        channel_id: &str,
        latest: MessageTs,
        limit: u32,
    ) -> Page<slack::Message> {
        let timelines = self.timelines.lock().unwrap();
        let mut older: Vec<(MessageTs, slack::Message)> = timelines
            .get(channel_id)
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m.ts.parse::<MessageTs>().ok().map(|ts| (ts, m.clone())))
                    .filter(|(ts, _)| *ts < latest)
                    .collect()
            })
            .unwrap_or_default();
        older.sort_by(|a, b| b.0.cmp(&a.0));

        let limit = limit as usize;
        let has_more = older.len() > limit;
        Page {
            items: older.into_iter().take(limit).map(|(_, m)| m).collect(),
            has_more,
            next_cursor: None,
        }
    }
}

#[async_trait]
impl BaseSlackApi for MockSlackApi {
    async fn list_users(
        &self,
        _token: &str,
        cursor: Option<&str>,
        _limit: u32,
    ) -> Result<Page<slack::Member>> {
        self.calls.lock().unwrap().push(SlackCall::Users {
            cursor: cursor.map(str::to_string),
        });
        Self::next_scripted(&self.users).unwrap_or_else(|| {
            Ok(Page {
                items: vec![],
                has_more: false,
                next_cursor: None,
            })
        })
    }

    async fn list_channels(
        &self,
        _token: &str,
        cursor: Option<&str>,
        _limit: u32,
    ) -> Result<Page<slack::Channel>> {
        self.calls.lock().unwrap().push(SlackCall::Channels {
            cursor: cursor.map(str::to_string),
        });
        Self::next_scripted(&self.channels).unwrap_or_else(|| {
            Ok(Page {
                items: vec![],
                has_more: false,
                next_cursor: None,
            })
        })
    }

    async fn channel_history(
        &self,
        _token: &str,
        channel_id: &str,
        latest: MessageTs,
        limit: u32,
    ) -> Result<Page<slack::Message>> {
        self.calls.lock().unwrap().push(SlackCall::History {
            channel_id: channel_id.to_string(),
            latest,
        });
        match Self::next_scripted(&self.history) {
            Some(page) => page,
            None => Ok(self.timeline_page(channel_id, latest, limit)),
        }
    }
}

// =============================================================================
// In-memory Job Queue
// =============================================================================

/// `JobQueue` over a vector, with the same idempotency and retry rules as the
/// Postgres queue.
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<Vec<Job>>,
    fail_enqueue: AtomicBool,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count()
    }

    /// Every job of `job_type` ever enqueued (any status), decoded, in order
    pub fn enqueued<C: DeserializeOwned>(&self, job_type: &str) -> Vec<C> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.job_type == job_type && j.retry_count == 0)
            .filter_map(|j| j.args.clone())
            .filter_map(|args| serde_json::from_value(args).ok())
            .collect()
    }

    /// Pending jobs of `job_type`, decoded, in order
    pub fn pending<C: DeserializeOwned>(&self, job_type: &str) -> Vec<C> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.job_type == job_type && j.status == JobStatus::Pending)
            .filter_map(|j| j.args.clone())
            .filter_map(|args| serde_json::from_value(args).ok())
            .collect()
    }

    fn find_mut<'a>(jobs: &'a mut [Job], id: Uuid) -> Result<&'a mut Job> {
        jobs.iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| anyhow!("job {} not found", id))
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue_spec(&self, spec: JobSpec) -> Result<EnqueueResult> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(anyhow!("enqueue failed"));
        }

        let mut jobs = self.jobs.lock().unwrap();
        if let Some(key) = &spec.idempotency_key {
            let existing = jobs.iter().find(|j| {
                j.idempotency_key.as_ref() == Some(key)
                    && matches!(j.status, JobStatus::Pending | JobStatus::Running)
            });
            if let Some(existing) = existing {
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        let job = spec.into_job();
        let id = job.id;
        jobs.push(job);
        Ok(EnqueueResult::Created(id))
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>> {
        let mut jobs = self.jobs.lock().unwrap();
        let claimed = jobs
            .iter_mut()
            .filter(|j| j.is_ready())
            .take(limit.max(0) as usize)
            .map(|j| {
                j.status = JobStatus::Running;
                j.worker_id = Some(worker_id.to_string());
                j.last_run_at = Some(Utc::now());
                ClaimedJob::new(j.clone())
            })
            .collect();
        Ok(claimed)
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        Self::find_mut(&mut jobs, job_id)?.status = JobStatus::Succeeded;
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = Self::find_mut(&mut jobs, job_id)?;
        job.error_message = Some(error.to_string());
        job.error_kind = Some(kind);

        if kind.should_retry() && job.can_retry() {
            job.status = JobStatus::Failed;
            let retry = job.create_retry(Utc::now() + retry_backoff(job.retry_count));
            jobs.push(retry);
        } else {
            job.status = JobStatus::DeadLetter;
            job.dead_lettered_at = Some(Utc::now());
        }
        Ok(())
    }
}

// =============================================================================
// Recording Error Reporter
// =============================================================================

#[derive(Default)]
pub struct RecordingErrorReporter {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// (context, rendered error) pairs in report order
    pub fn reports(&self) -> Vec<(String, String)> {
        self.reports.lock().unwrap().clone()
    }
}

impl BaseErrorReporter for RecordingErrorReporter {
    fn report(&self, context: &str, error: &dyn Display) {
        self.reports
            .lock()
            .unwrap()
            .push((context.to_string(), error.to_string()));
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub store: Arc<InMemoryStore>,
    pub slack: Arc<MockSlackApi>,
    pub jobs: Arc<MemoryJobQueue>,
    pub cache: Arc<MemoryCache>,
    pub error_reporter: Arc<RecordingErrorReporter>,
    pub settings: SyncSettings,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            slack: Arc::new(MockSlackApi::new()),
            jobs: Arc::new(MemoryJobQueue::new()),
            cache: Arc::new(MemoryCache::new()),
            error_reporter: Arc::new(RecordingErrorReporter::new()),
            settings: SyncSettings::default(),
        }
    }

    pub fn mock_store(mut self, store: InMemoryStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn mock_slack(mut self, slack: MockSlackApi) -> Self {
        self.slack = Arc::new(slack);
        self
    }

    pub fn settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build a ServerDeps sharing these doubles
    pub fn into_deps(&self) -> Arc<ServerDeps> {
        Arc::new(ServerDeps::new(
            self.store.clone(),
            self.slack.clone(),
            self.jobs.clone(),
            self.cache.clone(),
            self.error_reporter.clone(),
            self.settings.clone(),
        ))
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
