#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Europe::Berlin;

use weekpost_db::Database;
use weekpost_gateway::{ChannelRef, MessagingClient, Reconciler, RemoteError};
use weekpost_render::{RenderedMessage, Renderer};
use weekpost_types::clock::{Clock, ManualClock};
use weekpost_types::config::{ConfigStore, KEY_CHANNEL_ID, WeeklyConfig};
use weekpost_types::models::Category;

pub const CHANNEL: &str = "chan-1";

/// In-memory messaging backend with scriptable failures.
pub struct ScriptedClient {
    connected: AtomicBool,
    channels: Mutex<HashSet<String>>,
    messages: Mutex<HashMap<String, RenderedMessage>>,
    next_id: AtomicU64,
    sends: AtomicUsize,
    edits: AtomicUsize,
    fail_send: Mutex<Option<RemoteError>>,
    fail_edit: Mutex<Option<RemoteError>>,
    vanish_channel: AtomicBool,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            channels: Mutex::new(HashSet::from([CHANNEL.to_string()])),
            messages: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            sends: AtomicUsize::new(0),
            edits: AtomicUsize::new(0),
            fail_send: Mutex::new(None),
            fail_edit: Mutex::new(None),
            vanish_channel: AtomicBool::new(false),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn delete_message(&self, id: &str) {
        self.messages.lock().unwrap().remove(id);
    }

    pub fn remove_channel(&self, id: &str) {
        self.channels.lock().unwrap().remove(id);
    }

    pub fn fail_next_send(&self, err: RemoteError) {
        *self.fail_send.lock().unwrap() = Some(err);
    }

    pub fn fail_next_edit(&self, err: RemoteError) {
        *self.fail_edit.lock().unwrap() = Some(err);
    }

    /// The next edit finds the channel gone and reports the message missing.
    pub fn vanish_channel_on_next_edit(&self) {
        self.vanish_channel.store(true, Ordering::SeqCst);
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn edits(&self) -> usize {
        self.edits.load(Ordering::SeqCst)
    }

    pub fn message(&self, id: &str) -> Option<RenderedMessage> {
        self.messages.lock().unwrap().get(id).cloned()
    }

    pub fn live_messages(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl MessagingClient for ScriptedClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<Option<ChannelRef>, RemoteError> {
        tokio::task::yield_now().await;
        let known = self.channels.lock().unwrap().contains(channel_id);
        Ok(known.then(|| ChannelRef {
            id: channel_id.to_string(),
            name: Some("updates".into()),
        }))
    }

    async fn send(&self, _channel: &ChannelRef, message: &RenderedMessage) -> Result<String, RemoteError> {
        tokio::task::yield_now().await;
        if let Some(err) = self.fail_send.lock().unwrap().take() {
            return Err(err);
        }
        let id = format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.messages.lock().unwrap().insert(id.clone(), message.clone());
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn edit(
        &self,
        _channel: &ChannelRef,
        message_id: &str,
        message: &RenderedMessage,
    ) -> Result<(), RemoteError> {
        tokio::task::yield_now().await;
        if let Some(err) = self.fail_edit.lock().unwrap().take() {
            return Err(err);
        }
        if self.vanish_channel.swap(false, Ordering::SeqCst) {
            self.channels.lock().unwrap().clear();
            return Err(RemoteError::NotFound);
        }
        let mut messages = self.messages.lock().unwrap();
        match messages.get_mut(message_id) {
            Some(stored) => {
                *stored = message.clone();
                self.edits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(RemoteError::NotFound),
        }
    }

    async fn fetch(&self, _channel: &ChannelRef, message_id: &str) -> Result<(), RemoteError> {
        tokio::task::yield_now().await;
        if self.messages.lock().unwrap().contains_key(message_id) {
            Ok(())
        } else {
            Err(RemoteError::NotFound)
        }
    }
}

pub struct Harness {
    pub db: Arc<Database>,
    pub client: Arc<ScriptedClient>,
    pub clock: Arc<ManualClock>,
    pub config: ConfigStore,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_channel(now, CHANNEL)
    }

    pub fn with_channel(now: DateTime<Utc>, channel_id: &str) -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let client = Arc::new(ScriptedClient::new());
        let clock = Arc::new(ManualClock::new(now));
        let raw = BTreeMap::from([(KEY_CHANNEL_ID.to_string(), channel_id.to_string())]);
        let config = ConfigStore::new(WeeklyConfig::from_map(&raw).unwrap());
        let reconciler = Arc::new(Reconciler::new(
            db.clone(),
            client.clone() as Arc<dyn MessagingClient>,
            config.clone(),
            clock.clone() as Arc<dyn Clock>,
            Renderer::default(),
        ));
        Self {
            db,
            client,
            clock,
            config,
            reconciler,
        }
    }

    pub fn add(&self, category: Category, content: &str) -> i64 {
        self.db
            .create_entry(week_start(), category, content, "alice")
            .unwrap()
            .id
    }

    pub fn record_id(&self) -> Option<String> {
        self.db
            .find_weekly_message(week_start())
            .unwrap()
            .map(|r| r.message_id)
    }
}

/// Monday of the scenario week.
pub fn week_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Wall-clock time in Berlin on the scenario Monday.
pub fn berlin_monday(hour: u32, minute: u32) -> DateTime<Utc> {
    Berlin
        .with_ymd_and_hms(2024, 1, 1, hour, minute, 0)
        .unwrap()
        .with_timezone(&Utc)
}
