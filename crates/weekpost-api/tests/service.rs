use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Europe::Berlin;
use tokio_util::sync::CancellationToken;

use weekpost_api::{ApiError, WeeklyService};
use weekpost_db::Database;
use weekpost_gateway::{ChannelRef, MessagingClient, Reconciler, RemoteError, SyncHandle, SyncWorker};
use weekpost_render::{RenderedMessage, Renderer};
use weekpost_types::api::{CreateEntryRequest, EditEntryRequest};
use weekpost_types::clock::{Clock, ManualClock};
use weekpost_types::config::{ConfigStore, KEY_CHANNEL_ID, KEY_TIMEZONE, WeeklyConfig};
use weekpost_types::models::Category;

#[derive(Default)]
struct MemoryClient {
    messages: Mutex<HashMap<String, RenderedMessage>>,
    next_id: AtomicU64,
}

#[async_trait]
impl MessagingClient for MemoryClient {
    fn is_connected(&self) -> bool {
        true
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<Option<ChannelRef>, RemoteError> {
        Ok(Some(ChannelRef {
            id: channel_id.to_string(),
            name: None,
        }))
    }

    async fn send(&self, _channel: &ChannelRef, message: &RenderedMessage) -> Result<String, RemoteError> {
        let id = format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.messages.lock().unwrap().insert(id.clone(), message.clone());
        Ok(id)
    }

    async fn edit(&self, _channel: &ChannelRef, message_id: &str, message: &RenderedMessage) -> Result<(), RemoteError> {
        match self.messages.lock().unwrap().get_mut(message_id) {
            Some(stored) => {
                *stored = message.clone();
                Ok(())
            }
            None => Err(RemoteError::NotFound),
        }
    }

    async fn fetch(&self, _channel: &ChannelRef, message_id: &str) -> Result<(), RemoteError> {
        if self.messages.lock().unwrap().contains_key(message_id) {
            Ok(())
        } else {
            Err(RemoteError::NotFound)
        }
    }
}

struct Setup {
    service: WeeklyService,
    db: Arc<Database>,
    clock: Arc<ManualClock>,
    client: Arc<MemoryClient>,
    sync: SyncHandle,
    _cancel: CancellationToken,
}

fn berlin(day: u32, hour: u32) -> DateTime<Utc> {
    Berlin
        .with_ymd_and_hms(2024, 1, day, hour, 0, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn setup(now: DateTime<Utc>) -> Setup {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(now));
    let client = Arc::new(MemoryClient::default());
    let raw = BTreeMap::from([(KEY_CHANNEL_ID.to_string(), "chan-1".to_string())]);
    let config = ConfigStore::new(WeeklyConfig::from_map(&raw).unwrap());
    let renderer = Renderer::default();

    let reconciler = Arc::new(Reconciler::new(
        db.clone(),
        client.clone() as Arc<dyn MessagingClient>,
        config.clone(),
        clock.clone() as Arc<dyn Clock>,
        renderer.clone(),
    ));
    let cancel = CancellationToken::new();
    let (sync, _join) = SyncWorker::spawn(reconciler, cancel.clone());

    let service = WeeklyService::new(
        db.clone(),
        config,
        clock.clone() as Arc<dyn Clock>,
        client.clone() as Arc<dyn MessagingClient>,
        sync.clone(),
        renderer,
    );
    Setup {
        service,
        db,
        clock,
        client,
        sync,
        _cancel: cancel,
    }
}

fn create(category: Category, content: &str, author: &str) -> CreateEntryRequest {
    CreateEntryRequest {
        category,
        content: content.into(),
        author: author.into(),
    }
}

#[tokio::test]
async fn create_cleans_input_and_queues_sync() {
    let s = setup(berlin(2, 10));

    let entry = s
        .service
        .create_entry(create(Category::Added, "  New map\r ", " "))
        .await
        .unwrap();

    assert_eq!(entry.content, "New map");
    assert_eq!(entry.author, "unknown");
    assert_eq!(entry.week_start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    s.sync.flush().await.unwrap();
    let status = s.service.status().await.unwrap();
    let message_id = status.message_id.expect("forced sync after create");
    let posted = s.client.messages.lock().unwrap().get(&message_id).cloned().unwrap();
    assert!(posted.blocks[1].contains("> New map"));
}

#[tokio::test]
async fn invalid_input_is_rejected_before_storage() {
    let s = setup(berlin(2, 10));

    let blank = s.service.create_entry(create(Category::Added, " \r ", "bob")).await;
    assert!(matches!(blank, Err(ApiError::Validation(_))));

    let long = s
        .service
        .create_entry(create(Category::Added, &"x".repeat(901), "bob"))
        .await;
    assert_eq!(long.unwrap_err().category(), "validation");

    assert!(s.db.all_entries().unwrap().is_empty());
}

#[tokio::test]
async fn edit_is_partial_and_keeps_identity() {
    let s = setup(berlin(2, 10));
    let created = s
        .service
        .create_entry(create(Category::Added, "X", "alice"))
        .await
        .unwrap();

    let edited = s
        .service
        .edit_entry(
            created.id,
            EditEntryRequest {
                category: Some(Category::Changed),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.id, created.id);
    assert_eq!(edited.week_start, created.week_start);
    assert_eq!(edited.category, Category::Changed);
    assert_eq!(edited.content, "X");
    assert_eq!(edited.author, "alice");
}

#[tokio::test]
async fn edit_and_delete_only_touch_the_current_week() {
    let s = setup(berlin(2, 10));
    let old = s
        .service
        .create_entry(create(Category::Added, "last week", "alice"))
        .await
        .unwrap();

    s.clock.advance(Duration::days(7));

    let edit = s
        .service
        .edit_entry(
            old.id,
            EditEntryRequest {
                content: Some("changed".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(edit, Err(ApiError::NotFound(id)) if id == old.id));
    assert!(matches!(s.service.delete_entry(old.id).await, Err(ApiError::NotFound(_))));
    assert_eq!(s.db.get_entry(old.id).unwrap().unwrap().content, "last week");
}

#[tokio::test]
async fn delete_is_permanent() {
    let s = setup(berlin(2, 10));
    let created = s
        .service
        .create_entry(create(Category::Removed, "Y", "bob"))
        .await
        .unwrap();

    let deleted = s.service.delete_entry(created.id).await.unwrap();
    assert_eq!(deleted.id, created.id);
    assert!(s.service.entries_for_current_week().await.unwrap().is_empty());
    assert!(matches!(
        s.service.delete_entry(created.id).await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn status_reports_schedule_and_record() {
    let s = setup(berlin(1, 11));

    let status = s.service.status().await.unwrap();
    assert!(status.connected);
    assert_eq!(status.week_label, "01.01 - 07.01");
    assert_eq!(status.entry_count, 0);
    assert_eq!(status.scheduled_at, Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap());
    assert!(!status.schedule_reached);
    assert!(status.message_id.is_none());

    s.service.sync(true).await.unwrap();
    let status = s.service.status().await.unwrap();
    assert!(status.message_id.is_some());
}

#[tokio::test]
async fn preview_and_list_render_current_week() {
    let s = setup(berlin(2, 10));
    s.service
        .create_entry(create(Category::Removed, "Old mode", "bob"))
        .await
        .unwrap();
    s.service
        .create_entry(create(Category::Added, "New mode", "alice"))
        .await
        .unwrap();

    let preview = s.service.preview().await.unwrap();
    assert!(preview.starts_with("🎮 WEEKLY RECAP [01.01 - 07.01]"));
    assert!(preview.find("New mode").unwrap() < preview.find("Old mode").unwrap());

    let list = s.service.list_text().await.unwrap();
    assert!(list.starts_with("Current week [01.01 - 07.01]"));
}

#[tokio::test]
async fn analytics_counts_recent_weeks() {
    let s = setup(berlin(2, 10));
    let monday = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
    s.db.create_entry(monday(1), Category::Added, "a", "x").unwrap();
    s.db.create_entry(monday(1), Category::Removed, "b", "x").unwrap();
    s.db.create_entry(monday(8), Category::Changed, "c", "x").unwrap();
    s.db.create_entry(monday(15), Category::Added, "d", "x").unwrap();

    let report = s.service.analytics(Some(2)).await.unwrap();
    assert_eq!(report.window_weeks, 2);
    assert_eq!(report.weeks.len(), 2);
    assert_eq!(report.totals.total(), 2);

    let clamped = s.service.analytics(Some(0)).await.unwrap();
    assert_eq!(clamped.window_weeks, 1);

    let default = s.service.analytics(None).await.unwrap();
    assert_eq!(default.window_weeks, 8);
    assert_eq!(default.totals.total(), 4);
}

#[tokio::test]
async fn snapshot_exports_everything() {
    let s = setup(berlin(2, 10));
    s.service
        .create_entry(create(Category::Added, "X", "alice"))
        .await
        .unwrap();
    s.service.sync(true).await.unwrap();

    let snapshot = s.service.snapshot().await.unwrap();
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.weekly_messages.len(), 1);
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["entries"][0]["category"], "added");
}

#[tokio::test]
async fn invalid_config_update_keeps_current_snapshot() {
    let s = setup(berlin(2, 10));

    let err = s
        .service
        .update_config(&BTreeMap::from([(KEY_TIMEZONE.to_string(), "Mars/Olympus".to_string())]))
        .unwrap_err();

    assert_eq!(err.category(), "config");
    assert_eq!(s.service.config().timezone, Berlin);
}
