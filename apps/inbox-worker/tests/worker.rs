use std::{sync::Mutex, time::Duration as StdDuration};

use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use inbox_domain::{
	job::{JobPayload, SendText},
	message_status::MessageStatus,
};
use inbox_providers::{BoxFuture, FetchedMedia, MediaUpload, MessagingProvider, RemoteTemplate};
use inbox_storage::{blob::BlobStore, contacts, conversations, db::Db, jobs, messages, webhook_events};
use inbox_testkit::TestDatabase;
use inbox_worker::{
	circuit::CircuitBreaker,
	inbound, outbound,
	scheduler::{WorkerSettings, WorkerState},
	sla, timeouts,
};

const PHONE_NUMBER_ID: &str = "1234567890";
const WA_ID: &str = "5511999990000";

/// Answers every send with a fixed HTTP status, or with `reply_id` when `fail_status` is unset.
struct StubProvider {
	fail_status: Option<u16>,
	reply_id: Option<&'static str>,
	sent: Mutex<Vec<Value>>,
}
impl StubProvider {
	fn failing(status: u16) -> Self {
		Self { fail_status: Some(status), reply_id: None, sent: Mutex::new(Vec::new()) }
	}

	/// Accepts every send but never reports a message id.
	fn accepting_without_id() -> Self {
		Self { fail_status: None, reply_id: None, sent: Mutex::new(Vec::new()) }
	}

	fn send_count(&self) -> usize {
		self.sent.lock().expect("Stub lock poisoned.").len()
	}
}
impl MessagingProvider for StubProvider {
	fn send_message<'a>(
		&'a self,
		_phone_number_id: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, inbox_providers::Result<Option<String>>> {
		Box::pin(async move {
			self.sent.lock().expect("Stub lock poisoned.").push(body.clone());

			match self.fail_status {
				Some(status) => Err(inbox_providers::Error::Http {
					status,
					body: "Service Unavailable".to_string(),
				}),
				None => Ok(self.reply_id.map(str::to_string)),
			}
		})
	}

	fn upload_media<'a>(
		&'a self,
		_phone_number_id: &'a str,
		_upload: MediaUpload,
	) -> BoxFuture<'a, inbox_providers::Result<String>> {
		Box::pin(async { Ok("media-handle".to_string()) })
	}

	fn fetch_media<'a>(
		&'a self,
		_media_id: &'a str,
	) -> BoxFuture<'a, inbox_providers::Result<FetchedMedia>> {
		Box::pin(async {
			Ok(FetchedMedia { bytes: b"media".to_vec(), mime_type: Some("image/jpeg".to_string()) })
		})
	}

	fn fetch_url<'a>(
		&'a self,
		_url: &'a str,
		_authenticated: bool,
	) -> BoxFuture<'a, inbox_providers::Result<FetchedMedia>> {
		Box::pin(async { Ok(FetchedMedia { bytes: b"ad".to_vec(), mime_type: None }) })
	}

	fn list_templates<'a>(
		&'a self,
		_phone_number_id: &'a str,
	) -> BoxFuture<'a, inbox_providers::Result<Vec<RemoteTemplate>>> {
		Box::pin(async { Ok(Vec::new()) })
	}
}

struct Fixture {
	tenant_id: Uuid,
	contact_id: Uuid,
	conversation_id: Uuid,
}

async fn open_db(test_db: &TestDatabase) -> Db {
	let cfg = inbox_config::Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	db
}

fn worker_state(db: Db, media_root: &std::path::Path) -> WorkerState {
	let blobs = BlobStore::new(&inbox_config::Media {
		root: media_root.to_path_buf(),
		bucket: "media".to_string(),
	});
	let settings = WorkerSettings {
		worker_id: "worker-test".to_string(),
		poll_interval: StdDuration::from_millis(100),
		inbound_batch: 50,
		outbound_batch: 10,
		ffmpeg_path: None,
	};

	WorkerState::new(db, blobs, None, settings)
}

async fn seed(db: &Db, now: OffsetDateTime) -> Fixture {
	let tenant_id =
		inbox_testkit::seed_tenant(&db.pool, "clinic").await.expect("Failed to seed tenant.");

	inbox_testkit::seed_channel(&db.pool, tenant_id, PHONE_NUMBER_ID)
		.await
		.expect("Failed to seed channel.");

	let contact = contacts::upsert_contact(db, tenant_id, "+5511999990000", Some("Ana"), None, now)
		.await
		.expect("Failed to seed contact.");
	let conversation = conversations::find_or_create_open(db, tenant_id, contact.id, None, now)
		.await
		.expect("Failed to seed conversation.");

	Fixture { tenant_id, contact_id: contact.id, conversation_id: conversation.id }
}

/// Enqueues a text send for a freshly stored outbound message.
async fn enqueue_text(db: &Db, fixture: &Fixture, text: &str, now: OffsetDateTime) -> (Uuid, i64) {
	let message_id =
		messages::insert_outbound_text(db, fixture.tenant_id, fixture.conversation_id, text, now)
			.await
			.expect("Failed to insert message.");
	let payload = JobPayload::SendText(SendText {
		tenant_id: fixture.tenant_id,
		conversation_id: fixture.conversation_id,
		contact_phone_e164: "+5511999990000".to_string(),
		text: text.to_string(),
		message_id,
	});
	let job_id = jobs::enqueue(
		db,
		fixture.tenant_id,
		payload.job_type(),
		&payload.to_value(),
		jobs::DEFAULT_MAX_ATTEMPTS,
	)
	.await
	.expect("Failed to enqueue job.");

	(message_id, job_id)
}

/// Whole seconds, so values survive a round trip through `timestamptz`.
fn whole_seconds(at: OffsetDateTime) -> OffsetDateTime {
	OffsetDateTime::from_unix_timestamp(at.unix_timestamp()).expect("Valid timestamp.")
}

fn text_event_at(message_id: &str, body: &str, sent_at: OffsetDateTime) -> Value {
	let mut event = text_event(message_id, body);

	event["entry"][0]["changes"][0]["value"]["messages"][0]["timestamp"] =
		json!(sent_at.unix_timestamp().to_string());

	event
}

fn text_event(message_id: &str, body: &str) -> Value {
	json!({
		"object": "whatsapp_business_account",
		"entry": [{
			"changes": [{
				"field": "messages",
				"value": {
					"metadata": { "phone_number_id": PHONE_NUMBER_ID },
					"contacts": [{ "wa_id": WA_ID, "profile": { "name": "Ana" } }],
					"messages": [{
						"from": WA_ID,
						"id": message_id,
						"type": "text",
						"text": { "body": body },
					}],
				},
			}],
		}],
	})
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set INBOX_PG_DSN to run."]
async fn transient_send_failures_back_off_then_fail_the_message() {
	let Some(base_dsn) = inbox_testkit::env_dsn() else {
		eprintln!(
			"Skipping transient_send_failures_back_off_then_fail_the_message; set INBOX_PG_DSN to run this test."
		);
		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open_db(&test_db).await;
	let media_root = tempfile::tempdir().expect("Failed to create media root.");
	let state = worker_state(db.clone(), media_root.path());
	let now = OffsetDateTime::now_utc() + Duration::seconds(5);
	let fixture = seed(&db, now).await;
	let message_id =
		messages::insert_outbound_text(&db, fixture.tenant_id, fixture.conversation_id, "Olá", now)
			.await
			.expect("Failed to insert message.");
	let payload = JobPayload::SendText(SendText {
		tenant_id: fixture.tenant_id,
		conversation_id: fixture.conversation_id,
		contact_phone_e164: "+5511999990000".to_string(),
		text: "Olá".to_string(),
		message_id,
	});
	let job_id = jobs::enqueue(
		&db,
		fixture.tenant_id,
		payload.job_type(),
		&payload.to_value(),
		jobs::DEFAULT_MAX_ATTEMPTS,
	)
	.await
	.expect("Failed to enqueue job.");
	let provider = StubProvider::failing(503);
	let mut circuit = CircuitBreaker::default();

	outbound::process_outbound_jobs(&state, &provider, &mut circuit, now)
		.await
		.expect("Dispatch failed.");

	let row = jobs::fetch_job(&db, job_id).await.expect("Fetch failed.").expect("Missing job.");

	assert_eq!(row.status, "queued");
	assert_eq!(row.attempts, 1);
	assert!(row.run_at >= now + Duration::milliseconds(499), "run_at {} too early", row.run_at);
	assert!(row.run_at < now + Duration::milliseconds(751), "run_at {} too late", row.run_at);

	for offset in [1, 3] {
		outbound::process_outbound_jobs(&state, &provider, &mut circuit, now + Duration::seconds(offset))
			.await
			.expect("Dispatch failed.");
	}

	let row = jobs::fetch_job(&db, job_id).await.expect("Fetch failed.").expect("Missing job.");
	let status = messages::fetch_status(&db, message_id).await.expect("Fetch failed.");

	assert_eq!(row.status, "failed");
	assert_eq!(row.attempts, 3);
	assert_eq!(status, Some(MessageStatus::Failed));
	assert_eq!(provider.send_count(), 3);
	assert!(!circuit.is_open(now + Duration::seconds(3)), "Three failures stay under the threshold.");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set INBOX_PG_DSN to run."]
async fn silent_agent_loses_the_conversation_once() {
	let Some(base_dsn) = inbox_testkit::env_dsn() else {
		eprintln!("Skipping silent_agent_loses_the_conversation_once; set INBOX_PG_DSN to run this test.");
		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open_db(&test_db).await;
	let media_root = tempfile::tempdir().expect("Failed to create media root.");
	let state = worker_state(db.clone(), media_root.path());
	let now = OffsetDateTime::now_utc();
	let fixture = seed(&db, now).await;
	let agent_id = Uuid::new_v4();

	sqlx::query(
		"\
UPDATE conversations
SET status_fila = 'in_progress', assigned_user_id = $2, last_patient_message_at = $3
WHERE id = $1",
	)
	.bind(fixture.conversation_id)
	.bind(agent_id)
	.bind(now - Duration::minutes(6))
	.execute(&db.pool)
	.await
	.expect("Failed to assign conversation.");

	let first = timeouts::enforce_timeouts(&state, now).await.expect("Timeout pass failed.");
	let second = timeouts::enforce_timeouts(&state, now + Duration::seconds(5))
		.await
		.expect("Timeout pass failed.");
	let (status, assigned): (String, Option<Uuid>) =
		sqlx::query_as("SELECT status_fila, assigned_user_id FROM conversations WHERE id = $1")
			.bind(fixture.conversation_id)
			.fetch_one(&db.pool)
			.await
			.expect("Failed to read conversation.");
	let notices: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM internal_messages WHERE conversation_id = $1 AND to_user_id = $2 AND kind = 'auto_return'",
	)
	.bind(fixture.conversation_id)
	.bind(agent_id)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to count notices.");

	assert_eq!(first.returned, 1);
	assert_eq!(second.returned, 0);
	assert_eq!(status, "awaiting_agent");
	assert_eq!(assigned, None);
	assert_eq!(notices, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set INBOX_PG_DSN to run."]
async fn rating_reply_rates_the_finalized_conversation() {
	let Some(base_dsn) = inbox_testkit::env_dsn() else {
		eprintln!(
			"Skipping rating_reply_rates_the_finalized_conversation; set INBOX_PG_DSN to run this test."
		);
		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open_db(&test_db).await;
	let media_root = tempfile::tempdir().expect("Failed to create media root.");
	let state = worker_state(db.clone(), media_root.path());
	let now = OffsetDateTime::now_utc();
	let fixture = seed(&db, now).await;

	sqlx::query("UPDATE conversations SET status_fila = 'finalized', finalized_at = $2 WHERE id = $1")
		.bind(fixture.conversation_id)
		.bind(now - Duration::hours(1))
		.execute(&db.pool)
		.await
		.expect("Failed to finalize conversation.");
	webhook_events::insert(&db, &text_event("wamid.rating", "5 ótimo atendimento"))
		.await
		.expect("Failed to insert event.");

	inbound::process_pending_webhook_events(&state, now).await.expect("Ingest failed.");

	let (rating, comment): (i16, Option<String>) = sqlx::query_as(
		"SELECT rating, comment FROM conversation_ratings WHERE conversation_id = $1",
	)
	.bind(fixture.conversation_id)
	.fetch_one(&db.pool)
	.await
	.expect("Rating was not recorded.");
	let reopened = conversations::find_open(&db, fixture.tenant_id, fixture.contact_id)
		.await
		.expect("Lookup failed.");

	assert_eq!(rating, 5);
	assert_eq!(comment.as_deref(), Some("ótimo atendimento"));
	assert!(reopened.is_some_and(|open| open.id != fixture.conversation_id));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set INBOX_PG_DSN to run."]
async fn redelivered_webhooks_store_one_message() {
	let Some(base_dsn) = inbox_testkit::env_dsn() else {
		eprintln!("Skipping redelivered_webhooks_store_one_message; set INBOX_PG_DSN to run this test.");
		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open_db(&test_db).await;
	let media_root = tempfile::tempdir().expect("Failed to create media root.");
	let state = worker_state(db.clone(), media_root.path());
	let now = OffsetDateTime::now_utc();
	let fixture = seed(&db, now).await;
	let event = text_event("wamid.duplicate", "Bom dia");

	webhook_events::insert(&db, &event).await.expect("Failed to insert event.");
	webhook_events::insert(&db, &event).await.expect("Failed to insert event.");
	webhook_events::insert(&db, &json!({ "entry": "not-a-list" }))
		.await
		.expect("Failed to insert event.");

	let consumed =
		inbound::process_pending_webhook_events(&state, now).await.expect("Ingest failed.");
	let stored: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM messages WHERE meta_message_id = 'wamid.duplicate' AND conversation_id = $1",
	)
	.bind(fixture.conversation_id)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to count messages.");
	let errors: Vec<Option<String>> = sqlx::query_scalar(
		"SELECT processing_error FROM whatsapp_webhook_events WHERE processed_at IS NOT NULL ORDER BY id",
	)
	.fetch_all(&db.pool)
	.await
	.expect("Failed to read events.");
	let (status, last_patient_message_at): (String, Option<OffsetDateTime>) = sqlx::query_as(
		"SELECT status_fila, last_patient_message_at FROM conversations WHERE id = $1",
	)
	.bind(fixture.conversation_id)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to read conversation.");

	assert_eq!(consumed, 3);
	assert_eq!(stored, 1);
	assert_eq!(errors.len(), 3);
	assert_eq!(errors[0], None);
	assert_eq!(errors[1], None);
	assert!(errors[2].as_deref().is_some_and(|error| error.starts_with("invalid_envelope")));
	assert_eq!(status, "awaiting_agent");
	assert!(last_patient_message_at.is_some());
	assert!(
		webhook_events::fetch_pending(&db, 10).await.expect("Fetch failed.").is_empty(),
		"Every event must be consumed exactly once."
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set INBOX_PG_DSN to run."]
async fn accepted_send_without_id_completes_the_job() {
	let Some(base_dsn) = inbox_testkit::env_dsn() else {
		eprintln!(
			"Skipping accepted_send_without_id_completes_the_job; set INBOX_PG_DSN to run this test."
		);
		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open_db(&test_db).await;
	let media_root = tempfile::tempdir().expect("Failed to create media root.");
	let state = worker_state(db.clone(), media_root.path());
	let now = OffsetDateTime::now_utc() + Duration::seconds(5);
	let fixture = seed(&db, now).await;
	let (message_id, job_id) = enqueue_text(&db, &fixture, "Olá", now).await;
	let provider = StubProvider::accepting_without_id();
	let mut circuit = CircuitBreaker::default();

	outbound::process_outbound_jobs(&state, &provider, &mut circuit, now)
		.await
		.expect("Dispatch failed.");

	let row = jobs::fetch_job(&db, job_id).await.expect("Fetch failed.").expect("Missing job.");
	let status = messages::fetch_status(&db, message_id).await.expect("Fetch failed.");
	let meta_message_id: Option<String> =
		sqlx::query_scalar("SELECT meta_message_id FROM messages WHERE id = $1")
			.bind(message_id)
			.fetch_one(&db.pool)
			.await
			.expect("Failed to read message.");

	assert_eq!(row.status, "done");
	assert_eq!(row.attempts, 1);
	assert_eq!(status, Some(MessageStatus::Sent));
	assert_eq!(meta_message_id, None);
	assert_eq!(provider.send_count(), 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set INBOX_PG_DSN to run."]
async fn open_circuit_leaves_queued_jobs_unclaimed() {
	let Some(base_dsn) = inbox_testkit::env_dsn() else {
		eprintln!(
			"Skipping open_circuit_leaves_queued_jobs_unclaimed; set INBOX_PG_DSN to run this test."
		);
		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open_db(&test_db).await;
	let media_root = tempfile::tempdir().expect("Failed to create media root.");
	let state = worker_state(db.clone(), media_root.path());
	let now = OffsetDateTime::now_utc() + Duration::seconds(5);
	let fixture = seed(&db, now).await;

	for n in 0..5 {
		enqueue_text(&db, &fixture, &format!("Olá {n}"), now).await;
	}

	let provider = StubProvider::failing(503);
	let mut circuit = CircuitBreaker::default();
	let claimed = outbound::process_outbound_jobs(&state, &provider, &mut circuit, now)
		.await
		.expect("Dispatch failed.");

	assert_eq!(claimed, 5);
	assert!(circuit.is_open(now), "Five transient failures open the circuit.");

	let (_, held_job) = enqueue_text(&db, &fixture, "Depois", now).await;
	let later = now + Duration::seconds(1);
	let claimed = outbound::process_outbound_jobs(&state, &provider, &mut circuit, later)
		.await
		.expect("Dispatch failed.");
	let row = jobs::fetch_job(&db, held_job).await.expect("Fetch failed.").expect("Missing job.");

	assert_eq!(claimed, 0);
	assert_eq!(row.status, "queued");
	assert_eq!(row.attempts, 0);
	assert_eq!(row.locked_by, None);
	assert_eq!(row.locked_at, None);
	assert_eq!(provider.send_count(), 5);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set INBOX_PG_DSN to run."]
async fn sla_timer_breaches_once_then_records_the_response() {
	let Some(base_dsn) = inbox_testkit::env_dsn() else {
		eprintln!(
			"Skipping sla_timer_breaches_once_then_records_the_response; set INBOX_PG_DSN to run this test."
		);
		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open_db(&test_db).await;
	let media_root = tempfile::tempdir().expect("Failed to create media root.");
	let state = worker_state(db.clone(), media_root.path());
	let now = whole_seconds(OffsetDateTime::now_utc());
	let fixture = seed(&db, now).await;

	sqlx::query("UPDATE conversations SET last_patient_message_at = $2 WHERE id = $1")
		.bind(fixture.conversation_id)
		.bind(now)
		.execute(&db.pool)
		.await
		.expect("Failed to record patient message.");

	let waiting = sla::recompute_sla(&state, now).await.expect("SLA pass failed.");
	let (started_at, due_at): (OffsetDateTime, OffsetDateTime) =
		sqlx::query_as("SELECT started_at, due_at FROM sla_timers WHERE conversation_id = $1")
			.bind(fixture.conversation_id)
			.fetch_one(&db.pool)
			.await
			.expect("Timer was not created.");

	assert_eq!(waiting, sla::SlaSummary { timers: 1, breaches: 0, responses: 0 });
	assert_eq!(started_at, now);
	assert_eq!(due_at, now + Duration::seconds(300));

	let breached = sla::recompute_sla(&state, now + Duration::seconds(301))
		.await
		.expect("SLA pass failed.");
	let repeated = sla::recompute_sla(&state, now + Duration::seconds(302))
		.await
		.expect("SLA pass failed.");
	let breaches: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM sla_events WHERE conversation_id = $1 AND type = 'breach'",
	)
	.bind(fixture.conversation_id)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to count breaches.");

	assert_eq!(breached.breaches, 1);
	assert_eq!(repeated.breaches, 0);
	assert_eq!(breaches, 1);

	conversations::record_outbound(&db, fixture.conversation_id, now + Duration::seconds(310))
		.await
		.expect("Failed to record reply.");

	let answered = sla::recompute_sla(&state, now + Duration::seconds(311))
		.await
		.expect("SLA pass failed.");
	let timers: i64 = sqlx::query_scalar("SELECT count(*) FROM sla_timers WHERE conversation_id = $1")
		.bind(fixture.conversation_id)
		.fetch_one(&db.pool)
		.await
		.expect("Failed to count timers.");
	let response_seconds: Vec<Option<i64>> = sqlx::query_scalar(
		"SELECT response_seconds FROM sla_events WHERE conversation_id = $1 AND type = 'response'",
	)
	.bind(fixture.conversation_id)
	.fetch_all(&db.pool)
	.await
	.expect("Failed to read responses.");

	assert_eq!(answered, sla::SlaSummary { timers: 0, breaches: 0, responses: 1 });
	assert_eq!(timers, 0);
	assert_eq!(response_seconds, vec![Some(310)]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set INBOX_PG_DSN to run."]
async fn late_webhooks_never_rewind_the_patient_clock() {
	let Some(base_dsn) = inbox_testkit::env_dsn() else {
		eprintln!(
			"Skipping late_webhooks_never_rewind_the_patient_clock; set INBOX_PG_DSN to run this test."
		);
		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open_db(&test_db).await;
	let media_root = tempfile::tempdir().expect("Failed to create media root.");
	let state = worker_state(db.clone(), media_root.path());
	let now = whole_seconds(OffsetDateTime::now_utc());
	let fixture = seed(&db, now).await;
	let newer = now - Duration::minutes(1);
	let older = now - Duration::minutes(10);
	let newer_event = text_event_at("wamid.newer", "Ainda aguardo", newer);

	webhook_events::insert(&db, &newer_event).await.expect("Failed to insert event.");
	inbound::process_pending_webhook_events(&state, now).await.expect("Ingest failed.");
	webhook_events::insert(&db, &text_event_at("wamid.older", "Bom dia", older))
		.await
		.expect("Failed to insert event.");
	webhook_events::insert(&db, &newer_event).await.expect("Failed to insert event.");
	inbound::process_pending_webhook_events(&state, now + Duration::seconds(1))
		.await
		.expect("Ingest failed.");

	let (last_patient_message_at, last_inbound_at): (Option<OffsetDateTime>, Option<OffsetDateTime>) =
		sqlx::query_as(
			"SELECT last_patient_message_at, last_inbound_at FROM conversations WHERE id = $1",
		)
		.bind(fixture.conversation_id)
		.fetch_one(&db.pool)
		.await
		.expect("Failed to read conversation.");
	let stored: i64 =
		sqlx::query_scalar("SELECT count(*) FROM messages WHERE conversation_id = $1")
			.bind(fixture.conversation_id)
			.fetch_one(&db.pool)
			.await
			.expect("Failed to count messages.");

	assert_eq!(last_patient_message_at, Some(newer));
	assert_eq!(last_inbound_at, Some(newer));
	assert_eq!(stored, 2);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set INBOX_PG_DSN to run."]
async fn replayed_message_does_not_reopen_a_finalized_conversation() {
	let Some(base_dsn) = inbox_testkit::env_dsn() else {
		eprintln!(
			"Skipping replayed_message_does_not_reopen_a_finalized_conversation; set INBOX_PG_DSN to run this test."
		);
		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = open_db(&test_db).await;
	let media_root = tempfile::tempdir().expect("Failed to create media root.");
	let state = worker_state(db.clone(), media_root.path());
	let now = OffsetDateTime::now_utc();
	let fixture = seed(&db, now).await;
	let event = text_event("wamid.once", "Bom dia");

	webhook_events::insert(&db, &event).await.expect("Failed to insert event.");
	inbound::process_pending_webhook_events(&state, now).await.expect("Ingest failed.");
	sqlx::query("UPDATE conversations SET status_fila = 'finalized', finalized_at = $2 WHERE id = $1")
		.bind(fixture.conversation_id)
		.bind(now)
		.execute(&db.pool)
		.await
		.expect("Failed to finalize conversation.");
	webhook_events::insert(&db, &event).await.expect("Failed to insert event.");
	inbound::process_pending_webhook_events(&state, now + Duration::seconds(1))
		.await
		.expect("Ingest failed.");

	let open = conversations::find_open(&db, fixture.tenant_id, fixture.contact_id)
		.await
		.expect("Lookup failed.");
	let total: i64 =
		sqlx::query_scalar("SELECT count(*) FROM conversations WHERE contact_id = $1")
			.bind(fixture.contact_id)
			.fetch_one(&db.pool)
			.await
			.expect("Failed to count conversations.");

	assert!(open.is_none(), "A replay must not open a new conversation.");
	assert_eq!(total, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
