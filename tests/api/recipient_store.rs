use chrono::{DateTime, Duration, DurationRound, Utc};
use claim::{assert_none, assert_some};
use daily_greeting::config::get_configuration;
use daily_greeting::domain::recipient::RecipientRecord;
use daily_greeting::domain::recipient_email::RecipientEmail;
use daily_greeting::store::{PgRecipientStore, RecipientStore};
use uuid::Uuid;

use crate::helpers::configure_db;

async fn store() -> PgRecipientStore {
    let mut config = get_configuration().expect("Missing configuration file.");

    PgRecipientStore::new(configure_db(&mut config.database).await)
}

// Postgres keeps microseconds, so records are built on whole seconds to compare equal
fn now() -> DateTime<Utc> {
    Utc::now().duration_trunc(Duration::seconds(1)).unwrap()
}

fn record(address: &str, expiry_date: DateTime<Utc>, is_deleted: bool) -> RecipientRecord {
    RecipientRecord {
        id: Uuid::new_v4(),
        email: RecipientEmail::parse(address.to_string()).unwrap(),
        expiry_date,
        created_on: expiry_date - Duration::days(30),
        is_deleted,
    }
}

#[tokio::test]
async fn upsert_with_an_existing_id_replaces_the_stored_fields() {
    let store = store().await;
    let now = now();
    let mut recipient = record("a@x.com", now + Duration::days(1), false);

    store.upsert(&recipient).await.unwrap();
    recipient.email = RecipientEmail::parse(String::from("b@x.com")).unwrap();
    recipient.expiry_date = now + Duration::days(2);
    store.upsert(&recipient).await.unwrap();

    let active = store.list_active(now).await.unwrap();

    assert_eq!(active, vec![recipient]);
}

#[tokio::test]
async fn upsert_keeps_soft_deleted_records_deleted() {
    let store = store().await;
    let now = now();
    let mut recipient = record("a@x.com", now + Duration::days(1), true);

    store.upsert(&recipient).await.unwrap();
    recipient.is_deleted = false;
    store.upsert(&recipient).await.unwrap();

    let stored = assert_some!(store.find(recipient.id).await.unwrap());

    assert!(stored.is_deleted);
}

#[tokio::test]
async fn list_active_excludes_expired_and_deleted_records() {
    let store = store().await;
    let now = now();
    let active = record("active@test.com", now + Duration::days(1), false);
    let expiring_now = record("now@test.com", now, false);
    let expired = record("expired@test.com", now - Duration::days(1), false);
    let deleted = record("deleted@test.com", now + Duration::days(1), true);

    for recipient in [&active, &expiring_now, &expired, &deleted] {
        store.upsert(recipient).await.unwrap();
    }

    assert_eq!(store.list_active(now).await.unwrap(), vec![active]);
}

#[tokio::test]
async fn soft_delete_expired_flags_past_records_once() {
    let store = store().await;
    let now = now();
    let expired = record("expired@test.com", now - Duration::days(1), false);
    let active = record("active@test.com", now + Duration::days(1), false);

    store.upsert(&expired).await.unwrap();
    store.upsert(&active).await.unwrap();

    assert_eq!(store.soft_delete_expired(now).await.unwrap(), 1);
    assert_eq!(store.soft_delete_expired(now).await.unwrap(), 0);
    assert!(store.find(expired.id).await.unwrap().unwrap().is_deleted);
    assert!(!store.find(active.id).await.unwrap().unwrap().is_deleted);
}

#[tokio::test]
async fn hard_delete_removes_records_older_than_the_threshold() {
    let store = store().await;
    let threshold = now() - Duration::days(7);
    let old = record("old@test.com", threshold - Duration::seconds(1), true);
    let old_not_swept = record("old2@test.com", threshold - Duration::days(1), false);
    let boundary = record("boundary@test.com", threshold, true);

    for recipient in [&old, &old_not_swept, &boundary] {
        store.upsert(recipient).await.unwrap();
    }

    assert_eq!(store.hard_delete_older_than(threshold).await.unwrap(), 2);
    assert_none!(store.find(old.id).await.unwrap());
    assert_none!(store.find(old_not_swept.id).await.unwrap());
    assert_some!(store.find(boundary.id).await.unwrap());
}

#[tokio::test]
async fn find_active_by_email_ignores_deleted_records() {
    let store = store().await;
    let now = now();
    let deleted = record("sunshine@test.com", now + Duration::days(1), true);

    store.upsert(&deleted).await.unwrap();

    let email = RecipientEmail::parse(String::from("sunshine@test.com")).unwrap();

    assert_none!(store.find_active_by_email(&email, now).await.unwrap());
}

#[tokio::test]
async fn concurrent_enrollments_of_one_address_keep_a_single_active_record() {
    let store = store().await;
    let now = now();
    let candidate = || RecipientRecord {
        created_on: now,
        ..record("sunshine@test.com", now + Duration::days(30), false)
    };
    let (first, second) = (candidate(), candidate());

    let (first, second) = tokio::join!(
        store.enroll_or_extend(&first),
        store.enroll_or_extend(&second)
    );

    assert_eq!(first.unwrap().id, second.unwrap().id);
    assert_eq!(store.list_active(now).await.unwrap().len(), 1);
}

#[tokio::test]
async fn enroll_or_extend_ignores_soft_deleted_records() {
    let store = store().await;
    let now = now();
    let deleted = record("sunshine@test.com", now + Duration::days(1), true);

    store.upsert(&deleted).await.unwrap();
    let candidate = RecipientRecord {
        created_on: now,
        ..record("sunshine@test.com", now + Duration::days(30), false)
    };
    let enrolled = store.enroll_or_extend(&candidate).await.unwrap();

    assert_eq!(enrolled.id, candidate.id);
    assert!(assert_some!(store.find(deleted.id).await.unwrap()).is_deleted);
}
