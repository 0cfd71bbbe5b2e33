use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::{RecipientStore, StoreError};
use crate::domain::recipient::RecipientRecord;
use crate::domain::recipient_email::RecipientEmail;

#[derive(Clone)]
pub struct PgRecipientStore {
    db_pool: PgPool,
}

impl PgRecipientStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

const UPSERT_RECIPIENT: &str = r#"
    INSERT INTO recipients (id, email, expiry_date, created_on, is_deleted)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (id) DO UPDATE
    SET email = EXCLUDED.email,
        expiry_date = EXCLUDED.expiry_date,
        created_on = EXCLUDED.created_on,
        is_deleted = recipients.is_deleted OR EXCLUDED.is_deleted
"#;

fn recipient_from_row(row: PgRow) -> Result<RecipientRecord, StoreError> {
    let id: Uuid = row.try_get("id")?;
    let email = RecipientEmail::parse(row.try_get("email")?)
        .map_err(|err| StoreError::InvalidRecord(id, err))?;

    Ok(RecipientRecord {
        id,
        email,
        expiry_date: row.try_get("expiry_date")?,
        created_on: row.try_get("created_on")?,
        is_deleted: row.try_get("is_deleted")?,
    })
}

#[async_trait]
impl RecipientStore for PgRecipientStore {
    #[tracing::instrument(
        name = "Upsert a recipient into the database",
        skip(self, record),
        fields(recipient_id = %record.id)
    )]
    async fn upsert(&self, record: &RecipientRecord) -> Result<(), StoreError> {
        sqlx::query(UPSERT_RECIPIENT)
            .bind(record.id)
            .bind(record.email.as_ref())
            .bind(record.expiry_date)
            .bind(record.created_on)
            .bind(record.is_deleted)
            .execute(&self.db_pool)
            .await
            .map_err(|err| {
                tracing::error!("Failed to execute query: {:?}", err);
                err
            })?;

        Ok(())
    }

    #[tracing::instrument(
        name = "Enroll or extend a recipient in the database",
        skip(self, candidate),
        fields(recipient_email = %candidate.email)
    )]
    async fn enroll_or_extend(
        &self,
        candidate: &RecipientRecord,
    ) -> Result<RecipientRecord, StoreError> {
        let mut transaction = self.db_pool.begin().await?;

        // Serializes enrollments of the same address until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(candidate.email.as_ref())
            .execute(&mut transaction)
            .await?;

        let existing = sqlx::query(
            r#"
            SELECT id, email, expiry_date, created_on, is_deleted
            FROM recipients
            WHERE email = $1 AND expiry_date > $2 AND is_deleted = false
            ORDER BY expiry_date DESC
            LIMIT 1
            "#,
        )
        .bind(candidate.email.as_ref())
        .bind(candidate.created_on)
        .fetch_optional(&mut transaction)
        .await?;

        let record = match existing {
            Some(row) => RecipientRecord {
                expiry_date: candidate.expiry_date,
                ..recipient_from_row(row)?
            },
            None => candidate.clone(),
        };

        sqlx::query(UPSERT_RECIPIENT)
            .bind(record.id)
            .bind(record.email.as_ref())
            .bind(record.expiry_date)
            .bind(record.created_on)
            .bind(record.is_deleted)
            .execute(&mut transaction)
            .await
            .map_err(|err| {
                tracing::error!("Failed to execute query: {:?}", err);
                err
            })?;

        transaction.commit().await?;

        Ok(record)
    }

    #[tracing::instrument(name = "Fetch a recipient by id", skip(self))]
    async fn find(&self, id: Uuid) -> Result<Option<RecipientRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, expiry_date, created_on, is_deleted
            FROM recipients
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(recipient_from_row).transpose()
    }

    #[tracing::instrument(
        name = "Fetch the active recipient of an email address",
        skip(self, email),
        fields(recipient_email = %email)
    )]
    async fn find_active_by_email(
        &self,
        email: &RecipientEmail,
        now: DateTime<Utc>,
    ) -> Result<Option<RecipientRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, expiry_date, created_on, is_deleted
            FROM recipients
            WHERE email = $1 AND expiry_date > $2 AND is_deleted = false
            ORDER BY expiry_date DESC
            LIMIT 1
            "#,
        )
        .bind(email.as_ref())
        .bind(now)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(recipient_from_row).transpose()
    }

    #[tracing::instrument(name = "List active recipients", skip(self))]
    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<RecipientRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, expiry_date, created_on, is_deleted
            FROM recipients
            WHERE expiry_date > $1 AND is_deleted = false
            "#,
        )
        .bind(now)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            err
        })?;

        rows.into_iter().map(recipient_from_row).collect()
    }

    #[tracing::instrument(name = "Soft delete expired recipients", skip(self))]
    async fn soft_delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE recipients
            SET is_deleted = true
            WHERE expiry_date < $1 AND is_deleted = false
            "#,
        )
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "Hard delete expired recipients", skip(self))]
    async fn hard_delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM recipients
            WHERE expiry_date < $1
            "#,
        )
        .bind(threshold)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected())
    }
}
