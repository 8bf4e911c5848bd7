// src/storage/postgres.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::domain::{
    Applicant, AuditEntry, AuditQuery, AuditRecord, AuditSummary, ConditionKey, EventType, Gender, Identity,
    NationalId, NewRule, NidStatus, Rule, RuleFilter, RuleId, RuleUpdate, SubjectId,
};

use super::memory::start_of_day_utc;
use super::traits::{AuditLog, IdentityDirectory, LoanHistory, RuleStore};

const RULE_COLUMNS: &str = "id, name, description, condition_key, is_active, created_at";

/// PostgreSQL implementation of the storage traits.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Create a new PostgresStorage instance with a connection pool.
    pub async fn connect(
        database_url: &str,
        min_connections: u32,
        max_connections: u32,
    ) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn rule_from_row(row: &PgRow) -> Rule {
    let condition_key: String = row.get("condition_key");
    Rule {
        id: RuleId(row.get("id")),
        name: row.get("name"),
        description: row.get("description"),
        condition_key: ConditionKey::parse(&condition_key),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

fn applicant_from_row(row: &PgRow) -> Applicant {
    let gender: String = row.get("gender");
    let national_id: Option<String> = row.get("national_id");
    Applicant {
        subject_id: SubjectId(row.get("subject_id")),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        gender: Gender::new(gender),
        phone_number: row.get("phone_number"),
        tin_number: row.get("tin_number"),
        national_id: national_id.map(NationalId::new),
    }
}

fn audit_from_row(row: &PgRow) -> anyhow::Result<AuditEntry> {
    let event_type: String = row.get("event_type");
    let event_type = EventType::parse(&event_type)
        .ok_or_else(|| anyhow::anyhow!("unknown audit event type: {}", event_type))?;

    Ok(AuditEntry {
        id: row.get("id"),
        subject_id: SubjectId(row.get("subject_id")),
        event_type,
        amount: row.get("amount"),
        source_address: row.get("source_address"),
        is_fraud: row.get("is_fraud"),
        reason: row.get("reason"),
        risk_score: row.get("risk_score"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl RuleStore for PostgresStorage {
    async fn list_rules(&self, filter: &RuleFilter) -> anyhow::Result<Vec<Rule>> {
        let sql = format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM rules
            WHERE ($1::boolean IS NULL OR is_active = $1)
              AND ($2::text IS NULL OR condition_key = $2)
            ORDER BY id
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(filter.active)
            .bind(filter.condition_key.as_ref().map(|k| k.as_str().to_string()))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(rule_from_row).collect())
    }

    async fn get_rule(&self, id: RuleId) -> anyhow::Result<Option<Rule>> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM rules WHERE id = $1");

        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(rule_from_row))
    }

    async fn create_rule(&self, rule: &NewRule) -> anyhow::Result<Rule> {
        let sql = format!(
            r#"
            INSERT INTO rules (name, description, condition_key, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING {RULE_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&rule.name)
            .bind(&rule.description)
            .bind(rule.condition_key.as_str())
            .bind(rule.is_active)
            .fetch_one(&self.pool)
            .await?;

        Ok(rule_from_row(&row))
    }

    async fn update_rule(&self, id: RuleId, update: &RuleUpdate) -> anyhow::Result<Option<Rule>> {
        let sql = format!(
            r#"
            UPDATE rules
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                condition_key = COALESCE($4, condition_key),
                is_active = COALESCE($5, is_active)
            WHERE id = $1
            RETURNING {RULE_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(id.0)
            .bind(update.name.as_deref())
            .bind(update.description.as_deref())
            .bind(update.condition_key.as_ref().map(|k| k.as_str().to_string()))
            .bind(update.is_active)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(rule_from_row))
    }

    async fn delete_rule(&self, id: RuleId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM rules WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn toggle_rule(&self, id: RuleId) -> anyhow::Result<Option<Rule>> {
        let sql = format!(
            r#"
            UPDATE rules
            SET is_active = NOT is_active
            WHERE id = $1
            RETURNING {RULE_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(rule_from_row))
    }

    async fn count_rules(&self) -> anyhow::Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rules")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }
}

#[async_trait]
impl IdentityDirectory for PostgresStorage {
    async fn get_identity(&self, nid: &NationalId) -> anyhow::Result<Option<Identity>> {
        let row = sqlx::query(
            r#"
            SELECT subject_id, name, national_id, date_of_birth, gender, nid_status
            FROM identities
            WHERE national_id = $1
            "#,
        )
        .bind(nid.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let national_id: String = row.get("national_id");
        let gender: Option<String> = row.get("gender");
        let nid_status: String = row.get("nid_status");

        Ok(Some(Identity {
            subject_id: SubjectId(row.get("subject_id")),
            name: row.get("name"),
            national_id: NationalId::new(national_id),
            date_of_birth: row.get("date_of_birth"),
            gender: gender.map(Gender::new),
            nid_status: NidStatus::parse(&nid_status),
        }))
    }

    async fn is_blacklisted(&self, nid: &NationalId) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM blacklist
                WHERE national_id = $1
            )
            "#,
        )
        .bind(nid.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn get_applicant(&self, subject_id: SubjectId) -> anyhow::Result<Option<Applicant>> {
        let row = sqlx::query(
            r#"
            SELECT subject_id, first_name, last_name, gender, phone_number, tin_number, national_id
            FROM applicants
            WHERE subject_id = $1
            "#,
        )
        .bind(subject_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(applicant_from_row))
    }

    async fn applicants_by_gender(&self, gender: &Gender) -> anyhow::Result<Vec<Applicant>> {
        let rows = sqlx::query(
            r#"
            SELECT subject_id, first_name, last_name, gender, phone_number, tin_number, national_id
            FROM applicants
            WHERE UPPER(gender) = $1
            ORDER BY subject_id
            "#,
        )
        .bind(gender.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(applicant_from_row).collect())
    }
}

#[async_trait]
impl LoanHistory for PostgresStorage {
    async fn has_active_loan(&self, subject_id: SubjectId) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM loans
                WHERE subject_id = $1
                  AND status IN ('active', 'approved')
                  AND is_active = true
            )
            "#,
        )
        .bind(subject_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn count_applications_today(&self, subject_id: SubjectId) -> anyhow::Result<u32> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM loan_applications
            WHERE subject_id = $1
              AND application_date >= $2
            "#,
        )
        .bind(subject_id.0)
        .bind(start_of_day_utc(Utc::now()))
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u32)
    }

    async fn applications_within_hours(
        &self,
        subject_id: SubjectId,
        hours: i64,
    ) -> anyhow::Result<Vec<DateTime<Utc>>> {
        let dates = sqlx::query_scalar(
            r#"
            SELECT application_date
            FROM loan_applications
            WHERE subject_id = $1
              AND application_date >= $2
            ORDER BY application_date DESC
            "#,
        )
        .bind(subject_id.0)
        .bind(Utc::now() - Duration::hours(hours))
        .fetch_all(&self.pool)
        .await?;

        Ok(dates)
    }
}

#[async_trait]
impl AuditLog for PostgresStorage {
    async fn append(&self, record: &AuditRecord) -> anyhow::Result<AuditEntry> {
        let entry = AuditEntry::from_record(record.clone());

        sqlx::query(
            r#"
            INSERT INTO audit_entries (
                id,
                subject_id,
                event_type,
                amount,
                source_address,
                is_fraud,
                reason,
                risk_score,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.subject_id.0)
        .bind(entry.event_type.as_str())
        .bind(entry.amount)
        .bind(&entry.source_address)
        .bind(entry.is_fraud)
        .bind(&entry.reason)
        .bind(entry.risk_score)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn list(&self, query: &AuditQuery) -> anyhow::Result<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, subject_id, event_type, amount, source_address,
                   is_fraud, reason, risk_score, created_at
            FROM audit_entries
            WHERE ($1::bigint IS NULL OR subject_id = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(query.subject_id.map(|s| s.0))
        .bind(query.limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(audit_from_row).collect()
    }

    async fn summary(&self) -> anyhow::Result<AuditSummary> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE is_fraud) AS fraud
            FROM audit_entries
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.try_get("total")?;
        let fraud: i64 = row.try_get("fraud")?;

        Ok(AuditSummary {
            total: total.max(0) as u64,
            fraud: fraud.max(0) as u64,
        })
    }
}
