use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use store::repo::Result;
use store::{
    AccountId, DuesPayment, MemberAccount, MemberStore, Money, NewAccount, NewPayment, Notice,
    NoticeLevel, PaymentStatus, PortalOptions, Profile, Role, StoreError, StoredNotice,
};

/// [`MemberStore`] backed by PostgreSQL.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: i64,
    login: String,
    email: String,
    password_hash: String,
    display_name: String,
    roles: Vec<String>,
    hide_admin_bar: bool,
    profile: Json<Profile>,
    registered_at: DateTime<Utc>,
}

impl From<AccountRow> for MemberAccount {
    fn from(row: AccountRow) -> Self {
        MemberAccount {
            id: row.id as AccountId,
            login: row.login,
            email: row.email,
            password_hash: row.password_hash,
            display_name: row.display_name,
            roles: row.roles.into_iter().collect(),
            hide_admin_bar: row.hide_admin_bar,
            profile: row.profile.0,
            registered_at: row.registered_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: i64,
    account_id: i64,
    title: String,
    slug: String,
    status: String,
    amount_cents: i64,
    member_type: String,
    card_type: String,
    card_masked: String,
    card_exp_month: i32,
    card_exp_year: i32,
    cc_name: String,
    reference: String,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for DuesPayment {
    fn from(row: PaymentRow) -> Self {
        DuesPayment {
            id: row.id as u64,
            account_id: row.account_id as AccountId,
            title: row.title,
            slug: row.slug,
            status: PaymentStatus::parse(&row.status).unwrap_or_default(),
            amount: Money(row.amount_cents.max(0) as u64),
            member_type: row.member_type,
            card_type: row.card_type,
            card_masked: row.card_masked,
            card_exp_month: row.card_exp_month.max(0) as u32,
            card_exp_year: row.card_exp_year,
            cc_name: row.cc_name,
            reference: row.reference,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct NoticeRow {
    id: i64,
    level: String,
    message: String,
    standing: bool,
    consumed: bool,
}

impl From<NoticeRow> for StoredNotice {
    fn from(row: NoticeRow) -> Self {
        StoredNotice {
            id: row.id as u64,
            notice: Notice {
                level: NoticeLevel::parse(&row.level).unwrap_or(NoticeLevel::Warning),
                message: row.message,
                standing: row.standing,
            },
            consumed: row.consumed,
        }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map a unique-index violation on `accounts` to the field that collided.
fn account_conflict(e: sqlx::Error, login: &str, email: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            if db.constraint().is_some_and(|c| c.contains("login")) {
                StoreError::Duplicate(format!("login {}", login))
            } else {
                StoreError::Duplicate(format!("email {}", email))
            }
        }
        _ => backend(e),
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, login, email, password_hash, display_name, roles, hide_admin_bar, profile, registered_at";

const PAYMENT_COLUMNS: &str = "id, account_id, title, slug, status, amount_cents, member_type, \
     card_type, card_masked, card_exp_month, card_exp_year, cc_name, reference, created_at";

impl MemberStore for PgStore {
    async fn account(&self, id: AccountId) -> Result<Option<MemberAccount>> {
        let row: Option<AccountRow> =
            sqlx::query_as(&format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS))
                .bind(id as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        Ok(row.map(Into::into))
    }

    async fn account_by_login(&self, login: &str) -> Result<Option<MemberAccount>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE LOWER(login) = LOWER($1)",
            ACCOUNT_COLUMNS
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Into::into))
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<MemberAccount>> {
        if email.is_empty() {
            return Ok(None);
        }
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE email <> '' AND LOWER(email) = LOWER($1)",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Into::into))
    }

    async fn accounts(&self) -> Result<Vec<MemberAccount>> {
        let rows: Vec<AccountRow> =
            sqlx::query_as(&format!("SELECT {} FROM accounts ORDER BY id", ACCOUNT_COLUMNS))
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_account(&self, account: NewAccount) -> Result<MemberAccount> {
        let row: AccountRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO accounts (login, email, password_hash, display_name, roles, hide_admin_bar, profile)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(&account.login)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.display_name)
        .bind(account.roles.iter().cloned().collect::<Vec<String>>())
        .bind(account.hide_admin_bar)
        .bind(Json(&account.profile))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| account_conflict(e, &account.login, &account.email))?;
        Ok(row.into())
    }

    async fn update_account(&self, account: &MemberAccount) -> Result<()> {
        let done = sqlx::query(
            r#"
            UPDATE accounts
            SET login = $2, email = $3, password_hash = $4, display_name = $5,
                roles = $6, hide_admin_bar = $7, profile = $8
            WHERE id = $1
            "#,
        )
        .bind(account.id as i64)
        .bind(&account.login)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.display_name)
        .bind(account.roles.iter().cloned().collect::<Vec<String>>())
        .bind(account.hide_admin_bar)
        .bind(Json(&account.profile))
        .execute(&self.pool)
        .await
        .map_err(|e| account_conflict(e, &account.login, &account.email))?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("account {}", account.id)));
        }
        Ok(())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<DuesPayment> {
        let row: PaymentRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO payments (account_id, amount_cents, member_type, card_type, card_masked,
                                  card_exp_month, card_exp_year, cc_name, reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(payment.account_id as i64)
        .bind(payment.amount.cents() as i64)
        .bind(&payment.member_type)
        .bind(&payment.card_type)
        .bind(&payment.card_masked)
        .bind(payment.card_exp_month as i32)
        .bind(payment.card_exp_year)
        .bind(&payment.cc_name)
        .bind(&payment.reference)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::NotFound(format!("account {}", payment.account_id))
            }
            _ => backend(e),
        })?;
        Ok(row.into())
    }

    async fn update_payment(&self, payment: &DuesPayment) -> Result<()> {
        let done = sqlx::query(
            "UPDATE payments SET title = $2, slug = $3, status = $4, reference = $5 WHERE id = $1",
        )
        .bind(payment.id as i64)
        .bind(&payment.title)
        .bind(&payment.slug)
        .bind(payment.status.as_str())
        .bind(&payment.reference)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("payment {}", payment.id)));
        }
        Ok(())
    }

    async fn payments_for(&self, account: AccountId) -> Result<Vec<DuesPayment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE account_id = $1 ORDER BY id",
            PAYMENT_COLUMNS
        ))
        .bind(account as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn roles(&self) -> Result<Vec<Role>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT slug, label FROM roles ORDER BY slug")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|(slug, label)| Role { slug, label })
            .collect())
    }

    async fn replace_roles(&self, prefix: &str, roles: Vec<Role>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query("DELETE FROM roles WHERE LEFT(slug, LENGTH($1)) = $1")
            .bind(prefix)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        for role in roles {
            sqlx::query(
                "INSERT INTO roles (slug, label) VALUES ($1, $2)
                 ON CONFLICT (slug) DO UPDATE SET label = EXCLUDED.label",
            )
            .bind(role.slug)
            .bind(role.label)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)
    }

    async fn load_options(&self) -> Result<Option<PortalOptions>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT document FROM portal_options WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        row.map(|(document,)| {
            PortalOptions::from_toml(&document).map_err(|e| StoreError::Options(e.to_string()))
        })
        .transpose()
    }

    async fn save_options(&self, options: &PortalOptions) -> Result<()> {
        let document = options
            .to_toml()
            .map_err(|e| StoreError::Options(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO portal_options (id, document) VALUES (1, $1)
            ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document, updated_at = NOW()
            "#,
        )
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn push_notice(&self, notice: Notice) -> Result<u64> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO notices (level, message, standing) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(notice.level.as_str())
        .bind(&notice.message)
        .bind(notice.standing)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(id as u64)
    }

    async fn notices(&self) -> Result<Vec<StoredNotice>> {
        let rows: Vec<NoticeRow> = sqlx::query_as(
            "SELECT id, level, message, standing, consumed FROM notices WHERE NOT consumed ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_consumed(&self, ids: &[u64]) -> Result<()> {
        let ids: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
        sqlx::query("UPDATE notices SET consumed = TRUE WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM portal_values WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(|(value,)| value))
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO portal_values (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_row_conversion() {
        let row = PaymentRow {
            id: 7,
            account_id: 3,
            title: "Payment #7".into(),
            slug: "payment-7".into(),
            status: "private".into(),
            amount_cents: 90000,
            member_type: "Contractor".into(),
            card_type: "visa".into(),
            card_masked: "************1111".into(),
            card_exp_month: 12,
            card_exp_year: 2030,
            cc_name: "Jane Smith".into(),
            reference: "ch_1".into(),
            created_at: Utc::now(),
        };
        let payment = DuesPayment::from(row);
        assert_eq!(payment.status, PaymentStatus::Private);
        assert_eq!(payment.amount, Money::from_dollars(900));
        assert_eq!(payment.card_exp_month, 12);
    }

    #[test]
    fn test_unknown_notice_level_reads_as_warning() {
        let notice = StoredNotice::from(NoticeRow {
            id: 1,
            level: "info".into(),
            message: "Imported.".into(),
            standing: false,
            consumed: false,
        });
        assert_eq!(notice.notice.level, NoticeLevel::Warning);
    }
}
