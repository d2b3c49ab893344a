//! Citizen and officer accounts

use chrono::Utc;
use sqlx::{sqlite::SqlitePool, FromRow};

use super::{fmt_ts, parse_ts};
use crate::domain::{Citizen, NewCitizen, NewOfficer, Officer, OfficerId, UserId};
use crate::infra::{DeskError, Result};

/// SQLite-backed account store
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn email_registered(&self, email: &str) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 > 0)
    }

    /// Create a citizen; fails with `Conflict` when the email is taken.
    pub async fn create_citizen(&self, citizen: &NewCitizen, password_hash: &str) -> Result<UserId> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, area, state, phone_number, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&citizen.name)
        .bind(&citizen.email)
        .bind(password_hash)
        .bind(&citizen.area)
        .bind(&citizen.state)
        .bind(&citizen.phone_number)
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "email already registered"))?;

        Ok(UserId(result.last_insert_rowid()))
    }

    pub async fn citizen(&self, id: UserId) -> Result<Option<Citizen>> {
        let row = sqlx::query_as::<_, CitizenRow>(
            r#"
            SELECT id, name, email, password_hash, area, state, phone_number, created_at
            FROM users WHERE id = ?
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_citizen().map(|(c, _)| c)).transpose()
    }

    /// Citizen and stored password hash for a login attempt.
    pub async fn citizen_credentials(&self, email: &str) -> Result<Option<(Citizen, String)>> {
        let row = sqlx::query_as::<_, CitizenRow>(
            r#"
            SELECT id, name, email, password_hash, area, state, phone_number, created_at
            FROM users WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CitizenRow::into_citizen).transpose()
    }

    /// Create an officer; fails with `Conflict` when the id or email is taken.
    pub async fn create_officer(&self, officer: &NewOfficer, password_hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO officers (off_id, name, email, password_hash, ward_id, phone_number, designation, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(officer.off_id.as_str())
        .bind(&officer.name)
        .bind(&officer.email)
        .bind(password_hash)
        .bind(officer.ward_id)
        .bind(&officer.phone_number)
        .bind(&officer.designation)
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "officer with given email or id already exists"))?;

        Ok(())
    }

    pub async fn officer(&self, off_id: &OfficerId) -> Result<Option<Officer>> {
        Ok(self
            .officer_credentials(off_id)
            .await?
            .map(|(officer, _)| officer))
    }

    pub async fn officer_credentials(&self, off_id: &OfficerId) -> Result<Option<(Officer, String)>> {
        let row = sqlx::query_as::<_, OfficerRow>(
            r#"
            SELECT off_id, name, email, password_hash, ward_id, phone_number, designation, created_at
            FROM officers WHERE off_id = ?
            "#,
        )
        .bind(off_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OfficerRow::into_officer).transpose()
    }

    /// Officer to auto-assign for a ward (lowest id first).
    pub async fn officer_for_ward(&self, ward_id: i64) -> Result<Option<OfficerId>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT off_id FROM officers WHERE ward_id = ? ORDER BY off_id LIMIT 1")
                .bind(ward_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| OfficerId(r.0)))
    }

    /// `(off_id, name)` of every officer.
    pub async fn all_officers(&self) -> Result<Vec<(OfficerId, String)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT off_id, name FROM officers ORDER BY off_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id, name)| (OfficerId(id), name)).collect())
    }

    /// Display name for a citizen id, used on comment threads.
    pub async fn citizen_name(&self, id: UserId) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }
}

pub(crate) fn unique_violation(err: sqlx::Error, message: &str) -> DeskError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DeskError::Conflict(message.to_string())
        }
        _ => DeskError::Database(err),
    }
}

#[derive(Debug, FromRow)]
struct CitizenRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    area: String,
    state: String,
    phone_number: Option<String>,
    created_at: String,
}

impl CitizenRow {
    fn into_citizen(self) -> Result<(Citizen, String)> {
        let created_at = parse_ts("created_at", &self.created_at)?;
        Ok((
            Citizen {
                id: UserId(self.id),
                name: self.name,
                email: self.email,
                area: self.area,
                state: self.state,
                phone_number: self.phone_number,
                created_at,
            },
            self.password_hash,
        ))
    }
}

#[derive(Debug, FromRow)]
struct OfficerRow {
    off_id: String,
    name: String,
    email: String,
    password_hash: String,
    ward_id: i64,
    phone_number: String,
    designation: String,
    created_at: String,
}

impl OfficerRow {
    fn into_officer(self) -> Result<(Officer, String)> {
        let created_at = parse_ts("created_at", &self.created_at)?;
        Ok((
            Officer {
                off_id: OfficerId(self.off_id),
                name: self.name,
                email: self.email,
                ward_id: self.ward_id,
                phone_number: self.phone_number,
                designation: self.designation,
                created_at,
            },
            self.password_hash,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Polygon, Ward};
    use crate::infra::sqlite::{connect_in_memory, SqliteCatalog};

    fn new_citizen(email: &str) -> NewCitizen {
        NewCitizen {
            name: "Asha".into(),
            email: email.into(),
            area: "Indiranagar".into(),
            state: "KA".into(),
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn citizen_round_trip_and_duplicate_email() {
        let pool = connect_in_memory().await.unwrap();
        let store = SqliteAccountStore::new(pool);

        let id = store.create_citizen(&new_citizen("a@x.in"), "hash").await.unwrap();
        assert!(store.email_registered("a@x.in").await.unwrap());

        let (citizen, hash) = store.citizen_credentials("a@x.in").await.unwrap().unwrap();
        assert_eq!(citizen.id, id);
        assert_eq!(hash, "hash");

        let err = store.create_citizen(&new_citizen("a@x.in"), "hash").await.unwrap_err();
        assert!(matches!(err, DeskError::Conflict(_)));
    }

    #[tokio::test]
    async fn officer_assignment_by_ward() {
        let pool = connect_in_memory().await.unwrap();
        let catalog = SqliteCatalog::new(pool.clone());
        catalog
            .upsert_ward(&Ward {
                ward_id: 7,
                name: "Ward 7".into(),
                polygon: Polygon(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]),
            })
            .await
            .unwrap();

        let store = SqliteAccountStore::new(pool);
        assert!(store.officer_for_ward(7).await.unwrap().is_none());

        store
            .create_officer(
                &NewOfficer {
                    off_id: OfficerId::new("OFF7"),
                    name: "Ravi".into(),
                    email: "ravi@city.gov".into(),
                    ward_id: 7,
                    phone_number: "100".into(),
                    designation: "ward".into(),
                },
                "hash",
            )
            .await
            .unwrap();

        assert_eq!(
            store.officer_for_ward(7).await.unwrap(),
            Some(OfficerId::new("OFF7"))
        );
        assert_eq!(store.all_officers().await.unwrap().len(), 1);
    }
}
