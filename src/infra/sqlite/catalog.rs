//! Reference data: issue types, SLA rules and ward boundaries

use chrono::Duration;
use sqlx::sqlite::SqlitePool;

use crate::domain::{IssueType, Polygon, PriorityLevel, Ward};
use crate::infra::{DeskError, Result};

pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn issue_type(&self, name: &str) -> Result<Option<IssueType>> {
        let row: Option<(i64, String, i64)> =
            sqlx::query_as("SELECT id, name, base_severity FROM issue_types WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, name, base_severity)| IssueType {
            id,
            name,
            base_severity,
        }))
    }

    pub async fn issue_types(&self) -> Result<Vec<IssueType>> {
        let rows: Vec<(i64, String, i64)> =
            sqlx::query_as("SELECT id, name, base_severity FROM issue_types ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name, base_severity)| IssueType {
                id,
                name,
                base_severity,
            })
            .collect())
    }

    pub async fn upsert_issue_type(&self, name: &str, base_severity: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO issue_types (name, base_severity) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET base_severity = excluded.base_severity
            "#,
        )
        .bind(name)
        .bind(base_severity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Resolution deadline for an issue type at a priority level.
    pub async fn sla_deadline(&self, issue_type: &str, level: PriorityLevel) -> Result<Option<Duration>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT deadline_hours FROM sla_rules WHERE issue_type = ? AND priority_level = ?",
        )
        .bind(issue_type)
        .bind(level.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Duration::hours(r.0)))
    }

    pub async fn upsert_sla_rule(&self, issue_type: &str, level: PriorityLevel, deadline_hours: i64) -> Result<()> {
        if deadline_hours <= 0 {
            return Err(DeskError::validation("deadline_hours must be positive"));
        }
        sqlx::query(
            r#"
            INSERT INTO sla_rules (issue_type, priority_level, deadline_hours) VALUES (?, ?, ?)
            ON CONFLICT(issue_type, priority_level) DO UPDATE SET deadline_hours = excluded.deadline_hours
            "#,
        )
        .bind(issue_type)
        .bind(level.as_str())
        .bind(deadline_hours)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn wards(&self) -> Result<Vec<Ward>> {
        let rows: Vec<(i64, String, String)> =
            sqlx::query_as("SELECT ward_id, name, polygon FROM wards ORDER BY ward_id")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(ward_id, name, polygon)| {
                let polygon: Polygon = serde_json::from_str(&polygon).map_err(|e| {
                    DeskError::Internal(format!("invalid polygon for ward {ward_id}: {e}"))
                })?;
                Ok(Ward {
                    ward_id,
                    name,
                    polygon,
                })
            })
            .collect()
    }

    pub async fn upsert_ward(&self, ward: &Ward) -> Result<()> {
        if ward.polygon.0.len() < 3 {
            return Err(DeskError::validation("ward polygon needs at least three vertices"));
        }
        let polygon = serde_json::to_string(&ward.polygon)
            .map_err(|e| DeskError::Internal(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO wards (ward_id, name, polygon) VALUES (?, ?, ?)
            ON CONFLICT(ward_id) DO UPDATE SET name = excluded.name, polygon = excluded.polygon
            "#,
        )
        .bind(ward.ward_id)
        .bind(&ward.name)
        .bind(polygon)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::sqlite::connect_in_memory;

    #[tokio::test]
    async fn sla_lookup_by_type_and_level() {
        let catalog = SqliteCatalog::new(connect_in_memory().await.unwrap());
        catalog
            .upsert_sla_rule("pothole", PriorityLevel::Medium, 72)
            .await
            .unwrap();

        assert_eq!(
            catalog.sla_deadline("pothole", PriorityLevel::Medium).await.unwrap(),
            Some(Duration::hours(72))
        );
        assert!(catalog
            .sla_deadline("pothole", PriorityLevel::High)
            .await
            .unwrap()
            .is_none());
        assert!(catalog
            .upsert_sla_rule("pothole", PriorityLevel::Low, 0)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn wards_store_polygons() {
        let catalog = SqliteCatalog::new(connect_in_memory().await.unwrap());
        let ward = Ward {
            ward_id: 1,
            name: "Central".into(),
            polygon: Polygon(vec![[77.5, 12.8], [77.7, 12.8], [77.7, 13.0], [77.5, 13.0]]),
        };
        catalog.upsert_ward(&ward).await.unwrap();
        assert_eq!(catalog.wards().await.unwrap(), vec![ward]);
    }

    #[tokio::test]
    async fn issue_type_upsert_updates_severity() {
        let catalog = SqliteCatalog::new(connect_in_memory().await.unwrap());
        catalog.upsert_issue_type("pothole", 10).await.unwrap();
        catalog.upsert_issue_type("pothole", 15).await.unwrap();
        assert_eq!(
            catalog.issue_type("pothole").await.unwrap().unwrap().base_severity,
            15
        );
        assert_eq!(catalog.issue_types().await.unwrap().len(), 1);
    }
}
