//! Database repository for the mission lifecycle and the surrounding records.
//!
//! Every state change is a single conditional statement, so concurrent
//! requests cannot lose updates.

use std::collections::{BTreeSet, HashMap};

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::auth::{generate_pin, DeviceId, ACCESS_PIN_DIGITS, ORGANIZER_PIN_DIGITS};
use crate::errors::AppError;
use crate::models::{
    AdminGrant, CommunityUpdate, Coordinates, Donation, DonationStatus, DonationType,
    FieldMission, FieldMissionStatus, Incident, Mission, MissionCategory, MissionPriority,
    MissionStatus, NewDispatch, NewDonation, NewIncident, NewMission, NewUpdate, Statistics,
    UpdateType,
};

/// Attempts at drawing an unused access PIN before giving up.
const ACCESS_PIN_ATTEMPTS: usize = 8;

/// Attempts at an optimistic compare-and-set before reporting a conflict.
const CAS_ATTEMPTS: usize = 3;

/// Demo field mission inserted when `RESQ_SEED_DEMO` is set.
pub const DEMO_FIELD_MISSION_ID: &str = "mission-abc-123";
pub const DEMO_FIELD_MISSION_PIN: &str = "123456";

const MISSION_COLUMNS: &str = "id, title, location, description, category, status, people_needed, \
     latitude, longitude, image_url, organizer_device_id, organizer_pin, created_by, created_at, version";

const FIELD_MISSION_COLUMNS: &str =
    "id, incident_id, assigned_team, pin, status, latitude, longitude, emergency_type, created_at";

const DONATION_COLUMNS: &str =
    "id, type, amount, description, donor_name, mission_id, receipt_url, status, created_at";

/// Fixed-width UTC timestamp so lexical order matches time order.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== MISSION OPERATIONS ====================

    /// List all missions, newest first.
    pub async fn list_missions(&self) -> Result<Vec<Mission>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM missions ORDER BY created_at DESC, rowid DESC",
            MISSION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut volunteers = self.all_volunteers().await?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id")?;
                let set = volunteers.remove(&id).unwrap_or_default();
                mission_from_row(row, set)
            })
            .collect()
    }

    /// Get a mission by ID.
    pub async fn get_mission(&self, id: &str) -> Result<Option<Mission>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM missions WHERE id = ?",
            MISSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let volunteers = self.volunteers_of(id).await?;
        mission_from_row(&row, volunteers).map(Some)
    }

    async fn require_mission(&self, id: &str) -> Result<Mission, AppError> {
        self.get_mission(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", id)))
    }

    async fn volunteers_of(&self, mission_id: &str) -> Result<BTreeSet<String>, AppError> {
        let rows = sqlx::query("SELECT device_id FROM mission_volunteers WHERE mission_id = ?")
            .bind(mission_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("device_id").map_err(AppError::from))
            .collect()
    }

    async fn all_volunteers(&self) -> Result<HashMap<String, BTreeSet<String>>, AppError> {
        let rows = sqlx::query("SELECT mission_id, device_id FROM mission_volunteers")
            .fetch_all(&self.pool)
            .await?;

        let mut volunteers: HashMap<String, BTreeSet<String>> = HashMap::new();
        for row in rows {
            let mission_id: String = row.try_get("mission_id")?;
            let device_id: String = row.try_get("device_id")?;
            volunteers.entry(mission_id).or_default().insert(device_id);
        }
        Ok(volunteers)
    }

    /// Create a mission owned by `organizer`. The returned mission carries the
    /// freshly generated organizer PIN.
    pub async fn create_mission(
        &self,
        new: &NewMission,
        organizer: &DeviceId,
    ) -> Result<Mission, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();
        let organizer_pin = generate_pin(ORGANIZER_PIN_DIGITS);

        sqlx::query(
            "INSERT INTO missions (id, title, location, description, category, status, people_needed, latitude, longitude, image_url, organizer_device_id, organizer_pin, created_by, created_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)"
        )
        .bind(&id)
        .bind(&new.title)
        .bind(&new.location)
        .bind(&new.description)
        .bind(new.category.as_str())
        .bind(new.status.as_str())
        .bind(new.people_needed as i64)
        .bind(new.coordinates.map(|c| c.lat))
        .bind(new.coordinates.map(|c| c.lng))
        .bind(&new.image_url)
        .bind(organizer.as_str())
        .bind(&organizer_pin)
        .bind(&new.created_by)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Mission {
            id,
            title: new.title.clone(),
            location: new.location.clone(),
            description: new.description.clone(),
            category: new.category,
            status: new.status,
            people_needed: new.people_needed,
            volunteers: BTreeSet::new(),
            coordinates: new.coordinates,
            image_url: new.image_url.clone(),
            organizer_device_id: organizer.as_str().to_string(),
            organizer_pin,
            created_by: new.created_by.clone(),
            created_at: now,
            version: 1,
        })
    }

    /// Add `device` to the mission's volunteers.
    ///
    /// Idempotent: joining twice is not an error. Returns the mission and
    /// whether this call added the device.
    pub async fn join_mission(
        &self,
        id: &str,
        device: &DeviceId,
    ) -> Result<(Mission, bool), AppError> {
        let now = now_timestamp();

        // The status guard and the insert are one statement
        let result = sqlx::query(
            "INSERT OR IGNORE INTO mission_volunteers (mission_id, device_id, joined_at) \
             SELECT id, ?, ? FROM missions WHERE id = ? AND status != 'completed'",
        )
        .bind(device.as_str())
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let mission = self.require_mission(id).await?;
        let joined = result.rows_affected() > 0;
        if !joined {
            mission.ensure_mutable()?;
        }

        Ok((mission, joined))
    }

    /// Check admin rights over a mission.
    pub async fn authorize_admin(
        &self,
        id: &str,
        device: Option<&DeviceId>,
        pin: Option<&str>,
    ) -> Result<(Mission, AdminGrant), AppError> {
        let mission = self.require_mission(id).await?;
        let grant = mission.authorize_admin(device, pin)?;
        Ok((mission, grant))
    }

    /// Move a mission to the terminal `completed` status.
    pub async fn complete_mission(
        &self,
        id: &str,
        device: Option<&DeviceId>,
        pin: Option<&str>,
    ) -> Result<(Mission, AdminGrant), AppError> {
        let (mission, grant) = self.authorize_admin(id, device, pin).await?;
        mission.ensure_mutable()?;

        let result = sqlx::query(
            "UPDATE missions SET status = 'completed', version = version + 1 WHERE id = ? AND status != 'completed'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Completed by a concurrent request between the read and the write
            return Err(AppError::InvalidState(format!(
                "Mission {} is already completed",
                id
            )));
        }

        Ok((self.require_mission(id).await?, grant))
    }

    /// Switch a running mission between `active` and `urgent`.
    pub async fn set_mission_priority(
        &self,
        id: &str,
        device: Option<&DeviceId>,
        pin: Option<&str>,
        priority: MissionPriority,
    ) -> Result<(Mission, AdminGrant), AppError> {
        let (mission, grant) = self.authorize_admin(id, device, pin).await?;
        mission.ensure_mutable()?;

        let status = priority.status();
        if mission.status == status {
            return Ok((mission, grant));
        }

        let result = sqlx::query(
            "UPDATE missions SET status = ?, version = version + 1 WHERE id = ? AND status != 'completed'",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidState(format!(
                "Mission {} is already completed",
                id
            )));
        }

        Ok((self.require_mission(id).await?, grant))
    }

    // ==================== INCIDENT OPERATIONS ====================

    /// Store an emergency report.
    pub async fn create_incident(&self, new: &NewIncident) -> Result<Incident, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            "INSERT INTO incidents (id, latitude, longitude, emergency_type, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(new.location.lat)
        .bind(new.location.lng)
        .bind(&new.emergency_type)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Incident {
            id,
            latitude: new.location.lat,
            longitude: new.location.lng,
            emergency_type: new.emergency_type.clone(),
            created_at: now,
        })
    }

    /// Get an incident by ID.
    pub async fn get_incident(&self, id: &str) -> Result<Option<Incident>, AppError> {
        let row = sqlx::query(
            "SELECT id, latitude, longitude, emergency_type, created_at FROM incidents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(incident_from_row).transpose()
    }

    /// List incidents, newest first.
    pub async fn list_incidents(&self) -> Result<Vec<Incident>, AppError> {
        let rows = sqlx::query(
            "SELECT id, latitude, longitude, emergency_type, created_at FROM incidents ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(incident_from_row).collect()
    }

    // ==================== FIELD MISSION OPERATIONS ====================

    /// Dispatch a team to an incident under a fresh, unique access PIN.
    pub async fn create_field_mission(
        &self,
        dispatch: &NewDispatch,
    ) -> Result<FieldMission, AppError> {
        let incident = self
            .get_incident(&dispatch.incident_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Incident {} not found", dispatch.incident_id))
            })?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();
        let location = incident.coordinates();
        let status = FieldMissionStatus::Pending;

        for _ in 0..ACCESS_PIN_ATTEMPTS {
            let pin = generate_pin(ACCESS_PIN_DIGITS);

            let inserted = sqlx::query(&format!(
                "INSERT INTO field_missions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                FIELD_MISSION_COLUMNS
            ))
            .bind(&id)
            .bind(&dispatch.incident_id)
            .bind(&dispatch.assigned_team)
            .bind(&pin)
            .bind(status.as_str())
            .bind(location.lat)
            .bind(location.lng)
            .bind(&incident.emergency_type)
            .bind(&now)
            .execute(&self.pool)
            .await;

            match inserted {
                Ok(_) => {
                    return Ok(FieldMission {
                        id,
                        incident_id: Some(dispatch.incident_id.clone()),
                        assigned_team: Some(dispatch.assigned_team.clone()),
                        pin,
                        status,
                        location: Some(location),
                        emergency_type: incident.emergency_type,
                        created_at: now,
                    });
                }
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    tracing::debug!("Access PIN collision, drawing another");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal(
            "Could not allocate a unique access PIN".to_string(),
        ))
    }

    /// Exact-match lookup of a field mission by access PIN.
    pub async fn find_field_mission_by_pin(
        &self,
        pin: &str,
    ) -> Result<Option<FieldMission>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM field_missions WHERE pin = ?",
            FIELD_MISSION_COLUMNS
        ))
        .bind(pin)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(field_mission_from_row).transpose()
    }

    /// Insert the demo field mission unless it already exists.
    pub async fn seed_demo_field_mission(&self) -> Result<(), AppError> {
        let result = sqlx::query(&format!(
            "INSERT OR IGNORE INTO field_missions ({}) VALUES (?, NULL, NULL, ?, ?, ?, ?, ?, ?)",
            FIELD_MISSION_COLUMNS
        ))
        .bind(DEMO_FIELD_MISSION_ID)
        .bind(DEMO_FIELD_MISSION_PIN)
        .bind(FieldMissionStatus::Active.as_str())
        .bind(12.345_f64)
        .bind(67.890_f64)
        .bind("Fire")
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(id = DEMO_FIELD_MISSION_ID, "Seeded demo field mission");
        }
        Ok(())
    }

    // ==================== DONATION OPERATIONS ====================

    /// Record a donation. A mission reference must exist at this point.
    pub async fn create_donation(&self, new: &NewDonation) -> Result<Donation, AppError> {
        if let Some(mission_id) = &new.mission_id {
            let exists = sqlx::query("SELECT 1 FROM missions WHERE id = ?")
                .bind(mission_id)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            if !exists {
                return Err(AppError::Validation(format!(
                    "Mission {} does not exist",
                    mission_id
                )));
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();
        let status = DonationStatus::Pending;

        sqlx::query(&format!(
            "INSERT INTO donations ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            DONATION_COLUMNS
        ))
        .bind(&id)
        .bind(new.donation_type.as_str())
        .bind(new.amount)
        .bind(&new.description)
        .bind(&new.donor_name)
        .bind(&new.mission_id)
        .bind(&new.receipt_url)
        .bind(status.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Donation {
            id,
            donation_type: new.donation_type,
            amount: new.amount,
            description: new.description.clone(),
            donor_name: new.donor_name.clone(),
            mission_id: new.mission_id.clone(),
            receipt_url: new.receipt_url.clone(),
            created_at: now,
            status,
        })
    }

    /// Get a donation by ID.
    pub async fn get_donation(&self, id: &str) -> Result<Option<Donation>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM donations WHERE id = ?",
            DONATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(donation_from_row).transpose()
    }

    /// List donations, newest first, optionally for one mission.
    pub async fn list_donations(&self, mission_id: Option<&str>) -> Result<Vec<Donation>, AppError> {
        let rows = match mission_id {
            Some(mission_id) => {
                sqlx::query(&format!(
                    "SELECT {} FROM donations WHERE mission_id = ? ORDER BY created_at DESC, rowid DESC",
                    DONATION_COLUMNS
                ))
                .bind(mission_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM donations ORDER BY created_at DESC, rowid DESC",
                    DONATION_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(donation_from_row).collect()
    }

    /// Advance a donation's status. Regressions are rejected.
    pub async fn advance_donation(
        &self,
        id: &str,
        next: DonationStatus,
    ) -> Result<Donation, AppError> {
        for _ in 0..CAS_ATTEMPTS {
            let mut donation = self
                .get_donation(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Donation {} not found", id)))?;

            if !donation.status.check_transition(next)? {
                return Ok(donation);
            }

            let result = sqlx::query("UPDATE donations SET status = ? WHERE id = ? AND status = ?")
                .bind(next.as_str())
                .bind(id)
                .bind(donation.status.as_str())
                .execute(&self.pool)
                .await?;

            if result.rows_affected() > 0 {
                donation.status = next;
                return Ok(donation);
            }
        }

        Err(AppError::InvalidState(format!(
            "Donation {} was modified concurrently",
            id
        )))
    }

    // ==================== COMMUNITY UPDATE OPERATIONS ====================

    /// Post a community update.
    pub async fn create_update(&self, new: &NewUpdate) -> Result<CommunityUpdate, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            "INSERT INTO community_updates (id, title, content, author, image_url, type, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.title)
        .bind(&new.content)
        .bind(&new.author)
        .bind(&new.image_url)
        .bind(new.update_type.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(CommunityUpdate {
            id,
            title: new.title.clone(),
            content: new.content.clone(),
            author: new.author.clone(),
            image_url: new.image_url.clone(),
            update_type: new.update_type,
            created_at: now,
        })
    }

    /// Most recent community updates.
    pub async fn list_updates(&self, limit: usize) -> Result<Vec<CommunityUpdate>, AppError> {
        let rows = sqlx::query(
            "SELECT id, title, content, author, image_url, type, created_at FROM community_updates ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(update_from_row).collect()
    }

    // ==================== STATISTICS ====================

    /// Dashboard counters, computed from the current records.
    pub async fn statistics(&self) -> Result<Statistics, AppError> {
        let row = sqlx::query(
            r#"SELECT
                (SELECT COUNT(*) FROM missions WHERE status != 'completed') AS active_missions,
                (SELECT COALESCE(SUM(people_needed), 0) FROM missions WHERE status = 'completed') AS people_helped,
                (SELECT COUNT(*) FROM donations) AS donations_received,
                (SELECT COUNT(DISTINCT v.device_id)
                   FROM mission_volunteers v
                   JOIN missions m ON m.id = v.mission_id
                  WHERE m.status != 'completed') AS volunteers_active"#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(Statistics {
            active_missions: row.try_get("active_missions")?,
            people_helped: row.try_get("people_helped")?,
            donations_received: row.try_get("donations_received")?,
            volunteers_active: row.try_get("volunteers_active")?,
        })
    }
}

// Helper functions for row conversion

fn corrupt(what: &str, value: &str) -> AppError {
    AppError::Database(format!("Unknown {} {:?} in database", what, value))
}

fn coordinates_from_row(
    row: &SqliteRow,
    lat_column: &str,
    lng_column: &str,
) -> Result<Option<Coordinates>, AppError> {
    let lat: Option<f64> = row.try_get(lat_column)?;
    let lng: Option<f64> = row.try_get(lng_column)?;
    Ok(lat.zip(lng).map(|(lat, lng)| Coordinates { lat, lng }))
}

fn mission_from_row(row: &SqliteRow, volunteers: BTreeSet<String>) -> Result<Mission, AppError> {
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;
    let people_needed: i64 = row.try_get("people_needed")?;

    Ok(Mission {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        location: row.try_get("location")?,
        description: row.try_get("description")?,
        category: MissionCategory::parse(&category)
            .ok_or_else(|| corrupt("mission category", &category))?,
        status: MissionStatus::parse(&status).ok_or_else(|| corrupt("mission status", &status))?,
        people_needed: u32::try_from(people_needed)
            .map_err(|_| corrupt("people_needed", &people_needed.to_string()))?,
        volunteers,
        coordinates: coordinates_from_row(row, "latitude", "longitude")?,
        image_url: row.try_get("image_url")?,
        organizer_device_id: row.try_get("organizer_device_id")?,
        organizer_pin: row.try_get("organizer_pin")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        version: row.try_get("version")?,
    })
}

fn incident_from_row(row: &SqliteRow) -> Result<Incident, AppError> {
    Ok(Incident {
        id: row.try_get("id")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        emergency_type: row.try_get("emergency_type")?,
        created_at: row.try_get("created_at")?,
    })
}

fn field_mission_from_row(row: &SqliteRow) -> Result<FieldMission, AppError> {
    let status: String = row.try_get("status")?;
    Ok(FieldMission {
        id: row.try_get("id")?,
        incident_id: row.try_get("incident_id")?,
        assigned_team: row.try_get("assigned_team")?,
        pin: row.try_get("pin")?,
        status: FieldMissionStatus::parse(&status)
            .ok_or_else(|| corrupt("field mission status", &status))?,
        location: coordinates_from_row(row, "latitude", "longitude")?,
        emergency_type: row.try_get("emergency_type")?,
        created_at: row.try_get("created_at")?,
    })
}

fn donation_from_row(row: &SqliteRow) -> Result<Donation, AppError> {
    let donation_type: String = row.try_get("type")?;
    let status: String = row.try_get("status")?;
    Ok(Donation {
        id: row.try_get("id")?,
        donation_type: DonationType::parse(&donation_type)
            .ok_or_else(|| corrupt("donation type", &donation_type))?,
        amount: row.try_get("amount")?,
        description: row.try_get("description")?,
        donor_name: row.try_get("donor_name")?,
        mission_id: row.try_get("mission_id")?,
        receipt_url: row.try_get("receipt_url")?,
        created_at: row.try_get("created_at")?,
        status: DonationStatus::parse(&status)
            .ok_or_else(|| corrupt("donation status", &status))?,
    })
}

fn update_from_row(row: &SqliteRow) -> Result<CommunityUpdate, AppError> {
    let update_type: String = row.try_get("type")?;
    Ok(CommunityUpdate {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        author: row.try_get("author")?,
        image_url: row.try_get("image_url")?,
        update_type: UpdateType::parse(&update_type)
            .ok_or_else(|| corrupt("update type", &update_type))?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn test_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    fn device(id: &str) -> DeviceId {
        DeviceId::parse(id).unwrap()
    }

    fn new_mission() -> NewMission {
        NewMission {
            title: "Emergency Food Distribution".to_string(),
            location: "San Roque".to_string(),
            description: "Relief goods".to_string(),
            category: MissionCategory::Food,
            people_needed: 2,
            status: MissionStatus::Active,
            created_by: "Maria".to_string(),
            coordinates: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_mission() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_mission(&new_mission(), &device("organizer"))
            .await
            .unwrap();

        assert_eq!(created.organizer_pin.len(), ORGANIZER_PIN_DIGITS);
        assert!(created.volunteers.is_empty());

        let fetched = repo.get_mission(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.organizer_pin, created.organizer_pin);
        assert_eq!(fetched.organizer_device_id, "organizer");
        assert_eq!(fetched.status, MissionStatus::Active);
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_allows_oversubscription() {
        let (repo, _dir) = test_repo().await;
        let mission = repo
            .create_mission(&new_mission(), &device("organizer"))
            .await
            .unwrap();

        let (m, joined) = repo.join_mission(&mission.id, &device("a")).await.unwrap();
        assert!(joined);
        assert_eq!(m.current_volunteers(), 1);

        let (m, joined) = repo.join_mission(&mission.id, &device("a")).await.unwrap();
        assert!(!joined);
        assert_eq!(m.current_volunteers(), 1);

        repo.join_mission(&mission.id, &device("b")).await.unwrap();
        let (m, _) = repo.join_mission(&mission.id, &device("c")).await.unwrap();
        assert_eq!(m.current_volunteers(), 3);
        assert!(m.current_volunteers() > m.people_needed as usize);
    }

    #[tokio::test]
    async fn test_join_unknown_mission() {
        let (repo, _dir) = test_repo().await;
        let err = repo.join_mission("nope", &device("a")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_joins_are_not_lost() {
        let (repo, _dir) = test_repo().await;
        let mission = repo
            .create_mission(&new_mission(), &device("organizer"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let repo = repo.clone();
            let id = mission.id.clone();
            handles.push(tokio::spawn(async move {
                repo.join_mission(&id, &device(&format!("device_{}", i)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mission = repo.get_mission(&mission.id).await.unwrap().unwrap();
        assert_eq!(mission.current_volunteers(), 10);
    }

    #[tokio::test]
    async fn test_completion_is_terminal() {
        let (repo, _dir) = test_repo().await;
        let mission = repo
            .create_mission(&new_mission(), &device("organizer"))
            .await
            .unwrap();
        repo.join_mission(&mission.id, &device("a")).await.unwrap();

        let (completed, grant) = repo
            .complete_mission(&mission.id, None, Some(&mission.organizer_pin))
            .await
            .unwrap();
        assert_eq!(grant, AdminGrant::Pin);
        assert_eq!(completed.status, MissionStatus::Completed);
        let version = completed.version;

        let err = repo
            .join_mission(&mission.id, &device("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        // Rejoining as an existing volunteer is rejected too
        assert!(repo.join_mission(&mission.id, &device("a")).await.is_err());

        let err = repo
            .complete_mission(&mission.id, Some(&device("organizer")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let err = repo
            .set_mission_priority(
                &mission.id,
                Some(&device("organizer")),
                None,
                MissionPriority::Urgent,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let after = repo.get_mission(&mission.id).await.unwrap().unwrap();
        assert_eq!(after.status, MissionStatus::Completed);
        assert_eq!(after.version, version);
        assert_eq!(after.current_volunteers(), 1);
    }

    #[tokio::test]
    async fn test_complete_requires_admin() {
        let (repo, _dir) = test_repo().await;
        let mission = repo
            .create_mission(&new_mission(), &device("organizer"))
            .await
            .unwrap();

        let err = repo
            .complete_mission(&mission.id, Some(&device("stranger")), Some("not-it"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let still = repo.get_mission(&mission.id).await.unwrap().unwrap();
        assert_eq!(still.status, MissionStatus::Active);
    }

    #[tokio::test]
    async fn test_priority_toggles() {
        let (repo, _dir) = test_repo().await;
        let mission = repo
            .create_mission(&new_mission(), &device("organizer"))
            .await
            .unwrap();

        let (m, _) = repo
            .set_mission_priority(
                &mission.id,
                Some(&device("organizer")),
                None,
                MissionPriority::Urgent,
            )
            .await
            .unwrap();
        assert_eq!(m.status, MissionStatus::Urgent);
        assert_eq!(m.version, 2);

        let (m, _) = repo
            .set_mission_priority(&mission.id, None, Some(&mission.organizer_pin), MissionPriority::Active)
            .await
            .unwrap();
        assert_eq!(m.status, MissionStatus::Active);
    }

    #[tokio::test]
    async fn test_field_mission_dispatch_and_lookup() {
        let (repo, _dir) = test_repo().await;
        let incident = repo
            .create_incident(&NewIncident {
                location: Coordinates {
                    lat: 14.6,
                    lng: 121.0,
                },
                emergency_type: Some("Flood".to_string()),
            })
            .await
            .unwrap();

        let dispatched = repo
            .create_field_mission(&NewDispatch {
                incident_id: incident.id.clone(),
                assigned_team: "Bravo".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(dispatched.pin.len(), ACCESS_PIN_DIGITS);
        assert_eq!(dispatched.status, FieldMissionStatus::Pending);
        assert_eq!(dispatched.emergency_type.as_deref(), Some("Flood"));

        let found = repo
            .find_field_mission_by_pin(&dispatched.pin)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, dispatched.id);
        assert_eq!(found.assigned_team.as_deref(), Some("Bravo"));

        let err = repo
            .create_field_mission(&NewDispatch {
                incident_id: "missing".to_string(),
                assigned_team: "Bravo".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let (repo, _dir) = test_repo().await;
        repo.seed_demo_field_mission().await.unwrap();
        repo.seed_demo_field_mission().await.unwrap();

        let demo = repo
            .find_field_mission_by_pin(DEMO_FIELD_MISSION_PIN)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(demo.id, DEMO_FIELD_MISSION_ID);
        assert_eq!(demo.status, FieldMissionStatus::Active);
        assert!(repo
            .find_field_mission_by_pin("12345")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_donation_status_never_regresses() {
        let (repo, _dir) = test_repo().await;
        let donation = repo
            .create_donation(&NewDonation {
                donation_type: DonationType::Money,
                amount: Some(1000.0),
                description: String::new(),
                donor_name: "Juan".to_string(),
                mission_id: None,
                receipt_url: None,
            })
            .await
            .unwrap();
        assert_eq!(donation.status, DonationStatus::Pending);

        let d = repo
            .advance_donation(&donation.id, DonationStatus::Distributed)
            .await
            .unwrap();
        assert_eq!(d.status, DonationStatus::Distributed);

        let err = repo
            .advance_donation(&donation.id, DonationStatus::Verified)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_donation_requires_existing_mission() {
        let (repo, _dir) = test_repo().await;
        let err = repo
            .create_donation(&NewDonation {
                donation_type: DonationType::Goods,
                amount: None,
                description: "Rice".to_string(),
                donor_name: "Juan".to_string(),
                mission_id: Some("ghost".to_string()),
                receipt_url: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(repo.list_donations(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_statistics() {
        let (repo, _dir) = test_repo().await;
        let first = repo
            .create_mission(&new_mission(), &device("organizer"))
            .await
            .unwrap();
        let second = repo
            .create_mission(&new_mission(), &device("organizer"))
            .await
            .unwrap();

        repo.join_mission(&first.id, &device("a")).await.unwrap();
        repo.join_mission(&second.id, &device("a")).await.unwrap();
        repo.join_mission(&second.id, &device("b")).await.unwrap();
        repo.complete_mission(&second.id, Some(&device("organizer")), None)
            .await
            .unwrap();

        let stats = repo.statistics().await.unwrap();
        assert_eq!(stats.active_missions, 1);
        assert_eq!(stats.people_helped, 2);
        assert_eq!(stats.donations_received, 0);
        assert_eq!(stats.volunteers_active, 1);
    }
}
