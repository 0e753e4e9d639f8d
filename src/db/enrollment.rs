use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::db::models::{Enrollment, NewSection, Section, User, UserSections};
use crate::db::operations::DbOperations;
use crate::error::{AppError, DatabaseError};
use crate::Result;

impl DbOperations {
    pub async fn create_section(&self, section: &NewSection) -> Result<Section> {
        let mut transaction = self.begin_transaction().await?;

        let result = sqlx::query_as::<_, Section>(
            "INSERT INTO sections (name, abbreviation) VALUES (?, ?) RETURNING id, name, abbreviation",
        )
        .bind(&section.name)
        .bind(&section.abbreviation)
        .fetch_one(&mut *transaction)
        .await;

        match result {
            Ok(section) => {
                transaction.commit().await?;
                info!("Created section {}", section.abbreviation);
                Ok(section)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }

    pub async fn get_section(&self, id: i64) -> Result<Option<Section>> {
        let section = sqlx::query_as::<_, Section>(
            "SELECT id, name, abbreviation FROM sections WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(section)
    }

    pub async fn get_section_by_abbreviation(&self, abbreviation: &str) -> Result<Option<Section>> {
        let mut conn = self.pool().acquire().await?;
        find_section_by_abbreviation(&mut conn, abbreviation).await
    }

    pub async fn list_sections(&self) -> Result<Vec<Section>> {
        let sections = sqlx::query_as::<_, Section>(
            "SELECT id, name, abbreviation FROM sections ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(sections)
    }

    pub async fn delete_section(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM sections WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::DatabaseError(DatabaseError::NotFound));
        }
        Ok(())
    }

    pub async fn get_user_sections(&self, user_id: i64) -> Result<Vec<Section>> {
        let mut conn = self.pool().acquire().await?;
        sections_of(&mut conn, user_id).await
    }

    pub async fn get_enrollments(&self, user_id: i64) -> Result<Vec<Enrollment>> {
        let enrollments = sqlx::query_as::<_, Enrollment>(
            "SELECT user_id, section_id, year FROM user_sections WHERE user_id = ? ORDER BY section_id",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(enrollments)
    }

    pub async fn read_sections(&self, user: &User) -> Result<UserSections> {
        let sections = self.get_user_sections(user.id).await?;
        Ok(UserSections {
            sections: (!sections.is_empty()).then_some(sections),
        })
    }

    /// Enroll `user` in `section` for the current school year. Returns false
    /// when the user was already enrolled.
    pub async fn add_section(&self, user: &User, section: &Section) -> Result<bool> {
        let mut transaction = self.begin_transaction().await?;
        let added = enroll(&mut transaction, user, section).await?;
        transaction.commit().await?;
        Ok(added)
    }

    /// Enroll `user` in every section named by `abbreviations`. If any
    /// abbreviation is unknown nothing is added.
    pub async fn add_sections(&self, user: &User, abbreviations: &[String]) -> Result<()> {
        let mut transaction = self.begin_transaction().await?;

        let mut sections = Vec::with_capacity(abbreviations.len());
        for abbreviation in abbreviations {
            match find_section_by_abbreviation(&mut transaction, abbreviation).await? {
                Some(section) => sections.push(section),
                None => {
                    transaction.rollback().await?;
                    return Err(AppError::NotFound(format!(
                        "section with abbreviation '{}'",
                        abbreviation
                    )));
                }
            }
        }

        for section in &sections {
            enroll(&mut transaction, user, section).await?;
        }
        transaction.commit().await?;
        Ok(())
    }

    /// Drop the user's enrollment in each named section. Either every
    /// abbreviation is one of the user's sections and all are removed, or
    /// nothing changes.
    pub async fn remove_sections(&self, user: &User, abbreviations: &[String]) -> Result<()> {
        let mut transaction = self.begin_transaction().await?;
        let mut current = sections_of(&mut transaction, user.id).await?;

        for abbreviation in abbreviations {
            // A section named twice is gone by its second mention.
            let position = current.iter().position(|s| &s.abbreviation == abbreviation);
            let Some(section) = position.map(|i| current.swap_remove(i)) else {
                transaction.rollback().await?;
                warn!("User {} is not enrolled in {}", user.uid, abbreviation);
                return Err(AppError::NotFound(format!(
                    "section with abbreviation '{}'",
                    abbreviation
                )));
            };

            sqlx::query("DELETE FROM user_sections WHERE user_id = ? AND section_id = ?")
                .bind(user.id)
                .bind(section.id)
                .execute(&mut *transaction)
                .await?;
        }

        transaction.commit().await?;
        Ok(())
    }
}

async fn enroll(conn: &mut SqliteConnection, user: &User, section: &Section) -> Result<bool> {
    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT section_id FROM user_sections WHERE user_id = ? AND section_id = ?",
    )
    .bind(user.id)
    .bind(section.id)
    .fetch_optional(&mut *conn)
    .await?;

    if existing.is_some() {
        info!("User {} already enrolled in {}", user.uid, section.abbreviation);
        return Ok(false);
    }

    let enrollment = Enrollment::new(user.id, section.id);
    sqlx::query("INSERT INTO user_sections (user_id, section_id, year) VALUES (?, ?, ?)")
        .bind(enrollment.user_id)
        .bind(enrollment.section_id)
        .bind(enrollment.year)
        .execute(&mut *conn)
        .await?;

    info!("Enrolled {} in {} for {}", user.uid, section.abbreviation, enrollment.year);
    Ok(true)
}

async fn find_section_by_abbreviation(
    conn: &mut SqliteConnection,
    abbreviation: &str,
) -> Result<Option<Section>> {
    let section = sqlx::query_as::<_, Section>(
        "SELECT id, name, abbreviation FROM sections WHERE abbreviation = ?",
    )
    .bind(abbreviation)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(section)
}

async fn sections_of(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<Section>> {
    let sections = sqlx::query_as::<_, Section>(
        r#"
        SELECT s.id, s.name, s.abbreviation
        FROM sections s
        JOIN user_sections us ON us.section_id = s.id
        WHERE us.user_id = ?
        ORDER BY s.id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(sections)
}
