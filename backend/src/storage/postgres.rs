//! PostgreSQL store backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CascadeOp, CascadePlan, Store};
use crate::error::{AppError, Result};
use crate::models::access::Access;
use crate::models::department::Department;
use crate::models::directive::Directive;
use crate::models::information_system::InformationSystem;
use crate::models::log::LogEntry;
use crate::models::unit::{Unit, UnitUser};
use crate::models::user::User;
use crate::models::user_access::UserAccess;
use crate::services::grant_service::apply_revoke;

const USER_COLUMNS: &str = "id, username, first_name, middle_name, last_name, egn, phone, \
     position, unit_id, reading_access, writing_access, password_hash, deleted_on";

const USER_ACCESS_COLUMNS: &str = "user_id, access_id, granted_by_directive_id, granted_on, \
     revoked_on, revoked_by_directive_id";

/// Map constraint violations on insert/update to domain errors.
fn write_error(e: sqlx::Error, conflict: impl FnOnce() -> String) -> AppError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => AppError::Conflict(conflict()),
        Some(db) if db.is_foreign_key_violation() => {
            AppError::Blocked("Referenced record is missing".to_string())
        }
        _ => AppError::from(e),
    }
}

/// Map a restrict violation on delete to `Blocked`.
fn delete_error(e: sqlx::Error, what: &str) -> AppError {
    match e.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => {
            AppError::Blocked(format!("{} is still referenced", what))
        }
        _ => AppError::from(e),
    }
}

fn require_row(rows_affected: u64, what: &str) -> Result<()> {
    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("{} not found", what)));
    }
    Ok(())
}

fn split_keys(keys: &[(Uuid, Uuid)]) -> (Vec<Uuid>, Vec<Uuid>) {
    keys.iter().copied().unzip()
}

/// PostgreSQL-backed store
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn list_departments(&self) -> Result<Vec<Department>> {
        let rows = sqlx::query_as::<_, Department>(
            "SELECT id, description, deleted_on FROM departments ORDER BY description",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_department(&self, id: Uuid) -> Result<Option<Department>> {
        let row = sqlx::query_as::<_, Department>(
            "SELECT id, description, deleted_on FROM departments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn insert_department(&self, department: &Department) -> Result<()> {
        sqlx::query("INSERT INTO departments (id, description, deleted_on) VALUES ($1, $2, $3)")
            .bind(department.id)
            .bind(&department.description)
            .bind(department.deleted_on)
            .execute(&self.db)
            .await
            .map_err(|e| {
                write_error(e, || {
                    format!("Department '{}' already exists", department.description)
                })
            })?;
        Ok(())
    }

    async fn update_department(&self, department: &Department) -> Result<()> {
        let result =
            sqlx::query("UPDATE departments SET description = $2, deleted_on = $3 WHERE id = $1")
                .bind(department.id)
                .bind(&department.description)
                .bind(department.deleted_on)
                .execute(&self.db)
                .await
                .map_err(|e| {
                    write_error(e, || {
                        format!("Department '{}' already exists", department.description)
                    })
                })?;
        require_row(result.rows_affected(), "Department")
    }

    async fn list_units(&self) -> Result<Vec<Unit>> {
        let rows = sqlx::query_as::<_, Unit>(
            "SELECT id, description, department_id, deleted_on FROM units ORDER BY description",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_unit(&self, id: Uuid) -> Result<Option<Unit>> {
        let row = sqlx::query_as::<_, Unit>(
            "SELECT id, description, department_id, deleted_on FROM units WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn units_of_department(&self, department_id: Uuid) -> Result<Vec<Unit>> {
        let rows = sqlx::query_as::<_, Unit>(
            r#"
            SELECT id, description, department_id, deleted_on
            FROM units
            WHERE department_id = $1
            ORDER BY description
            "#,
        )
        .bind(department_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn insert_unit(&self, unit: &Unit) -> Result<()> {
        sqlx::query(
            "INSERT INTO units (id, description, department_id, deleted_on) VALUES ($1, $2, $3, $4)",
        )
        .bind(unit.id)
        .bind(&unit.description)
        .bind(unit.department_id)
        .bind(unit.deleted_on)
        .execute(&self.db)
        .await
        .map_err(|e| {
            write_error(e, || {
                format!("Unit '{}' already exists in this department", unit.description)
            })
        })?;
        Ok(())
    }

    async fn update_unit(&self, unit: &Unit) -> Result<()> {
        let result = sqlx::query(
            "UPDATE units SET description = $2, department_id = $3, deleted_on = $4 WHERE id = $1",
        )
        .bind(unit.id)
        .bind(&unit.description)
        .bind(unit.department_id)
        .bind(unit.deleted_on)
        .execute(&self.db)
        .await
        .map_err(|e| {
            write_error(e, || {
                format!("Unit '{}' already exists in this department", unit.description)
            })
        })?;
        require_row(result.rows_affected(), "Unit")
    }

    async fn list_unit_users(&self) -> Result<Vec<UnitUser>> {
        let rows = sqlx::query_as::<_, UnitUser>(
            "SELECT unit_id, user_id, deleted_on FROM unit_users ORDER BY unit_id, user_id",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn unit_users_of_user(&self, user_id: Uuid) -> Result<Vec<UnitUser>> {
        let rows = sqlx::query_as::<_, UnitUser>(
            "SELECT unit_id, user_id, deleted_on FROM unit_users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn unit_users_of_unit(&self, unit_id: Uuid) -> Result<Vec<UnitUser>> {
        let rows = sqlx::query_as::<_, UnitUser>(
            "SELECT unit_id, user_id, deleted_on FROM unit_users WHERE unit_id = $1",
        )
        .bind(unit_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn upsert_unit_user(&self, unit_user: &UnitUser) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO unit_users (unit_id, user_id, deleted_on)
            VALUES ($1, $2, $3)
            ON CONFLICT (unit_id, user_id) DO UPDATE SET deleted_on = EXCLUDED.deleted_on
            "#,
        )
        .bind(unit_user.unit_id)
        .bind(unit_user.user_id)
        .bind(unit_user.deleted_on)
        .execute(&self.db)
        .await
        .map_err(|e| write_error(e, || "Unit grant already exists".to_string()))?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY username", USER_COLUMNS);
        let rows = sqlx::query_as::<_, User>(&sql).fetch_all(&self.db).await?;
        Ok(rows)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn users_of_unit(&self, unit_id: Uuid) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE unit_id = $1 ORDER BY username",
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, User>(&sql)
            .bind(unit_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, first_name, middle_name, last_name, egn, phone,
                position, unit_id, reading_access, writing_access, password_hash, deleted_on
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.middle_name)
        .bind(&user.last_name)
        .bind(&user.egn)
        .bind(&user.phone)
        .bind(&user.position)
        .bind(user.unit_id)
        .bind(user.reading_access)
        .bind(user.writing_access)
        .bind(&user.password_hash)
        .bind(user.deleted_on)
        .execute(&self.db)
        .await
        .map_err(|e| write_error(e, || format!("Username '{}' already exists", user.username)))?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                username = $2, first_name = $3, middle_name = $4, last_name = $5,
                egn = $6, phone = $7, position = $8, unit_id = $9,
                reading_access = $10, writing_access = $11, password_hash = $12,
                deleted_on = $13
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.middle_name)
        .bind(&user.last_name)
        .bind(&user.egn)
        .bind(&user.phone)
        .bind(&user.position)
        .bind(user.unit_id)
        .bind(user.reading_access)
        .bind(user.writing_access)
        .bind(&user.password_hash)
        .bind(user.deleted_on)
        .execute(&self.db)
        .await
        .map_err(|e| write_error(e, || format!("Username '{}' already exists", user.username)))?;
        require_row(result.rows_affected(), "User")
    }

    async fn list_information_systems(&self) -> Result<Vec<InformationSystem>> {
        let rows = sqlx::query_as::<_, InformationSystem>(
            "SELECT id, name FROM information_systems ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_information_system(&self, id: Uuid) -> Result<Option<InformationSystem>> {
        let row = sqlx::query_as::<_, InformationSystem>(
            "SELECT id, name FROM information_systems WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn insert_information_system(&self, system: &InformationSystem) -> Result<()> {
        sqlx::query("INSERT INTO information_systems (id, name) VALUES ($1, $2)")
            .bind(system.id)
            .bind(&system.name)
            .execute(&self.db)
            .await
            .map_err(|e| {
                write_error(e, || format!("Information system '{}' already exists", system.name))
            })?;
        Ok(())
    }

    async fn update_information_system(&self, system: &InformationSystem) -> Result<()> {
        let result = sqlx::query("UPDATE information_systems SET name = $2 WHERE id = $1")
            .bind(system.id)
            .bind(&system.name)
            .execute(&self.db)
            .await
            .map_err(|e| {
                write_error(e, || format!("Information system '{}' already exists", system.name))
            })?;
        require_row(result.rows_affected(), "Information system")
    }

    async fn delete_information_system(&self, id: Uuid) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM accesses WHERE information_system_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if in_use {
            return Err(AppError::Blocked(
                "Information system still has accesses".to_string(),
            ));
        }
        let result = sqlx::query("DELETE FROM information_systems WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| delete_error(e, "Information system"))?;
        require_row(result.rows_affected(), "Information system")?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_accesses(&self) -> Result<Vec<Access>> {
        let rows = sqlx::query_as::<_, Access>(
            r#"
            SELECT id, description, information_system_id, parent_access_id
            FROM accesses
            ORDER BY description
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_access(&self, id: Uuid) -> Result<Option<Access>> {
        let row = sqlx::query_as::<_, Access>(
            r#"
            SELECT id, description, information_system_id, parent_access_id
            FROM accesses
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn children_of_access(&self, id: Uuid) -> Result<Vec<Access>> {
        let rows = sqlx::query_as::<_, Access>(
            r#"
            SELECT id, description, information_system_id, parent_access_id
            FROM accesses
            WHERE parent_access_id = $1
            ORDER BY description
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn insert_access(&self, access: &Access) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accesses (id, description, information_system_id, parent_access_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(access.id)
        .bind(&access.description)
        .bind(access.information_system_id)
        .bind(access.parent_access_id)
        .execute(&self.db)
        .await
        .map_err(|e| write_error(e, || format!("Access '{}' already exists", access.description)))?;
        Ok(())
    }

    async fn update_access(&self, access: &Access) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accesses
            SET description = $2, information_system_id = $3, parent_access_id = $4
            WHERE id = $1
            "#,
        )
        .bind(access.id)
        .bind(&access.description)
        .bind(access.information_system_id)
        .bind(access.parent_access_id)
        .execute(&self.db)
        .await
        .map_err(|e| write_error(e, || format!("Access '{}' already exists", access.description)))?;
        require_row(result.rows_affected(), "Access")
    }

    async fn delete_access(&self, id: Uuid) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let has_children: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM accesses WHERE parent_access_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if has_children {
            return Err(AppError::Blocked("Access still has child accesses".to_string()));
        }
        let has_grants: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_accesses WHERE access_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if has_grants {
            return Err(AppError::Blocked("Access is referenced by grants".to_string()));
        }
        let result = sqlx::query("DELETE FROM accesses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| delete_error(e, "Access"))?;
        require_row(result.rows_affected(), "Access")?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_directives(&self) -> Result<Vec<Directive>> {
        let rows = sqlx::query_as::<_, Directive>(
            "SELECT id, name, deleted_on FROM directives ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get_directive(&self, id: Uuid) -> Result<Option<Directive>> {
        let row = sqlx::query_as::<_, Directive>(
            "SELECT id, name, deleted_on FROM directives WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn insert_directive(&self, directive: &Directive) -> Result<()> {
        sqlx::query("INSERT INTO directives (id, name, deleted_on) VALUES ($1, $2, $3)")
            .bind(directive.id)
            .bind(&directive.name)
            .bind(directive.deleted_on)
            .execute(&self.db)
            .await
            .map_err(|e| write_error(e, || format!("Directive '{}' already exists", directive.name)))?;
        Ok(())
    }

    async fn update_directive(&self, directive: &Directive) -> Result<()> {
        let result = sqlx::query("UPDATE directives SET name = $2, deleted_on = $3 WHERE id = $1")
            .bind(directive.id)
            .bind(&directive.name)
            .bind(directive.deleted_on)
            .execute(&self.db)
            .await
            .map_err(|e| write_error(e, || format!("Directive '{}' already exists", directive.name)))?;
        require_row(result.rows_affected(), "Directive")
    }

    async fn delete_directive(&self, id: Uuid) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM user_accesses
                WHERE granted_by_directive_id = $1 OR revoked_by_directive_id = $1
            )
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if referenced {
            return Err(AppError::Blocked(
                "Directive is referenced by grants".to_string(),
            ));
        }
        let result = sqlx::query("DELETE FROM directives WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| delete_error(e, "Directive"))?;
        require_row(result.rows_affected(), "Directive")?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_user_accesses(&self) -> Result<Vec<UserAccess>> {
        let sql = format!(
            "SELECT {} FROM user_accesses ORDER BY user_id, access_id",
            USER_ACCESS_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserAccess>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn user_accesses_of_user(&self, user_id: Uuid) -> Result<Vec<UserAccess>> {
        let sql = format!(
            "SELECT {} FROM user_accesses WHERE user_id = $1",
            USER_ACCESS_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserAccess>(&sql)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn user_accesses_of_access(&self, access_id: Uuid) -> Result<Vec<UserAccess>> {
        let sql = format!(
            "SELECT {} FROM user_accesses WHERE access_id = $1",
            USER_ACCESS_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserAccess>(&sql)
            .bind(access_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn get_user_access(
        &self,
        user_id: Uuid,
        access_id: Uuid,
    ) -> Result<Option<UserAccess>> {
        let sql = format!(
            "SELECT {} FROM user_accesses WHERE user_id = $1 AND access_id = $2",
            USER_ACCESS_COLUMNS
        );
        let row = sqlx::query_as::<_, UserAccess>(&sql)
            .bind(user_id)
            .bind(access_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn upsert_grant(
        &self,
        user_id: Uuid,
        access_id: Uuid,
        directive_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<UserAccess> {
        // granted_on keeps the first grant date on reactivation
        let sql = format!(
            r#"
            INSERT INTO user_accesses (user_id, access_id, granted_by_directive_id, granted_on)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, access_id) DO UPDATE SET
                granted_by_directive_id = EXCLUDED.granted_by_directive_id,
                revoked_on = NULL,
                revoked_by_directive_id = NULL
            RETURNING {}
            "#,
            USER_ACCESS_COLUMNS
        );
        let row = sqlx::query_as::<_, UserAccess>(&sql)
            .bind(user_id)
            .bind(access_id)
            .bind(directive_id)
            .bind(at)
            .fetch_one(&self.db)
            .await
            .map_err(|e| write_error(e, || "Grant already exists".to_string()))?;
        Ok(row)
    }

    async fn revoke_grant(
        &self,
        user_id: Uuid,
        access_id: Uuid,
        directive_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<UserAccess> {
        let mut tx = self.db.begin().await?;
        let sql = format!(
            "SELECT {} FROM user_accesses WHERE user_id = $1 AND access_id = $2 FOR UPDATE",
            USER_ACCESS_COLUMNS
        );
        let existing = sqlx::query_as::<_, UserAccess>(&sql)
            .bind(user_id)
            .bind(access_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Grant not found".to_string()))?;

        let row = apply_revoke(existing, directive_id, at)?;
        sqlx::query(
            r#"
            UPDATE user_accesses
            SET revoked_on = $3, revoked_by_directive_id = $4
            WHERE user_id = $1 AND access_id = $2
            "#,
        )
        .bind(row.user_id)
        .bind(row.access_id)
        .bind(row.revoked_on)
        .bind(row.revoked_by_directive_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, || "Grant already exists".to_string()))?;
        tx.commit().await?;
        Ok(row)
    }

    async fn count_directive_references(&self, directive_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM user_accesses
            WHERE granted_by_directive_id = $1 OR revoked_by_directive_id = $1
            "#,
        )
        .bind(directive_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    async fn apply_cascade(&self, op: CascadeOp, plan: &CascadePlan) -> Result<()> {
        let (uu_units, uu_users) = split_keys(&plan.unit_user_keys);
        let mut tx = self.db.begin().await?;

        match op {
            CascadeOp::SoftDelete(_) | CascadeOp::Restore => {
                let stamp = match op {
                    CascadeOp::SoftDelete(at) => Some(at),
                    _ => None,
                };
                sqlx::query("UPDATE departments SET deleted_on = $1 WHERE id = ANY($2)")
                    .bind(stamp)
                    .bind(&plan.department_ids)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("UPDATE units SET deleted_on = $1 WHERE id = ANY($2)")
                    .bind(stamp)
                    .bind(&plan.unit_ids)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("UPDATE users SET deleted_on = $1 WHERE id = ANY($2)")
                    .bind(stamp)
                    .bind(&plan.user_ids)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    r#"
                    UPDATE unit_users SET deleted_on = $1
                    WHERE (unit_id, user_id) IN (
                        SELECT * FROM UNNEST($2::uuid[], $3::uuid[])
                    )
                    "#,
                )
                .bind(stamp)
                .bind(&uu_units)
                .bind(&uu_users)
                .execute(&mut *tx)
                .await?;
            }
            CascadeOp::HardDelete => {
                let (ua_users, ua_accesses) = split_keys(&plan.user_access_keys);
                sqlx::query(
                    r#"
                    DELETE FROM user_accesses
                    WHERE (user_id, access_id) IN (
                        SELECT * FROM UNNEST($1::uuid[], $2::uuid[])
                    )
                    "#,
                )
                .bind(&ua_users)
                .bind(&ua_accesses)
                .execute(&mut *tx)
                .await?;
                sqlx::query(
                    r#"
                    DELETE FROM unit_users
                    WHERE (unit_id, user_id) IN (
                        SELECT * FROM UNNEST($1::uuid[], $2::uuid[])
                    )
                    "#,
                )
                .bind(&uu_units)
                .bind(&uu_users)
                .execute(&mut *tx)
                .await?;
                sqlx::query("DELETE FROM users WHERE id = ANY($1)")
                    .bind(&plan.user_ids)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM units WHERE id = ANY($1)")
                    .bind(&plan.unit_ids)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM departments WHERE id = ANY($1)")
                    .bind(&plan.department_ids)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_log(&self, entry: &LogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO logs (id, actor_id, actor, action, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor_id)
        .bind(&entry.actor)
        .bind(entry.action)
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list_logs(&self, offset: i64, limit: i64) -> Result<(Vec<LogEntry>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs")
            .fetch_one(&self.db)
            .await?;
        let rows = sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT id, actor_id, actor, action, description, created_at
            FROM logs
            ORDER BY created_at DESC
            OFFSET $1
            LIMIT $2
            "#,
        )
        .bind(offset.max(0))
        .bind(limit.max(0))
        .fetch_all(&self.db)
        .await?;
        Ok((rows, total))
    }

    async fn purge_logs(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM logs").execute(&self.db).await?;
        Ok(result.rows_affected())
    }

    async fn reset(&self, keep_user_id: Uuid) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let keep_unit_id: Uuid = sqlx::query_scalar("SELECT unit_id FROM users WHERE id = $1")
            .bind(keep_user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        for statement in [
            "DELETE FROM user_accesses",
            "DELETE FROM unit_users",
            "DELETE FROM accesses",
            "DELETE FROM information_systems",
            "DELETE FROM directives",
        ] {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query("DELETE FROM users WHERE id <> $1")
            .bind(keep_user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM units WHERE id <> $1")
            .bind(keep_unit_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM departments WHERE id NOT IN (SELECT department_id FROM units WHERE id = $1)",
        )
        .bind(keep_unit_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
