//! User persistence over either access mode.
//!
//! The store is built once per call from a driver's handle. Both variants
//! return the same shapes and the same errors.

use crate::database::{
    connection::{DatabaseHandle, DatabasePool},
    driver::Driver,
    entity::user as users,
    error::DatabaseError,
};
use crate::models::{User, UserRole};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use uuid::Uuid;

const ENTITY: &str = "user";

const PG_INSERT: &str = r#"
    INSERT INTO users (id, email, username, password, first_name, last_name, role, active, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
"#;
const MYSQL_INSERT: &str = r#"
    INSERT INTO users (id, email, username, password, first_name, last_name, role, active, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const PG_SELECT_BY_ID: &str = r#"
    SELECT id, email, username, password, first_name, last_name, role, active, created_at, updated_at
    FROM users WHERE id = $1
"#;
const MYSQL_SELECT_BY_ID: &str = r#"
    SELECT id, email, username, password, first_name, last_name, role, active, created_at, updated_at
    FROM users WHERE id = ?
"#;

const PG_SELECT_BY_EMAIL: &str = r#"
    SELECT id, email, username, password, first_name, last_name, role, active, created_at, updated_at
    FROM users WHERE email = $1
"#;
const MYSQL_SELECT_BY_EMAIL: &str = r#"
    SELECT id, email, username, password, first_name, last_name, role, active, created_at, updated_at
    FROM users WHERE email = ?
"#;

const PG_SELECT_ACTIVE_BY_EMAIL: &str = r#"
    SELECT id, email, username, password, first_name, last_name, role, active, created_at, updated_at
    FROM users WHERE email = $1 AND active = $2
"#;
const MYSQL_SELECT_ACTIVE_BY_EMAIL: &str = r#"
    SELECT id, email, username, password, first_name, last_name, role, active, created_at, updated_at
    FROM users WHERE email = ? AND active = ?
"#;

const PG_UPDATE: &str = r#"
    UPDATE users
    SET email = $1, username = $2, password = $3, first_name = $4, last_name = $5,
        role = $6, active = $7, updated_at = $8
    WHERE id = $9
"#;
const MYSQL_UPDATE: &str = r#"
    UPDATE users
    SET email = ?, username = ?, password = ?, first_name = ?, last_name = ?,
        role = ?, active = ?, updated_at = ?
    WHERE id = ?
"#;

const PG_DELETE: &str = "DELETE FROM users WHERE id = $1";
const MYSQL_DELETE: &str = "DELETE FROM users WHERE id = ?";

const PG_LIST: &str = r#"
    SELECT id, email, username, password, first_name, last_name, role, active, created_at, updated_at
    FROM users
    ORDER BY created_at DESC, id DESC
    LIMIT $1 OFFSET $2
"#;
const MYSQL_LIST: &str = r#"
    SELECT id, email, username, password, first_name, last_name, role, active, created_at, updated_at
    FROM users
    ORDER BY created_at DESC, id DESC
    LIMIT ? OFFSET ?
"#;

/// Row shape shared by both SQL dialects
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    password: String,
    first_name: String,
    last_name: String,
    role: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            username: row.username,
            password: row.password,
            first_name: row.first_name,
            last_name: row.last_name,
            role: parse_role(&row.role)?,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_role(role: &str) -> Result<UserRole, DatabaseError> {
    role.parse()
        .map_err(|_| DatabaseError::query(format!("unknown role stored for user: {}", role)))
}

fn from_model(model: users::Model) -> Result<User, DatabaseError> {
    User::try_from(model).map_err(|e| DatabaseError::query(e.to_string()))
}

fn convert_rows(rows: Vec<UserRow>) -> Result<Vec<User>, DatabaseError> {
    rows.into_iter().map(User::try_from).collect()
}

/// User storage over the ORM handle or the native pool
#[derive(Debug, Clone)]
pub enum UserStore {
    Orm(DatabaseConnection),
    Sql(DatabasePool),
}

impl From<DatabaseHandle> for UserStore {
    fn from(handle: DatabaseHandle) -> Self {
        match handle {
            DatabaseHandle::Orm(conn) => UserStore::Orm(conn),
            DatabaseHandle::Sql(pool) => UserStore::Sql(pool),
        }
    }
}

impl UserStore {
    /// Build the store matching the driver's access mode
    pub fn for_driver(driver: &dyn Driver) -> Result<Self, DatabaseError> {
        Ok(driver.handle()?.into())
    }

    /// Insert a new user; a taken email is `Duplicate`
    pub async fn insert(&self, user: &User) -> Result<(), DatabaseError> {
        match self {
            UserStore::Orm(conn) => {
                users::Entity::insert(users::ActiveModel::from(user))
                    .exec_without_returning(conn)
                    .await
                    .map_err(|e| DatabaseError::from_orm(e, ENTITY, &user.email))?;
            }
            UserStore::Sql(DatabasePool::Postgres(pool)) => {
                sqlx::query(PG_INSERT)
                    .bind(user.id)
                    .bind(&user.email)
                    .bind(&user.username)
                    .bind(&user.password)
                    .bind(&user.first_name)
                    .bind(&user.last_name)
                    .bind(user.role.as_str())
                    .bind(user.active)
                    .bind(user.created_at)
                    .bind(user.updated_at)
                    .execute(pool)
                    .await
                    .map_err(|e| DatabaseError::from_sqlx(e, ENTITY, &user.email))?;
            }
            UserStore::Sql(DatabasePool::MySql(pool)) => {
                sqlx::query(MYSQL_INSERT)
                    .bind(user.id)
                    .bind(&user.email)
                    .bind(&user.username)
                    .bind(&user.password)
                    .bind(&user.first_name)
                    .bind(&user.last_name)
                    .bind(user.role.as_str())
                    .bind(user.active)
                    .bind(user.created_at)
                    .bind(user.updated_at)
                    .execute(pool)
                    .await
                    .map_err(|e| DatabaseError::from_sqlx(e, ENTITY, &user.email))?;
            }
        }

        tracing::info!(user_id = %user.id, "Created user");
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        match self {
            UserStore::Orm(conn) => users::Entity::find_by_id(id)
                .one(conn)
                .await
                .map_err(|e| DatabaseError::query(e.to_string()))?
                .map(from_model)
                .transpose(),
            UserStore::Sql(DatabasePool::Postgres(pool)) => {
                sqlx::query_as::<_, UserRow>(PG_SELECT_BY_ID)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| DatabaseError::query(e.to_string()))?
                    .map(User::try_from)
                    .transpose()
            }
            UserStore::Sql(DatabasePool::MySql(pool)) => {
                sqlx::query_as::<_, UserRow>(MYSQL_SELECT_BY_ID)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| DatabaseError::query(e.to_string()))?
                    .map(User::try_from)
                    .transpose()
            }
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        match self {
            UserStore::Orm(conn) => users::Entity::find()
                .filter(users::Column::Email.eq(email))
                .one(conn)
                .await
                .map_err(|e| DatabaseError::query(e.to_string()))?
                .map(from_model)
                .transpose(),
            UserStore::Sql(DatabasePool::Postgres(pool)) => {
                sqlx::query_as::<_, UserRow>(PG_SELECT_BY_EMAIL)
                    .bind(email)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| DatabaseError::query(e.to_string()))?
                    .map(User::try_from)
                    .transpose()
            }
            UserStore::Sql(DatabasePool::MySql(pool)) => {
                sqlx::query_as::<_, UserRow>(MYSQL_SELECT_BY_EMAIL)
                    .bind(email)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| DatabaseError::query(e.to_string()))?
                    .map(User::try_from)
                    .transpose()
            }
        }
    }

    /// Lookup used for authentication; inactive users are invisible
    pub async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        match self {
            UserStore::Orm(conn) => users::Entity::find()
                .filter(users::Column::Email.eq(email))
                .filter(users::Column::Active.eq(true))
                .one(conn)
                .await
                .map_err(|e| DatabaseError::query(e.to_string()))?
                .map(from_model)
                .transpose(),
            UserStore::Sql(DatabasePool::Postgres(pool)) => {
                sqlx::query_as::<_, UserRow>(PG_SELECT_ACTIVE_BY_EMAIL)
                    .bind(email)
                    .bind(true)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| DatabaseError::query(e.to_string()))?
                    .map(User::try_from)
                    .transpose()
            }
            UserStore::Sql(DatabasePool::MySql(pool)) => {
                sqlx::query_as::<_, UserRow>(MYSQL_SELECT_ACTIVE_BY_EMAIL)
                    .bind(email)
                    .bind(true)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| DatabaseError::query(e.to_string()))?
                    .map(User::try_from)
                    .transpose()
            }
        }
    }

    /// Persist every mutable column of an existing user
    pub async fn update(&self, user: &User) -> Result<(), DatabaseError> {
        match self {
            UserStore::Orm(conn) => {
                users::Entity::update_many()
                    .set(users::ActiveModel::from(user))
                    .filter(users::Column::Id.eq(user.id))
                    .exec(conn)
                    .await
                    .map_err(|e| DatabaseError::from_orm(e, ENTITY, &user.email))?;
            }
            UserStore::Sql(DatabasePool::Postgres(pool)) => {
                sqlx::query(PG_UPDATE)
                    .bind(&user.email)
                    .bind(&user.username)
                    .bind(&user.password)
                    .bind(&user.first_name)
                    .bind(&user.last_name)
                    .bind(user.role.as_str())
                    .bind(user.active)
                    .bind(user.updated_at)
                    .bind(user.id)
                    .execute(pool)
                    .await
                    .map_err(|e| DatabaseError::from_sqlx(e, ENTITY, &user.email))?;
            }
            UserStore::Sql(DatabasePool::MySql(pool)) => {
                sqlx::query(MYSQL_UPDATE)
                    .bind(&user.email)
                    .bind(&user.username)
                    .bind(&user.password)
                    .bind(&user.first_name)
                    .bind(&user.last_name)
                    .bind(user.role.as_str())
                    .bind(user.active)
                    .bind(user.updated_at)
                    .bind(user.id)
                    .execute(pool)
                    .await
                    .map_err(|e| DatabaseError::from_sqlx(e, ENTITY, &user.email))?;
            }
        }

        tracing::info!(user_id = %user.id, "Updated user");
        Ok(())
    }

    /// Delete by id; no matching row is `NotFound`
    pub async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let rows_affected = match self {
            UserStore::Orm(conn) => {
                users::Entity::delete_by_id(id)
                    .exec(conn)
                    .await
                    .map_err(|e| DatabaseError::query(e.to_string()))?
                    .rows_affected
            }
            UserStore::Sql(DatabasePool::Postgres(pool)) => sqlx::query(PG_DELETE)
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| DatabaseError::query(e.to_string()))?
                .rows_affected(),
            UserStore::Sql(DatabasePool::MySql(pool)) => sqlx::query(MYSQL_DELETE)
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| DatabaseError::query(e.to_string()))?
                .rows_affected(),
        };

        if rows_affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: ENTITY.to_string(),
                id: id.to_string(),
            });
        }

        tracing::info!(user_id = %id, "Deleted user");
        Ok(())
    }

    /// Newest first, ties broken by id so pages are stable.
    ///
    /// Both bounds are capped at `i64::MAX`, the largest value either
    /// dialect binds.
    pub async fn list(&self, limit: u64, offset: u64) -> Result<Vec<User>, DatabaseError> {
        let limit = to_i64(limit);
        let offset = to_i64(offset);

        match self {
            UserStore::Orm(conn) => users::Entity::find()
                .order_by_desc(users::Column::CreatedAt)
                .order_by_desc(users::Column::Id)
                .limit(limit as u64)
                .offset(offset as u64)
                .all(conn)
                .await
                .map_err(|e| DatabaseError::query(e.to_string()))?
                .into_iter()
                .map(from_model)
                .collect(),
            UserStore::Sql(DatabasePool::Postgres(pool)) => {
                let rows = sqlx::query_as::<_, UserRow>(PG_LIST)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| DatabaseError::query(e.to_string()))?;
                convert_rows(rows)
            }
            UserStore::Sql(DatabasePool::MySql(pool)) => {
                let rows = sqlx::query_as::<_, UserRow>(MYSQL_LIST)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| DatabaseError::query(e.to_string()))?;
                convert_rows(rows)
            }
        }
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::driver::MockDriver;

    #[test]
    fn test_unconnected_driver_has_no_store() {
        let mut driver = MockDriver::new();
        driver
            .expect_handle()
            .returning(|| Err(DatabaseError::NotConnected));

        assert!(matches!(
            UserStore::for_driver(&driver),
            Err(DatabaseError::NotConnected)
        ));
    }

    #[test]
    fn test_unknown_role_is_a_query_error() {
        assert_eq!(parse_role("guest").unwrap(), UserRole::Guest);
        assert!(matches!(
            parse_role("superuser"),
            Err(DatabaseError::Query { .. })
        ));
    }

    #[test]
    fn test_limit_conversion_saturates() {
        assert_eq!(to_i64(10), 10);
        assert_eq!(to_i64(u64::MAX), i64::MAX);
    }
}
