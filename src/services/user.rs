use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    CreateUserRequest, PaginationQuery, UpdateUserRequest, User, UserListResponse, UserResponse,
};

const MAX_USER_NAME_LEN: usize = 64;

/// User service
pub struct UserService;

impl UserService {
    /// Create a user, rejecting names that are already taken
    pub async fn create(db: &Database, req: CreateUserRequest) -> Result<User> {
        validate_user_name(&req.user_name)?;

        if Self::find_user_by_name(db, &req.user_name).await?.is_some() {
            return Err(already_exists(&req.user_name));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let profile = serde_json::to_string(&req.profile)?;

        // The unique index catches a concurrent create that slipped past the lookup
        sqlx::query(
            r#"
            INSERT INTO users (id, user_name, profile, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&req.user_name)
        .bind(&profile)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await
        .map_err(|e| AppError::conflict_on_unique(e, already_exists_message(&req.user_name)))?;

        tracing::info!("Created user {} ({})", req.user_name, id);
        Self::find_user_by_id(db, &id).await
    }

    /// List users one page at a time; `page_index` starts at 1
    pub async fn find_all(db: &Database, query: &PaginationQuery) -> Result<UserListResponse> {
        let page = query.one_based()?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await?;

        let users: Vec<User> =
            sqlx::query_as("SELECT * FROM users ORDER BY rowid LIMIT ? OFFSET ?")
                .bind(page.limit)
                .bind(page.offset)
                .fetch_all(db.pool())
                .await?;

        Ok(UserListResponse {
            total,
            user_list: users.into_iter().map(UserResponse::from).collect(),
        })
    }

    /// Get user by ID
    pub async fn find_user_by_id(db: &Database, id: &str) -> Result<User> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User #{} not found", id)))?;

        Ok(user)
    }

    /// Apply a partial update and return the user as it was before the update
    pub async fn update_user(db: &Database, id: &str, req: UpdateUserRequest) -> Result<User> {
        if let Some(ref name) = req.user_name {
            validate_user_name(name)?;
        }

        let mut tx = db.pool().begin_with("BEGIN IMMEDIATE").await?;

        let existing: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User #{} not found", id)))?;

        let mut profile = existing.profile_fields()?;
        if let Some(fields) = req.profile {
            profile.extend(fields);
        }
        let user_name = req.user_name.unwrap_or_else(|| existing.user_name.clone());
        let now = Utc::now().to_rfc3339();

        sqlx::query("UPDATE users SET user_name = ?, profile = ?, updated_at = ? WHERE id = ?")
            .bind(&user_name)
            .bind(serde_json::to_string(&profile)?)
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::conflict_on_unique(e, already_exists_message(&user_name)))?;

        tx.commit().await?;

        tracing::info!("Updated user {}", id);
        Ok(existing)
    }

    /// Delete a user, returning the removed record if there was one
    pub async fn delete_user(db: &Database, id: &str) -> Result<Option<User>> {
        let deleted: Option<User> = sqlx::query_as("DELETE FROM users WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(db.pool())
            .await?;

        if deleted.is_some() {
            tracing::info!("Deleted user {}", id);
        }
        Ok(deleted)
    }

    pub async fn find_user_by_name(db: &Database, user_name: &str) -> Result<Option<User>> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE user_name = ?")
            .bind(user_name)
            .fetch_optional(db.pool())
            .await?;
        Ok(user)
    }
}

fn validate_user_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.chars().count() > MAX_USER_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "User name must be between 1 and {} characters",
            MAX_USER_NAME_LEN
        )));
    }
    Ok(())
}

fn already_exists_message(user_name: &str) -> String {
    format!("User {} already exists", user_name)
}

fn already_exists(user_name: &str) -> AppError {
    AppError::Conflict(already_exists_message(user_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn profile(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("profile must be an object"),
        }
    }

    async fn create(db: &Database, name: &str, fields: Value) -> User {
        UserService::create(
            db,
            CreateUserRequest {
                user_name: name.to_string(),
                profile: profile(fields),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let db = Database::in_memory().await.unwrap();
        let user = create(&db, "alice", json!({"email": "alice@example.com"})).await;

        assert_eq!(user.user_name, "alice");
        assert_eq!(user.profile_fields().unwrap()["email"], "alice@example.com");

        let found = UserService::find_user_by_id(&db, &user.id).await.unwrap();
        assert_eq!(UserResponse::from(found), UserResponse::from(user.clone()));

        let by_name = UserService::find_user_by_name(&db, "alice").await.unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let db = Database::in_memory().await.unwrap();
        create(&db, "bob", json!({"age": 30})).await;

        let result = UserService::create(
            &db,
            CreateUserRequest {
                user_name: "bob".to_string(),
                profile: profile(json!({"age": 99, "city": "Oslo"})),
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_unique_index_maps_to_conflict() {
        let db = Database::in_memory().await.unwrap();
        create(&db, "carol", json!({})).await;

        // Simulates a create that raced past the name lookup
        let err = sqlx::query("INSERT INTO users (id, user_name, created_at, updated_at) VALUES ('x', 'carol', '', '')")
            .execute(db.pool())
            .await
            .unwrap_err();
        assert!(matches!(
            AppError::conflict_on_unique(err, "dup"),
            AppError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_invalid_user_name() {
        let db = Database::in_memory().await.unwrap();
        let result = UserService::create(
            &db,
            CreateUserRequest {
                user_name: "   ".to_string(),
                profile: Map::new(),
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_find_missing_user() {
        let db = Database::in_memory().await.unwrap();
        assert!(matches!(
            UserService::find_user_by_id(&db, "missing").await,
            Err(AppError::NotFound(_))
        ));
        assert!(UserService::find_user_by_name(&db, "missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_returns_previous_state() {
        let db = Database::in_memory().await.unwrap();
        let user = create(&db, "dave", json!({"city": "Paris", "age": 40})).await;

        let before = UserService::update_user(
            &db,
            &user.id,
            UpdateUserRequest {
                user_name: Some("david".to_string()),
                profile: Some(profile(json!({"city": "Lyon"}))),
            },
        )
        .await
        .unwrap();

        assert_eq!(before.user_name, "dave");
        assert_eq!(before.profile_fields().unwrap()["city"], "Paris");

        let after = UserService::find_user_by_id(&db, &user.id).await.unwrap();
        assert_eq!(after.user_name, "david");
        assert_eq!(after.profile_fields().unwrap()["city"], "Lyon");
        // Untouched keys survive a partial update
        assert_eq!(after.profile_fields().unwrap()["age"], 40);
        assert_ne!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let db = Database::in_memory().await.unwrap();
        let result =
            UserService::update_user(&db, "missing", UpdateUserRequest::default()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_to_taken_name_conflicts() {
        let db = Database::in_memory().await.unwrap();
        create(&db, "erin", json!({})).await;
        let frank = create(&db, "frank", json!({})).await;

        let result = UserService::update_user(
            &db,
            &frank.id,
            UpdateUserRequest {
                user_name: Some("erin".to_string()),
                profile: None,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let unchanged = UserService::find_user_by_id(&db, &frank.id).await.unwrap();
        assert_eq!(unchanged.user_name, "frank");
    }

    #[tokio::test]
    async fn test_delete_user() {
        let db = Database::in_memory().await.unwrap();
        let user = create(&db, "gina", json!({})).await;

        let deleted = UserService::delete_user(&db, &user.id).await.unwrap();
        assert_eq!(deleted.map(|u| u.user_name), Some("gina".to_string()));

        // Deleting again is not an error
        assert!(UserService::delete_user(&db, &user.id)
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            UserService::find_user_by_id(&db, &user.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pagination_is_one_based() {
        let db = Database::in_memory().await.unwrap();
        for i in 0..25 {
            create(&db, &format!("user-{:02}", i), json!({"n": i})).await;
        }

        let page = UserService::find_all(&db, &PaginationQuery::new(2, 10))
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        let names: Vec<String> = page.user_list.into_iter().map(|u| u.user_name).collect();
        let expected: Vec<String> = (10..20).map(|i| format!("user-{:02}", i)).collect();
        assert_eq!(names, expected);

        let last = UserService::find_all(&db, &PaginationQuery::new(3, 10))
            .await
            .unwrap();
        assert_eq!(last.total, 25);
        assert_eq!(last.user_list.len(), 5);

        assert!(matches!(
            UserService::find_all(&db, &PaginationQuery::new(0, 10)).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_update_with_corrupt_profile_leaves_row_alone() {
        let db = Database::in_memory().await.unwrap();
        let user = create(&db, "iris", json!({"a": 1})).await;
        sqlx::query("UPDATE users SET profile = 'not json' WHERE id = ?")
            .bind(&user.id)
            .execute(db.pool())
            .await
            .unwrap();

        let result = UserService::update_user(
            &db,
            &user.id,
            UpdateUserRequest {
                user_name: None,
                profile: Some(profile(json!({"b": 2}))),
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        let stored: String = sqlx::query_scalar("SELECT profile FROM users WHERE id = ?")
            .bind(&user.id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(stored, "not json");
    }

    #[tokio::test]
    async fn test_concurrent_updates_on_file_database() {
        let path = std::env::temp_dir().join(format!("udm-{}.db", Uuid::new_v4()));
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let db = Database::new(&url, 8).await.unwrap();
        db.run_migrations().await.unwrap();
        let user = create(&db, "jack", json!({})).await;

        let mut handles = Vec::new();
        for i in 0..40 {
            let db = db.clone();
            let id = user.id.clone();
            handles.push(tokio::spawn(async move {
                let mut fields = Map::new();
                fields.insert(format!("k{}", i), json!(i));
                UserService::update_user(
                    &db,
                    &id,
                    UpdateUserRequest {
                        user_name: None,
                        profile: Some(fields),
                    },
                )
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Every merge saw the previous one, so no field was lost
        let after = UserService::find_user_by_id(&db, &user.id).await.unwrap();
        assert_eq!(after.profile_fields().unwrap().len(), 40);

        db.pool().close().await;
        let _ = std::fs::remove_file(&path);
    }
}
