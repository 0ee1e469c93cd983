use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PgStore, conflict_or_db, count_rows, delete_row, fetch_page};
use crate::model::{User, UserFilter};
use crate::store::{Page, Pagination, Record, Repository, StoreResult};

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(role) = &filter.role {
        query.push(" AND role = ").push_bind(role.clone());
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
}

#[async_trait]
impl Repository<User> for PgStore {
    async fn insert(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, status, profile_picture, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.status.as_str())
        .bind(&user.profile_picture)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_or_db(err, User::ENTITY, &user.email))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_key(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE users
             SET name = $2, email = $3, password_hash = $4, role = $5, status = $6,
                 profile_picture = $7, updated_at = $8
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.status.as_str())
        .bind(&user.profile_picture)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| conflict_or_db(err, User::ENTITY, &user.email))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        delete_row(&self.pool, "users", id).await
    }

    async fn list(&self, filter: &UserFilter, page: Pagination) -> StoreResult<Page<User>> {
        fetch_page(&self.pool, "users", page, |query| push_filters(query, filter)).await
    }

    async fn count(&self) -> StoreResult<i64> {
        count_rows(&self.pool, "users").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewUser, UserStatus};
    use crate::store::StoreError;
    use crate::store::postgres::test_support::setup_test_db;

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_user_round_trip_and_unique_email() {
        let store = PgStore::new(setup_test_db().await);
        let email = format!("pg_user_{}@example.com", Uuid::new_v4().simple());
        let user = User::new(
            NewUser {
                name: "Pg User".to_string(),
                email: email.clone(),
                password: String::new(),
                role: "flight".to_string(),
                status: UserStatus::Active,
                profile_picture: None,
            },
            "hash".to_string(),
        )
        .unwrap();

        Repository::<User>::insert(&store, &user).await.unwrap();
        let found = Repository::<User>::find_by_key(&store, &email).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.status, UserStatus::Active);

        let mut twin = user.clone();
        twin.id = Uuid::new_v4();
        let err = Repository::<User>::insert(&store, &twin).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        assert!(Repository::<User>::delete(&store, user.id).await.unwrap());
    }
}
