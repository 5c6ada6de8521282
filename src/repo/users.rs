use teloxide::types::UserId;
use crate::repository;

/// A chat member the bot has seen; used to resolve `@username` mentions into user ids.
#[derive(sqlx::FromRow, Debug)]
pub struct User {
    pub uid: i64,
    pub username: Option<String>,
    pub name: String,
}

impl User {
    pub fn user_id(&self) -> Result<UserId, std::num::TryFromIntError> {
        Ok(UserId(self.uid.try_into()?))
    }
}

repository!(Users,
    pub async fn create_or_update(&self, uid: UserId, username: Option<&str>, name: &str) -> anyhow::Result<()> {
        let uid: i64 = uid.0.try_into()?;
        sqlx::query("INSERT INTO Users (uid, username, name) VALUES ($1, $2, $3) \
                        ON CONFLICT (uid) DO UPDATE SET username = $2, name = $3, updated_at = current_timestamp")
            .bind(uid)
            .bind(username)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
,
    pub async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let username = username.trim_start_matches('@');
        sqlx::query_as::<_, User>("SELECT uid, username, name FROM Users WHERE lower(username) = lower($1) \
                                    ORDER BY updated_at DESC LIMIT 1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.into())
    }
);
