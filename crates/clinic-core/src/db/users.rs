//! Staff profile database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Role, UserProfile};

impl Database {
    /// Insert a new user profile.
    pub fn insert_user(&self, user: &UserProfile) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO user_profiles (username, role, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![user.username, user.role.as_str(), user.created_at, user.updated_at],
        )?;
        Ok(())
    }

    /// Change a user's role.
    pub fn update_user_role(&self, username: &str, role: Role) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE user_profiles SET role = ?2, updated_at = datetime('now') WHERE username = ?1",
            params![username, role.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a user profile by username.
    pub fn get_user(&self, username: &str) -> DbResult<Option<UserProfile>> {
        let row = self
            .conn
            .query_row(
                "SELECT username, role, created_at, updated_at FROM user_profiles WHERE username = ?",
                [username],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(username, role, created_at, updated_at)| {
            let role = Role::parse(&role)
                .ok_or_else(|| DbError::Constraint(format!("Unknown role: {}", role)))?;
            Ok(UserProfile {
                username,
                role,
                created_at,
                updated_at,
            })
        })
        .transpose()
    }

    /// List all user profiles.
    pub fn list_users(&self) -> DbResult<Vec<UserProfile>> {
        let mut stmt = self.conn.prepare(
            "SELECT username, role, created_at, updated_at FROM user_profiles ORDER BY username",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut users = Vec::new();
        for row in rows {
            let (username, role, created_at, updated_at) = row?;
            let role = Role::parse(&role)
                .ok_or_else(|| DbError::Constraint(format!("Unknown role: {}", role)))?;
            users.push(UserProfile {
                username,
                role,
                created_at,
                updated_at,
            });
        }
        Ok(users)
    }

    /// Delete a user profile.
    pub fn delete_user(&self, username: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM user_profiles WHERE username = ?", [username])?;
        Ok(rows_affected > 0)
    }
}
