use std::sync::Arc;

use log::{error, info, warn};

use crate::{
    util::constant_time_eq, Database, DatabaseError, OptionalResult, PrimaryKey, UserData,
};

/// Grants admin rights to users that know the shared admin password.
///
/// The password is handed over at startup and never read from the environment
/// afterwards.
pub struct AdminBootstrap {
    db: Arc<dyn Database>,
    password: Option<String>,
}

impl AdminBootstrap {
    pub fn new(db: &Arc<dyn Database>, password: Option<String>) -> Self {
        if password.is_none() {
            warn!("No admin password is configured, nobody can become an admin");
        }

        Self {
            db: db.clone(),
            password,
        }
    }

    /// Returns true if the candidate matches the configured password
    pub fn check_password(&self, candidate: &str) -> bool {
        match &self.password {
            Some(password) => constant_time_eq(password, candidate),
            None => {
                error!("Admin password was checked, but none is configured");
                false
            }
        }
    }

    /// Creates an admin profile for the user if the candidate password is correct.
    ///
    /// Returns the id of the new or already existing profile, or `None` if the
    /// password is wrong or nobody is logged in.
    pub async fn create_admin_profile(
        &self,
        user: Option<&UserData>,
        candidate: &str,
    ) -> Result<Option<PrimaryKey>, DatabaseError> {
        if !self.check_password(candidate) {
            if let Some(user) = user {
                warn!("User {} tried to become admin with a wrong password", user.id);
            }

            return Ok(None);
        }

        let Some(user) = user else {
            return Ok(None);
        };

        let profile = self.db.create_admin_profile_once(user.id).await?;
        info!("User {} has admin profile {}", user.id, profile.id);

        Ok(Some(profile.id))
    }

    /// Returns true if the user has an admin profile
    pub async fn is_admin(&self, user: Option<&UserData>) -> Result<bool, DatabaseError> {
        let Some(user) = user else {
            return Ok(false);
        };

        let profile = self.db.admin_profile_by_user(user.id).await.optional()?;

        Ok(profile.is_some_and(|p| p.admin))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{MemoryDatabase, NewUser};

    async fn setup(password: Option<&str>) -> (AdminBootstrap, UserData) {
        let db: Arc<dyn Database> = Arc::new(MemoryDatabase::new());
        let user = db
            .create_user(NewUser {
                email: None,
                password: None,
            })
            .await
            .unwrap();

        (AdminBootstrap::new(&db, password.map(String::from)), user)
    }

    #[tokio::test]
    async fn test_wrong_password_never_creates_profile() {
        let (admin, user) = setup(Some("open sesame")).await;

        let first = admin.create_admin_profile(Some(&user), "guess").await.unwrap();
        let second = admin.create_admin_profile(Some(&user), "guess").await.unwrap();

        assert_eq!(first, None);
        assert_eq!(first, second);
        assert!(!admin.is_admin(Some(&user)).await.unwrap());
    }

    #[tokio::test]
    async fn test_correct_password_is_idempotent() {
        let (admin, user) = setup(Some("open sesame")).await;

        let first = admin
            .create_admin_profile(Some(&user), "open sesame")
            .await
            .unwrap();
        let second = admin
            .create_admin_profile(Some(&user), "open sesame")
            .await
            .unwrap();

        assert!(first.is_some());
        assert_eq!(first, second);
        assert!(admin.is_admin(Some(&user)).await.unwrap());
    }

    #[tokio::test]
    async fn test_requires_user() {
        let (admin, _) = setup(Some("open sesame")).await;

        let result = admin.create_admin_profile(None, "open sesame").await.unwrap();

        assert_eq!(result, None);
        assert!(!admin.is_admin(None).await.unwrap());
    }

    #[tokio::test]
    async fn test_unconfigured_password_refuses_everything() {
        let (admin, user) = setup(None).await;

        assert!(!admin.check_password(""));
        assert_eq!(
            admin.create_admin_profile(Some(&user), "").await.unwrap(),
            None
        );
    }
}
