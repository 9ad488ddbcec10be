use super::{HospitalService, Session};
use crate::adapters::StorageError;
use crate::domain::{Role, User, DEFAULT_PASSWORD};
use crate::ports::{Notifier, Storage};
use crate::{Result, WardbookError};

impl<S, N> HospitalService<S, N>
where
    S: Storage,
    S::Error: Into<StorageError>,
    N: Notifier,
{
    /// Log in as `role`.
    ///
    /// # Errors
    /// Returns [`WardbookError::InvalidCredentials`] for an unknown ID, a
    /// role mismatch or a wrong password alike.
    pub fn authenticate(&self, role: Role, hospital_id: &str, password: &str) -> Result<Session> {
        let reg = self.registry()?;
        let user = reg
            .user(hospital_id.trim())
            .filter(|u| u.role == role && u.verify_password(password))
            .ok_or_else(|| {
                tracing::warn!("Failed {} login for {}", role, hospital_id.trim());
                WardbookError::InvalidCredentials
            })?;

        tracing::info!("{} {} logged in", role, user.hospital_id);
        Ok(Session {
            hospital_id: user.hospital_id.clone(),
            name: user.name.clone(),
            role,
        })
    }

    /// Whether the session's account still uses the default password.
    ///
    /// # Errors
    /// Returns error if the account no longer exists.
    pub fn must_change_password(&self, session: &Session) -> Result<bool> {
        let reg = self.registry()?;
        reg.user(&session.hospital_id)
            .map(User::uses_default_password)
            .ok_or_else(|| WardbookError::not_found("User", &session.hospital_id))
    }

    /// Replace the session's password after checking the current one.
    ///
    /// # Errors
    /// Returns error if `current` is wrong, or `new` is empty or the default.
    pub fn change_password(&self, session: &Session, current: &str, new: &str) -> Result<()> {
        if new.trim().is_empty() {
            return Err(WardbookError::Conflict("New password must not be blank".into()));
        }
        if new == DEFAULT_PASSWORD {
            return Err(WardbookError::Conflict(
                "New password must differ from the default password".into(),
            ));
        }

        self.commit(|reg| {
            let user = reg
                .users
                .iter_mut()
                .find(|u| u.hospital_id == session.hospital_id)
                .ok_or_else(|| WardbookError::not_found("User", &session.hospital_id))?;
            if !user.verify_password(current) {
                return Err(WardbookError::InvalidCredentials);
            }
            user.set_password(new);
            Ok(())
        })?;
        tracing::info!("Password changed for {}", session.hospital_id);
        Ok(())
    }

    /// The session's own account.
    ///
    /// # Errors
    /// Returns error if the account no longer exists.
    pub fn profile(&self, session: &Session) -> Result<User> {
        let reg = self.registry()?;
        reg.user(&session.hospital_id)
            .cloned()
            .ok_or_else(|| WardbookError::not_found("User", &session.hospital_id))
    }
}
