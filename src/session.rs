use thiserror::Error;
use tracing::{info, warn};

use crate::core::auth::AuthError;
use crate::core::db::UserRepository;
use crate::history::HistoryStore;
use crate::input::InputImage;
use crate::models::DetectionRecord;
use crate::pipeline::{DetectionPipeline, PipelineError};

pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_NAME: &str = "Admin";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Credential store error: {0:#}")]
    Storage(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated { username: String, name: String },
}

/// State of one user session: who is signed in and what they detected.
///
/// Created by the shell at session start and dropped at session end; the
/// history does not outlive it.
#[derive(Debug)]
pub struct Session {
    auth: AuthState,
    login_required: bool,
    history: HistoryStore,
}

impl Session {
    /// Session that must log in before detecting
    pub fn anonymous() -> Self {
        Self {
            auth: AuthState::Anonymous,
            login_required: true,
            history: HistoryStore::new(),
        }
    }

    /// Session signed in as the default admin, used when login is disabled
    pub fn with_default_admin() -> Self {
        Self {
            auth: AuthState::Authenticated {
                username: DEFAULT_USERNAME.to_string(),
                name: DEFAULT_NAME.to_string(),
            },
            login_required: false,
            history: HistoryStore::new(),
        }
    }

    pub fn new(enable_login: bool) -> Self {
        if enable_login {
            Self::anonymous()
        } else {
            Self::with_default_admin()
        }
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth, AuthState::Authenticated { .. })
    }

    /// Display name of the signed-in user
    pub fn display_name(&self) -> Option<&str> {
        match &self.auth {
            AuthState::Authenticated { name, .. } => Some(name),
            AuthState::Anonymous => None,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Check credentials against `users` and sign in on success
    pub async fn login<R: UserRepository>(
        &mut self,
        users: &R,
        username: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        let verified = users
            .verify_user(username, password)
            .await
            .map_err(|e| match e.downcast::<AuthError>() {
                Ok(auth) => SessionError::Auth(auth),
                Err(e) => SessionError::Storage(e),
            })?;
        match verified {
            Some(user) => {
                info!("User {} logged in", user.username);
                self.auth = AuthState::Authenticated {
                    username: user.username,
                    name: user.name,
                };
                Ok(())
            }
            None => {
                warn!("Failed login for {}", username);
                Err(AuthError::InvalidCredentials.into())
            }
        }
    }

    pub fn logout(&mut self) {
        if let AuthState::Authenticated { username, .. } = &self.auth {
            info!("User {} logged out", username);
        }
        self.auth = AuthState::Anonymous;
    }

    /// Run detection and record the result.
    ///
    /// History only changes when the run succeeds.
    pub fn detect(
        &mut self,
        pipeline: &DetectionPipeline,
        input: InputImage,
        confidence_threshold: f32,
    ) -> Result<&DetectionRecord, SessionError> {
        if self.login_required && !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated.into());
        }

        let record = pipeline.run(input, confidence_threshold)?;
        Ok(self.history.append(record))
    }
}
