//! Session lifecycle: restore, sign in, sign out.
//!
//! [`SessionManager`] is the only reader and writer of the `token` and
//! `userData` cookies. State changes are published on a watch channel so
//! the route guard (and any view) can react to transitions instead of
//! polling.
//!
//! ```text
//! Restoring ──restore──▶ Authenticated ◀──signin── Unauthenticated
//!     └──────restore──────────────────────────────────▶ ▲
//!                        Authenticated ──logout──────────┘
//! ```

use std::sync::Arc;

use libradmin_types::{AuthUser, LoginCredentials, LoginData, PasswordReset};
use reqwest::StatusCode;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::notify::{Notice, Notifier};
use crate::routes::{Navigator, Route};
use crate::storage::{CookieJar, CookieOptions};
use crate::validation::{self, ResetPasswordForm};

pub const TOKEN_COOKIE: &str = "token";
pub const USER_COOKIE: &str = "userData";

const SIGNIN_PENDING: &str = "Validando credenciales...";
const SIGNIN_DONE: &str = "Sesión iniciada";
const SENDING: &str = "Enviando...";
const RESET_LINK_SENT: &str = "Correo enviado";
const PASSWORD_UPDATED: &str = "Contraseña actualizada con éxito";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Persisted state not read yet.
    Restoring,
    Unauthenticated,
    Authenticated(AuthUser),
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    phase: SessionPhase,
    form_loading: bool,
}

impl SessionState {
    pub fn restoring() -> Self {
        Self {
            phase: SessionPhase::Restoring,
            form_loading: false,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            phase: SessionPhase::Unauthenticated,
            form_loading: false,
        }
    }

    pub fn authenticated(user: AuthUser) -> Self {
        Self {
            phase: SessionPhase::Authenticated(user),
            form_loading: false,
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// True until the persisted session has been read.
    pub fn loading(&self) -> bool {
        matches!(self.phase, SessionPhase::Restoring)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.phase, SessionPhase::Authenticated(_))
    }

    pub fn user(&self) -> Option<&AuthUser> {
        match &self.phase {
            SessionPhase::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// True while a sign-in request is outstanding.
    pub fn form_loading(&self) -> bool {
        self.form_loading
    }
}

pub struct SessionManager {
    api: ApiClient,
    cookies: CookieJar,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(
        api: ApiClient,
        cookies: CookieJar,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::restoring());
        Self {
            api,
            cookies,
            navigator,
            notifier,
            state,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.state.borrow().user().cloned()
    }

    /// Bearer token from the cookie jar, if present and unexpired.
    pub fn token(&self) -> Option<String> {
        self.read_cookie(TOKEN_COOKIE)
    }

    /// Reads the persisted session. Call once at start.
    ///
    /// Both cookies must be present and the user record must parse; a
    /// corrupt user record is discarded together with its token. The token
    /// itself is not re-validated against the server.
    pub fn restore_session(&self) -> SessionState {
        let token = self.read_cookie(TOKEN_COOKIE);
        let user_data = self.read_cookie(USER_COOKIE);

        let phase = match (token, user_data) {
            (Some(_), Some(raw)) => match serde_json::from_str::<AuthUser>(&raw) {
                Ok(user) => {
                    info!(user = %user.username, "session restored");
                    SessionPhase::Authenticated(user)
                }
                Err(err) => {
                    warn!(error = %err, "discarding unreadable persisted user");
                    self.clear_cookies();
                    SessionPhase::Unauthenticated
                }
            },
            _ => {
                debug!("no persisted session");
                SessionPhase::Unauthenticated
            }
        };

        self.state.send_modify(|state| state.phase = phase);
        self.state()
    }

    /// Authenticates, persists the session for one day and navigates to the
    /// dashboard.
    ///
    /// Concurrent calls are not deduplicated; callers disable their trigger
    /// while [`SessionState::form_loading`] is set.
    ///
    /// # Errors
    /// Returns a validation error without contacting the server, or the
    /// classified request failure (already surfaced to the notifier).
    pub async fn signin(&self, credentials: &LoginCredentials) -> ClientResult<AuthUser> {
        validation::ensure_valid(validation::login(credentials))?;
        let credentials = LoginCredentials {
            username: credentials.username.trim().to_string(),
            password: credentials.password.trim().to_string(),
        };

        self.state.send_modify(|state| state.form_loading = true);
        self.notifier.notify(Notice::loading(SIGNIN_PENDING));

        match self.authenticate(&credentials).await {
            Ok((user, message)) => {
                info!(user = %user.username, role = %user.role, "signed in");
                let signed_in = user.clone();
                self.state.send_modify(|state| {
                    state.phase = SessionPhase::Authenticated(signed_in);
                    state.form_loading = false;
                });
                self.notifier.notify(Notice::success(message));
                self.navigator.navigate(Route::Dashboard);
                Ok(user)
            }
            Err(err) => {
                self.state.send_modify(|state| {
                    state.phase = SessionPhase::Unauthenticated;
                    state.form_loading = false;
                });
                self.notifier.notify(Notice::error(err.user_message()));
                Err(err)
            }
        }
    }

    async fn authenticate(&self, credentials: &LoginCredentials) -> ClientResult<(AuthUser, String)> {
        let (status, envelope) = self.api.login(credentials).await?;
        if status != StatusCode::OK {
            return Err(ClientError::internal(format!(
                "unexpected login status {status}"
            )));
        }

        let LoginData { token, user } = envelope.data;
        if let Err(err) = self.persist(&token, &user) {
            self.clear_cookies();
            return Err(err);
        }

        let message = envelope
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| SIGNIN_DONE.to_string());
        Ok((user, message))
    }

    fn persist(&self, token: &str, user: &AuthUser) -> ClientResult<()> {
        let user_json = serde_json::to_string(user)
            .map_err(|err| ClientError::internal(format!("serialize user: {err}")))?;
        self.cookies
            .set(TOKEN_COOKIE, token, CookieOptions::session_day())?;
        self.cookies
            .set(USER_COOKIE, &user_json, CookieOptions::session_day())?;
        Ok(())
    }

    /// Drops the persisted session and navigates to login. Local only.
    pub fn logout(&self) {
        self.clear_cookies();
        self.state.send_modify(|state| {
            state.phase = SessionPhase::Unauthenticated;
            state.form_loading = false;
        });
        info!("signed out");
        self.navigator.navigate(Route::Login);
    }

    /// Asks the server to e-mail a password reset link.
    ///
    /// # Errors
    /// Returns a validation error or the classified request failure.
    pub async fn request_password_reset(&self, email: &str) -> ClientResult<String> {
        validation::ensure_valid(validation::email(email))?;
        self.notifier.notify(Notice::loading(SENDING));

        match self.api.request_password_reset(email.trim()).await {
            Ok(reply) => {
                let message = reply.text().unwrap_or(RESET_LINK_SENT).to_string();
                self.notifier.notify(Notice::success(message.clone()));
                Ok(message)
            }
            Err(err) => {
                self.notifier.notify(Notice::error(err.user_message()));
                Err(err)
            }
        }
    }

    /// Sets a new password for `email` after checking the confirmation.
    ///
    /// # Errors
    /// Returns a validation error or the classified request failure.
    pub async fn reset_password(&self, email: &str, form: &ResetPasswordForm) -> ClientResult<String> {
        let mut errors = validation::email(email);
        errors.extend(form.validate());
        validation::ensure_valid(errors)?;

        let reset = PasswordReset {
            email: email.trim().to_string(),
            password: form.password.trim().to_string(),
        };
        match self.api.reset_password(&reset).await {
            Ok(_) => {
                self.notifier.notify(Notice::success(PASSWORD_UPDATED));
                Ok(PASSWORD_UPDATED.to_string())
            }
            Err(err) => {
                self.notifier.notify(Notice::error(err.user_message()));
                Err(err)
            }
        }
    }

    fn read_cookie(&self, name: &str) -> Option<String> {
        match self.cookies.get(name) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                warn!(cookie = name, error = ?err, "cookie jar unreadable");
                None
            }
        }
    }

    fn clear_cookies(&self) {
        for name in [TOKEN_COOKIE, USER_COOKIE] {
            if let Err(err) = self.cookies.remove(name) {
                warn!(cookie = name, error = ?err, "removing cookie failed, clearing jar");
                if let Err(err) = self.cookies.clear() {
                    warn!(error = ?err, "clearing cookie jar failed");
                }
                return;
            }
        }
    }
}
