//! Console routes, navigation commands and the protected-area guard.
//!
//! Navigation is an effect: the guard observes session state through a
//! watch channel and, once restoration has finished, issues at most one
//! redirect to the login route through the injected [`Navigator`].

use std::fmt;
use std::sync::{Arc, Mutex};

use libradmin_types::{AuthUser, Entity};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    ResetPassword,
    Dashboard,
    Authors,
    Subjects,
    Books,
    Students,
    Users,
    Loans,
}

impl Route {
    const ALL: [Route; 10] = [
        Route::Home,
        Route::Login,
        Route::ResetPassword,
        Route::Dashboard,
        Route::Authors,
        Route::Subjects,
        Route::Books,
        Route::Students,
        Route::Users,
        Route::Loans,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/auth/login",
            Route::ResetPassword => "/reset-password",
            Route::Dashboard => "/library/admin/dashboard",
            Route::Authors => "/library/admin/author",
            Route::Subjects => "/library/admin/subject",
            Route::Books => "/library/admin/book",
            Route::Students => "/library/admin/student",
            Route::Users => "/library/admin/user",
            Route::Loans => "/library/admin/loan",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        let path = if path.is_empty() { "/" } else { path };
        Self::ALL.into_iter().find(|r| r.path() == path)
    }

    /// Admin view managing `entity`.
    pub fn for_entity(entity: Entity) -> Self {
        match entity {
            Entity::Author => Route::Authors,
            Entity::Subject => Route::Subjects,
            Entity::Book => Route::Books,
            Entity::Student => Route::Students,
            Entity::User => Route::Users,
            Entity::Loan => Route::Loans,
        }
    }

    /// Routes that require an authenticated session.
    pub fn is_protected(self) -> bool {
        self.path().starts_with("/library/admin/")
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Receives navigation commands. A navigation replaces the current view.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Remembers every navigation; handy for headless embedders and tests.
#[derive(Debug, Default)]
pub struct NavigationLog {
    routes: Mutex<Vec<Route>>,
}

impl NavigationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Route> {
        self.routes().last().copied()
    }
}

impl Navigator for NavigationLog {
    fn navigate(&self, route: Route) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(route);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still restoring; nothing rendered, nothing decided.
    Pending,
    /// Render the protected view for this user.
    Allow(AuthUser),
    /// Sent to login.
    Redirected,
}

/// Gate in front of the protected area.
pub struct RouteGuard {
    navigator: Arc<dyn Navigator>,
    redirected: bool,
}

impl RouteGuard {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            redirected: false,
        }
    }

    /// Evaluates one observed state.
    ///
    /// The login redirect is emitted once per unauthenticated stretch; an
    /// authenticated observation re-arms it.
    pub fn evaluate(&mut self, state: &SessionState) -> GuardDecision {
        if state.loading() {
            return GuardDecision::Pending;
        }

        match state.user() {
            Some(user) => {
                self.redirected = false;
                GuardDecision::Allow(user.clone())
            }
            None => {
                if !self.redirected {
                    self.redirected = true;
                    info!("protected area entered without a session, redirecting to login");
                    self.navigator.navigate(Route::Login);
                }
                GuardDecision::Redirected
            }
        }
    }

    /// Waits for session restoration to finish, then decides.
    ///
    /// If the session publisher goes away while still restoring, the last
    /// observed state is final.
    pub async fn admit(&mut self, mut states: watch::Receiver<SessionState>) -> GuardDecision {
        loop {
            let state = states.borrow_and_update().clone();
            match self.evaluate(&state) {
                GuardDecision::Pending => {
                    debug!("guard waiting for session restore");
                    if states.changed().await.is_err() {
                        return GuardDecision::Pending;
                    }
                }
                decision => return decision,
            }
        }
    }
}
