use std::sync::Mutex;

/// Why the user is being sent back to the login screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginReason {
    SignedOut,
    SessionExpired,
    AccountDisabled,
    OAuthFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login { reason: LoginReason },
    Home,
}

/// Host-side router. The session layer only ever requests these two screens.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Keeps every requested route; useful for headless hosts and tests.
#[derive(Default)]
pub struct RouteHistory {
    routes: Mutex<Vec<Route>>,
}

impl RouteHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Route> {
        self.routes.lock().ok().and_then(|r| r.last().cloned())
    }
}

impl Navigator for RouteHistory {
    fn navigate(&self, route: Route) {
        tracing::debug!(?route, "Navigating");
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(route);
        }
    }
}
