use tracing::{debug, info};

use crate::{config::ClientSettings, session::SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unknown,
    Authorized,
    RedirectingToLogin,
    RedirectingToApp,
}

/// What the shell should do with the requested screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderDecision {
    RenderScreen,
    /// Render the neutral loading placeholder and nothing else.
    Placeholder,
    /// Show the placeholder and navigate to `to`.
    Navigate { to: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePolicy {
    pub login_path: String,
    pub landing_path: String,
    pub public_paths: Vec<String>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for GatePolicy {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            login_path: normalize_path(&settings.login_path),
            landing_path: normalize_path(&settings.landing_path),
            public_paths: vec![normalize_path(&settings.login_path)],
        }
    }
}

/// Decides render-vs-redirect on every navigation.
pub struct SessionGate {
    policy: GatePolicy,
    state: GateState,
}

impl SessionGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self {
            policy,
            state: GateState::Unknown,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Re-evaluates the gate for a path/credential change.
    ///
    /// The state moves before a decision is returned, so a screen is never
    /// released while the gate is still `Unknown` or mid-redirect.
    pub fn on_navigation(&mut self, path: &str, authenticated: bool) -> RenderDecision {
        let path = normalize_path(path);
        let is_public = self.policy.public_paths.iter().any(|p| *p == path);
        let is_login = path == self.policy.login_path;

        let (next, decision) = if !authenticated && !is_public {
            (
                GateState::RedirectingToLogin,
                RenderDecision::Navigate {
                    to: self.policy.login_path.clone(),
                },
            )
        } else if authenticated && is_login {
            (
                GateState::RedirectingToApp,
                RenderDecision::Navigate {
                    to: self.policy.landing_path.clone(),
                },
            )
        } else {
            (GateState::Authorized, RenderDecision::RenderScreen)
        };

        if next != self.state {
            info!(
                "gate: {:?} -> {:?} path={path} authenticated={authenticated}",
                self.state, next
            );
        } else {
            debug!("gate: stays {:?} path={path}", next);
        }
        self.state = next;
        decision
    }

    pub async fn evaluate(&mut self, path: &str, session: &SessionStore) -> RenderDecision {
        let authenticated = session.is_authenticated().await;
        self.on_navigation(path, authenticated)
    }

    /// Decision for the current state without a new navigation event.
    pub fn render_decision(&self) -> RenderDecision {
        match self.state {
            GateState::Authorized => RenderDecision::RenderScreen,
            GateState::Unknown | GateState::RedirectingToLogin | GateState::RedirectingToApp => {
                RenderDecision::Placeholder
            }
        }
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
#[path = "tests/gate_tests.rs"]
mod tests;
