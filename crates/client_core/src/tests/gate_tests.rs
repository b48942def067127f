use super::*;
use crate::session::Identity;
use shared::domain::Role;

fn gate() -> SessionGate {
    SessionGate::new(GatePolicy::default())
}

fn to(path: &str) -> RenderDecision {
    RenderDecision::Navigate {
        to: path.to_string(),
    }
}

#[test]
fn nothing_renders_before_first_evaluation() {
    let gate = gate();
    assert_eq!(gate.state(), GateState::Unknown);
    assert_eq!(gate.render_decision(), RenderDecision::Placeholder);
}

#[test]
fn unauthenticated_protected_path_redirects_to_login() {
    let mut gate = gate();
    assert_eq!(gate.on_navigation("/dashboard", false), to("/login"));
    assert_eq!(gate.state(), GateState::RedirectingToLogin);
    assert_eq!(gate.render_decision(), RenderDecision::Placeholder);
}

#[test]
fn authenticated_login_path_redirects_to_landing() {
    let mut gate = gate();
    assert_eq!(gate.on_navigation("/login", true), to("/dashboard"));
    assert_eq!(gate.state(), GateState::RedirectingToApp);
    assert_eq!(gate.render_decision(), RenderDecision::Placeholder);
}

#[test]
fn authenticated_protected_path_renders() {
    let mut gate = gate();
    assert_eq!(
        gate.on_navigation("/orders/new", true),
        RenderDecision::RenderScreen
    );
    assert_eq!(gate.state(), GateState::Authorized);
    assert_eq!(gate.render_decision(), RenderDecision::RenderScreen);
}

#[test]
fn unauthenticated_login_page_renders_without_looping() {
    let mut gate = gate();
    assert_eq!(gate.on_navigation("/login", false), RenderDecision::RenderScreen);
    assert_eq!(gate.state(), GateState::Authorized);
}

#[test]
fn query_strings_and_trailing_slashes_are_ignored() {
    let mut gate = gate();
    assert_eq!(
        gate.on_navigation("/login/?next=%2Forders", true),
        to("/dashboard")
    );
    assert_eq!(
        gate.on_navigation("orders/o-7/edit#items", false),
        to("/login")
    );
}

#[test]
fn custom_paths_come_from_settings() {
    let settings = ClientSettings {
        login_path: "/signin/".to_string(),
        landing_path: "inventory".to_string(),
        ..ClientSettings::default()
    };
    let mut gate = SessionGate::new(GatePolicy::from(&settings));

    assert_eq!(gate.on_navigation("/reports", false), to("/signin"));
    assert_eq!(gate.on_navigation("/signin", true), to("/inventory"));
}

#[tokio::test]
async fn sign_out_is_picked_up_on_next_evaluation() {
    let session = SessionStore::ephemeral();
    session
        .set_credential(
            "token",
            Identity {
                subject: "admin".to_string(),
                role: Role::Admin,
            },
        )
        .await
        .expect("credential");
    let mut gate = gate();

    assert_eq!(
        gate.evaluate("/suppliers", &session).await,
        RenderDecision::RenderScreen
    );

    session.clear().await.expect("clear");
    assert_eq!(gate.evaluate("/suppliers", &session).await, to("/login"));
    assert_eq!(gate.render_decision(), RenderDecision::Placeholder);
}

#[test]
fn inventory_decisions_follow_authentication() {
    let mut gate = gate();

    gate.on_navigation("/inventory", false);
    assert_eq!(gate.state(), GateState::RedirectingToLogin);

    gate.on_navigation("/login", true);
    assert_eq!(gate.state(), GateState::RedirectingToApp);

    gate.on_navigation("/inventory", true);
    assert_eq!(gate.state(), GateState::Authorized);
}
