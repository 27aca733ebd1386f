//! End-to-end tests for privcheck wiring.
//!
//! # Purpose
//! Load configuration from the environment, build the application state from
//! real files, and evaluate has-privileges requests through it.
//!
//! # Concurrency + ordering guarantees
//! - Tests touching process environment run under `#[serial]`.
//! - Evaluations racing a reload see either the old file or the new one,
//!   never assignments from one and definitions from the other.
//!
//! # How to use
//! Run with `cargo test -p privcheck --test check`.
use privcheck::app::AppState;
use privcheck::config::PrivcheckConfig;
use serial_test::serial;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;
use warden_authz::{HasPrivilegesRequest, IndexPrivilegesCheck};

const ROLES: &str = r#"
roles:
  - name: test2
    cluster: [monitor]
    indices:
      - names: [academy]
        privileges: [index]
      - names: [initiative]
        privileges: [write]
users:
  test_user: [test2, missing_role]
"#;

struct EnvGuard {
    key: &'static str,
    prev: Option<String>,
}

impl EnvGuard {
    fn set(key: &'static str, value: &str) -> Self {
        let prev = std::env::var(key).ok();
        unsafe {
            std::env::set_var(key, value);
        }
        Self { key, prev }
    }

    fn unset(key: &'static str) -> Self {
        let prev = std::env::var(key).ok();
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, prev }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(value) => unsafe {
                std::env::set_var(self.key, value);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

fn write_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tempfile");
    file.write_all(contents.as_bytes()).expect("write");
    file
}

fn subset_request() -> HasPrivilegesRequest {
    HasPrivilegesRequest::new("test_user")
        .cluster_privileges(["monitor", "manage"])
        .index_privileges(IndexPrivilegesCheck::new(
            ["academy", "initiative", "school"],
            ["delete", "index", "manage"],
        ))
}

#[tokio::test]
#[serial]
async fn check_uses_env_configured_role_file() {
    let roles = write_file(ROLES);
    let _roles = EnvGuard::set("WARDEN_ROLES_FILE", roles.path().to_str().expect("path"));
    let _privileges = EnvGuard::unset("WARDEN_PRIVILEGES_FILE");
    let _timeout = EnvGuard::set("WARDEN_RESOLVE_TIMEOUT_MS", "750");
    let _config = EnvGuard::unset("WARDEN_CONFIG");

    let config = PrivcheckConfig::from_env_or_yaml().expect("config");
    assert_eq!(config.resolve_timeout, Duration::from_millis(750));
    let state = AppState::from_config(&config).await.expect("state");

    let response = state.check(&subset_request()).await.expect("check");
    assert!(!response.complete_match);
    assert_eq!(response.cluster("monitor"), Some(true));
    assert_eq!(response.cluster("manage"), Some(false));

    let academy = response.index("academy").expect("academy");
    assert_eq!(academy.get("index"), Some(true));
    assert_eq!(academy.get("delete"), Some(false));
    let initiative = response.index("initiative").expect("initiative");
    assert_eq!(initiative.get("delete"), Some(true));
    assert_eq!(initiative.get("manage"), Some(false));
    let school = response.index("school").expect("school");
    assert!(school.privileges.iter().all(|result| !result.granted));
}

#[tokio::test]
async fn reload_changes_later_evaluations() {
    let roles = write_file(ROLES);
    let config = PrivcheckConfig {
        roles_file: roles.path().to_path_buf(),
        ..PrivcheckConfig::default()
    };
    let state = AppState::from_config(&config).await.expect("state");
    let before = state.check(&subset_request()).await.expect("before");
    assert!(!before.complete_match);

    std::fs::write(
        roles.path(),
        "roles:\n  - name: test2\n    cluster: [all]\n    indices:\n      - names: [\"*\"]\n        privileges: [all]\nusers:\n  test_user: [test2]\n",
    )
    .expect("rewrite");
    state.roles.reload().await.expect("reload");

    let after = state.check(&subset_request()).await.expect("after");
    assert!(after.complete_match);
}

#[tokio::test]
async fn malformed_request_is_rejected() {
    let roles = write_file(ROLES);
    let config = PrivcheckConfig {
        roles_file: roles.path().to_path_buf(),
        ..PrivcheckConfig::default()
    };
    let state = AppState::from_config(&config).await.expect("state");
    let err = state
        .check(&HasPrivilegesRequest::new("").cluster_privileges(["monitor"]))
        .await
        .expect_err("malformed");
    assert!(format!("{err:#}").contains("malformed request"));
}

#[tokio::test]
async fn missing_role_file_fails_startup() {
    let config = PrivcheckConfig {
        roles_file: "/nonexistent/roles.yml".into(),
        ..PrivcheckConfig::default()
    };
    assert!(AppState::from_config(&config).await.is_err());
}

const ALICE_MONITORS: &str = "roles:\n  - name: admin\n    cluster: [monitor]\nusers:\n  alice: [admin]\n";
const BOB_ADMINISTERS: &str = "roles:\n  - name: admin\n    cluster: [all]\nusers:\n  bob: [admin]\n";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn evaluations_during_reload_use_one_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("roles.yml");
    std::fs::write(&path, ALICE_MONITORS).expect("write");
    let config = PrivcheckConfig {
        roles_file: path.clone(),
        ..PrivcheckConfig::default()
    };
    let state = Arc::new(AppState::from_config(&config).await.expect("state"));
    let stop = Arc::new(AtomicBool::new(false));
    let request = HasPrivilegesRequest::new("alice").cluster_privileges(["monitor", "manage"]);

    let mut checkers = Vec::new();
    for _ in 0..3 {
        let state = state.clone();
        let stop = stop.clone();
        let request = request.clone();
        checkers.push(tokio::spawn(async move {
            let mut checks = 0usize;
            loop {
                let response = state.check(&request).await.expect("check");
                assert_eq!(response.cluster("manage"), Some(false));
                checks += 1;
                if stop.load(Ordering::Relaxed) {
                    return checks;
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    let staging = dir.path().join("roles.yml.next");
    for round in 0..200 {
        let contents = if round % 2 == 0 {
            BOB_ADMINISTERS
        } else {
            ALICE_MONITORS
        };
        std::fs::write(&staging, contents).expect("stage");
        std::fs::rename(&staging, &path).expect("swap");
        state.roles.reload().await.expect("reload");
        tokio::task::yield_now().await;
    }
    stop.store(true, Ordering::Relaxed);

    for checker in checkers {
        assert!(checker.await.expect("checker") > 0);
    }
}
