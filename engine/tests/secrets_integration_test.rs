use reqlab_engine::agent::error_notice;
use reqlab_engine::secrets::{scrub, SecretManager};
use sdk::errors::EngineError;

#[test]
fn test_secret_manager_keychain_round_trip() {
    if std::env::var("CI").is_ok() {
        return; // Skip: no keyring in CI
    }
    let manager = SecretManager::new("reqlab-integration-test");

    let key = "reqlab_integration_test_key";
    manager
        .set_secret(key, "sk-test123456789")
        .expect("Failed to store secret");

    let retrieved = manager.get_secret(key).expect("Failed to retrieve secret");
    assert_eq!(retrieved, "sk-test123456789");
    assert!(manager.has_secret(key));
}

#[test]
fn test_missing_secret_names_env_var_and_command() {
    if std::env::var("CI").is_ok() {
        return; // Skip: no keyring in CI
    }
    let manager = SecretManager::new("reqlab-integration-test");

    match manager.get_secret("reqlab_never_stored_key") {
        Err(EngineError::SecretNotFound(msg)) => {
            assert!(msg.contains("REQLAB_NEVER_STORED_KEY"));
            assert!(msg.contains("reqlab key set"));
        }
        // Headless machines without a keychain daemon
        Err(EngineError::KeyringError(_)) => {}
        other => panic!("Expected SecretNotFound, got: {:?}", other),
    }
}

#[test]
fn test_env_var_wins_over_keychain() {
    std::env::set_var("REQLAB_INTEGRATION_ENV_KEY", "env-value");
    let manager = SecretManager::new("reqlab-integration-test");

    assert_eq!(
        manager.get_secret("reqlab_integration_env_key").unwrap(),
        "env-value"
    );
    std::env::remove_var("REQLAB_INTEGRATION_ENV_KEY");
}

#[test]
fn test_scrub_realistic_backend_errors() {
    let test_cases = vec![
        (
            "Error: Incorrect API key provided: sk-proj-1234567890abcdefghijklmnopqrstuvwxyz",
            "Error: Incorrect API key provided: [REDACTED]",
        ),
        (
            "Authorization header: Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiIxMjM0In0",
            "Authorization header: [REDACTED]",
        ),
        (
            "Access denied for key 0123456789abcdef0123456789abcdef",
            "Access denied for key [REDACTED]",
        ),
    ];

    for (input, expected) in test_cases {
        assert_eq!(scrub(input), expected, "Failed to scrub: {}", input);
    }
}

#[test]
fn test_scrub_preserves_chat_text() {
    let text = "BRD Draft:\n- Users: shop owners\n- Provider: ollama, model llama3.1:8b\nNEXT: SA";
    assert_eq!(scrub(text), text);
}

#[test]
fn test_error_notice_never_leaks_keys() {
    let notice = error_notice(&format!(
        "Authentication failed: api-key: {}",
        "0123456789abcdef0123456789abcdef"
    ));

    assert!(notice.contains("🛑 **(Error)**"));
    assert!(!notice.contains("0123456789abcdef0123456789abcdef"));
}
