// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! RLS context propagation tests against a live Postgres. Ignored by
//! default; run with a scratch database:
//!
//! ```text
//! DATABASE_URL=postgres://... cargo test -p citadel-core --test rls_context_tests -- --ignored
//! ```

use citadel_core::infrastructure::db::{
    DatabaseConfig, DatabaseManager, ExecutionMode, RlsContext,
};

fn config_from_env() -> Option<DatabaseConfig> {
    let url = std::env::var("DATABASE_URL").ok()?;
    Some(DatabaseConfig {
        database_url: url,
        ..Default::default()
    })
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch postgres"]
async fn rls_context_does_not_leak_across_calls() {
    let Some(config) = config_from_env() else {
        panic!("DATABASE_URL not set");
    };
    let db = DatabaseManager::connect(config, ExecutionMode::Pooled)
        .await
        .expect("connect");

    // A statement with RLS context sees its own user id.
    let seen: Option<String> = db
        .fetch_val(
            "SELECT current_setting('app.current_user_id', true)",
            vec![],
            Some(&RlsContext::user("user-a")),
        )
        .await
        .expect("rls query");
    assert_eq!(seen.as_deref(), Some("user-a"));

    // An immediately-following statement without RLS context must not
    // inherit it: set_config(..., true) is transaction-local and the
    // wrapping transaction committed.
    let leaked: Option<String> = db
        .fetch_val(
            "SELECT current_setting('app.current_user_id', true)",
            vec![],
            None,
        )
        .await
        .expect("plain query");
    assert!(
        leaked.as_deref().map(|s| s.is_empty()).unwrap_or(true),
        "RLS user id leaked across operations: {leaked:?}"
    );

    db.close().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a scratch postgres"]
async fn null_user_id_is_set_as_null_literal() {
    let Some(config) = config_from_env() else {
        panic!("DATABASE_URL not set");
    };
    let db = DatabaseManager::connect(config, ExecutionMode::Pooled)
        .await
        .expect("connect");

    let seen: Option<String> = db
        .fetch_val(
            "SELECT current_setting('app.current_user_id', true)",
            vec![],
            Some(&RlsContext::admin()),
        )
        .await
        .expect("rls query");
    // NULL set_config surfaces as an empty current_setting, never the
    // string "null" or an empty-string sentinel from our side.
    assert!(seen.as_deref().map(|s| s.is_empty()).unwrap_or(true));

    db.close().await;
}
