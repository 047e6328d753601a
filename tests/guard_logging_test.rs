//! Log records written by the call guard and the connection handle.
//!
//! Kept to a single test so the thread-local subscriber is the only one
//! installed in this test binary.

mod common;

use common::{LogCapture, ScriptedDriver, params};
use resilient_db::db::{Database, DriverFault, RetryPolicy};
use resilient_db::error::{DbError, ER_NO_SUCH_TABLE, ER_PARSE_ERROR};
use resilient_db::run_guarded;
use tracing::Level;

#[tokio::test]
async fn test_guard_log_records() {
    let capture = LogCapture::default();
    let _guard = capture.install();

    // Success: value unchanged, nothing logged
    let value = run_guarded(|| async { Ok::<_, DbError>("X") }, "fallback").await;
    assert_eq!(value, "X");
    assert_eq!(capture.count(), 0);

    // Missing table: sentinel, one info record
    let value: Option<&str> = run_guarded(
        || async {
            Err(DbError::MissingSchemaObject {
                code: ER_NO_SUCH_TABLE,
                message: "Table 'app.jobs' doesn't exist".to_string(),
            })
        },
        None,
    )
    .await;
    assert_eq!(value, None);
    let events = capture.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, Level::INFO);
    capture.clear();

    // Other programming fault: sentinel, one error record
    let value = run_guarded(
        || async {
            Err::<i32, _>(DbError::Syntax {
                code: ER_PARSE_ERROR,
                message: "near 'SELEC'".to_string(),
            })
        },
        -1,
    )
    .await;
    assert_eq!(value, -1);
    let events = capture.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, Level::ERROR);
    capture.clear();

    // Operational fault: sentinel, one error record
    let value = run_guarded(
        || async { Err::<i32, _>(DbError::connection_lost("gone")) },
        -1,
    )
    .await;
    assert_eq!(value, -1);
    let events = capture.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, Level::ERROR);
    capture.clear();

    // Through a real handle: the handle's own debug record for the syntax
    // error plus exactly one record from the guard
    let driver = ScriptedDriver::new().then_execute(vec![Err(DriverFault::programming(
        Some(ER_PARSE_ERROR),
        "You have an error in your SQL syntax",
    ))]);
    let db = Database::new(driver.clone(), params("app"))
        .with_retry_policy(RetryPolicy::default().without_backoff());
    db.connect().await;
    capture.clear();

    let db = &db;
    let rows = run_guarded(
        move || async move {
            db.query("SELEC 1", &[]).await?;
            Ok::<_, DbError>(Some(1))
        },
        None,
    )
    .await;
    assert_eq!(rows, None);
    let levels: Vec<Level> = capture.events().into_iter().map(|(level, _)| level).collect();
    assert_eq!(levels, vec![Level::DEBUG, Level::ERROR]);
    capture.clear();

    // Unknown column at the handle itself: exactly one error record
    let driver = ScriptedDriver::new().then_execute(vec![Err(DriverFault::programming(
        Some(1054),
        "Unknown column 'nope' in 'field list'",
    ))]);
    let handle = Database::new(driver.clone(), params("app"));
    handle.connect().await;
    capture.clear();

    let err = handle.query("SELECT nope FROM jobs", &[]).await.err().unwrap();
    assert!(matches!(err, DbError::Programming { code: 1054, .. }));
    let levels: Vec<Level> = capture.events().into_iter().map(|(level, _)| level).collect();
    assert_eq!(levels, vec![Level::ERROR]);
    assert_eq!(driver.executions(), 1);
}
