//! Exercises the literal end-to-end scenarios around order creation and
//! apply-processed convergence against a real, migrated Postgres database.
//! Requires a reachable Postgres (via `sqlx::test`'s `DATABASE_URL`).

use std::sync::Arc;

use messaging_core::broker::apply_event;
use messaging_core::metrics::CoreMetrics;
use order_service::domain::LineItem;
use order_service::handler::ApplyProcessedHandler;
use order_service::use_cases::apply_processed::{apply_processed, OrderProcessedEvent};
use order_service::use_cases::create_order::{create_order, CreateOrderInput};
use sqlx::PgPool;

fn items() -> Vec<LineItem> {
    vec![
        LineItem { sku: "laptop".into(), quantity: 1, price: 1200.0 },
        LineItem { sku: "mouse".into(), quantity: 2, price: 25.0 },
    ]
}

#[sqlx::test(migrations = "./migrations")]
async fn creating_the_same_order_twice_is_idempotent(pool: PgPool) {
    let input = CreateOrderInput {
        order_id: "ord-1".into(),
        customer_id: "c-1".into(),
        items: items(),
    };

    let (first, created_first) = create_order(&pool, input).await.unwrap();
    assert!(created_first);
    assert_eq!(first.total_amount, 1250.0);
    assert_eq!(first.version, 0);

    let input_again = CreateOrderInput {
        order_id: "ord-1".into(),
        customer_id: "c-1".into(),
        items: items(),
    };
    let (second, created_second) = create_order(&pool, input_again).await.unwrap();
    assert!(!created_second);
    assert_eq!(second.order_id, first.order_id);

    let outbox_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE event_type = 'order.created'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(outbox_rows, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn apply_processed_converges_to_the_highest_version(pool: PgPool) {
    let input = CreateOrderInput {
        order_id: "ord-2".into(),
        customer_id: "c-1".into(),
        items: items(),
    };
    create_order(&pool, input).await.unwrap();

    let mut uow = messaging_core::UnitOfWork::begin(&pool).await.unwrap();
    apply_processed(
        &mut uow,
        OrderProcessedEvent {
            order_id: "ord-2".into(),
            status: "success".into(),
            fail_reason: None,
            version: 1,
        },
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    let order = {
        let mut uow = messaging_core::UnitOfWork::begin(&pool).await.unwrap();
        let order = order_service::repository::get_by_id(uow.tx_mut(), "ord-2").await.unwrap().unwrap();
        uow.commit().await.unwrap();
        order
    };
    assert_eq!(order.status.as_str(), "done");
    assert_eq!(order.version, 1);

    // A stale redelivery (version 0, after version 1 has already been applied) is a no-op.
    let mut uow = messaging_core::UnitOfWork::begin(&pool).await.unwrap();
    apply_processed(
        &mut uow,
        OrderProcessedEvent {
            order_id: "ord-2".into(),
            status: "failed".into(),
            fail_reason: Some("should not apply".into()),
            version: 0,
        },
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    let mut uow = messaging_core::UnitOfWork::begin(&pool).await.unwrap();
    let order = order_service::repository::get_by_id(uow.tx_mut(), "ord-2").await.unwrap().unwrap();
    uow.commit().await.unwrap();
    assert_eq!(order.status.as_str(), "done");
    assert_eq!(order.version, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn redelivering_order_processed_through_the_consumer_pipeline_applies_once(pool: PgPool) {
    let input = CreateOrderInput {
        order_id: "ord-redelivered".into(),
        customer_id: "c-1".into(),
        items: items(),
    };
    create_order(&pool, input).await.unwrap();

    let registry = prometheus::Registry::new();
    let metrics = Arc::new(CoreMetrics::new(&registry));
    let handler = ApplyProcessedHandler::new(metrics);

    let body = br#"{"order_id":"ord-redelivered","status":"success","fail_reason":null,"version":1}"#;

    apply_event(&pool, &handler, body).await.unwrap();
    apply_event(&pool, &handler, body).await.unwrap();

    let mut uow = messaging_core::UnitOfWork::begin(&pool).await.unwrap();
    let order = order_service::repository::get_by_id(uow.tx_mut(), "ord-redelivered")
        .await
        .unwrap()
        .unwrap();
    uow.commit().await.unwrap();
    assert_eq!(order.status.as_str(), "done");
    assert_eq!(order.version, 1);

    let inbox_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM processed_inbox WHERE event_key = 'order.processed:ord-redelivered:1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(inbox_rows, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn apply_processed_for_an_unknown_order_is_a_tolerated_no_op(pool: PgPool) {
    let mut uow = messaging_core::UnitOfWork::begin(&pool).await.unwrap();
    let result = apply_processed(
        &mut uow,
        OrderProcessedEvent {
            order_id: "ord-never-created".into(),
            status: "success".into(),
            fail_reason: None,
            version: 1,
        },
    )
    .await;
    assert!(result.is_ok());
    uow.commit().await.unwrap();
}
