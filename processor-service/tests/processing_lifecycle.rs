use std::sync::Arc;

use messaging_core::broker::apply_event;
use messaging_core::UnitOfWork;
use processor_service::handler::HandleOrderCreatedHandler;
use processor_service::policy::{DefaultPolicy, ProcessingPolicy};
use processor_service::use_cases::handle_order_created::{
    handle_order_created, OrderCreatedEvent, OrderItem,
};
use sqlx::PgPool;

fn event(order_id: &str, sku: &str) -> OrderCreatedEvent {
    OrderCreatedEvent {
        order_id: order_id.into(),
        customer_id: "c-1".into(),
        items: vec![OrderItem {
            sku: sku.into(),
            quantity: 1,
            price: 15.0,
        }],
        amount: 15.0,
        version: 0,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn embargoed_sku_yields_a_failed_order_processed_event(pool: PgPool) {
    let policy: Box<dyn ProcessingPolicy> = Box::new(DefaultPolicy::new(
        vec!["pineapple_pizza".into()],
        0.8,
    ));

    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    handle_order_created(&mut uow, event("ord-embargo", "pineapple_pizza"), policy.as_ref())
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let row: (String, serde_json::Value) =
        sqlx::query_as("SELECT event_type, payload FROM outbox WHERE event_type = 'order.processed'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(row.0, "order.processed");
    assert_eq!(row.1["status"], "failed");
    assert!(row.1["fail_reason"].as_str().unwrap().starts_with("embargo:"));
}

#[sqlx::test(migrations = "./migrations")]
async fn non_embargoed_order_always_succeeds_under_probability_one(pool: PgPool) {
    let policy: Box<dyn ProcessingPolicy> = Box::new(DefaultPolicy::new(vec![], 1.0));

    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    handle_order_created(&mut uow, event("ord-ok", "widget"), policy.as_ref())
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let row: (serde_json::Value,) =
        sqlx::query_as("SELECT payload FROM outbox WHERE event_type = 'order.processed'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(row.0["status"], "success");
    assert_eq!(row.0["version"], 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn redelivering_order_created_through_the_consumer_pipeline_applies_once(pool: PgPool) {
    let policy: Arc<dyn ProcessingPolicy> = Arc::new(DefaultPolicy::new(vec![], 1.0));
    let handler = HandleOrderCreatedHandler::new(policy);

    let body = br#"{"order_id":"ord-redelivered","customer_id":"c-1","items":[{"sku":"widget","quantity":1,"price":15.0}],"amount":15.0,"version":0}"#;

    apply_event(&pool, &handler, body).await.unwrap();
    apply_event(&pool, &handler, body).await.unwrap();

    let attempt_count: i32 = sqlx::query_scalar(
        "SELECT attempt_count FROM processing_states WHERE order_id = 'ord-redelivered'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(attempt_count, 1, "redelivery of the same event_key must not be re-applied");

    let outbox_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM outbox WHERE event_type = 'order.processed'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(outbox_rows, 1, "exactly one order.processed emission for N redeliveries");

    let inbox_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM processed_inbox WHERE event_key = 'order.created:ord-redelivered:0'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(inbox_rows, 1);
}
