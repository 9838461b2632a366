//! AMQP 0-9-1 topology declaration and the generic consumer pipeline.
//!
//! The exchange/queue/DLX layout is bit-exact per the external interface
//! contract: a topic exchange for live traffic, a topic exchange for dead
//! letters, one durable queue per routing key with `x-dead-letter-exchange`
//! / `x-dead-letter-routing-key` arguments pointing at the DLX, and one
//! bound DLQ per routing key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::inbox;
use crate::outbox::OutboxPublisher;
use crate::uow::UnitOfWork;

pub const EXCHANGE: &str = "orders.events";
pub const DLX_EXCHANGE: &str = "orders.events.dlx";

/// One queue/routing-key pair the topology declares, e.g. `order.created`.
#[derive(Debug, Clone, Copy)]
pub struct RoutingKey(pub &'static str);

impl RoutingKey {
    pub fn queue_name(&self) -> String {
        format!("{}.q", self.0)
    }

    pub fn dlq_name(&self) -> String {
        format!("{}.dlq", self.0)
    }

    pub fn dlq_routing_key(&self) -> String {
        format!("{}.dlq", self.0)
    }
}

pub const ORDER_CREATED: RoutingKey = RoutingKey("order.created");
pub const ORDER_PROCESSED: RoutingKey = RoutingKey("order.processed");

/// Opens a connection and declares the full topology: both exchanges, the
/// live queue and DLQ for every routing key passed in. Safe to call on every
/// boot — all declarations are idempotent.
pub async fn connect_and_declare(
    broker_url: &str,
    routing_keys: &[RoutingKey],
) -> CoreResult<(Connection, Channel)> {
    let conn = Connection::connect(broker_url, ConnectionProperties::default())
        .await
        .map_err(CoreError::Broker)?;
    let channel = conn.create_channel().await.map_err(CoreError::Broker)?;

    channel
        .exchange_declare(
            EXCHANGE,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(CoreError::Broker)?;

    channel
        .exchange_declare(
            DLX_EXCHANGE,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(CoreError::Broker)?;

    for key in routing_keys {
        let mut queue_args = FieldTable::default();
        queue_args.insert(
            ShortString::from("x-dead-letter-exchange"),
            AMQPValue::LongString(DLX_EXCHANGE.into()),
        );
        queue_args.insert(
            ShortString::from("x-dead-letter-routing-key"),
            AMQPValue::LongString(key.dlq_routing_key().into()),
        );

        channel
            .queue_declare(
                &key.queue_name(),
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                queue_args,
            )
            .await
            .map_err(CoreError::Broker)?;

        channel
            .queue_bind(
                &key.queue_name(),
                EXCHANGE,
                key.0,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(CoreError::Broker)?;

        channel
            .queue_declare(
                &key.dlq_name(),
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(CoreError::Broker)?;

        channel
            .queue_bind(
                &key.dlq_name(),
                DLX_EXCHANGE,
                &key.dlq_routing_key(),
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(CoreError::Broker)?;
    }

    info!(routing_keys = ?routing_keys.iter().map(|k| k.0).collect::<Vec<_>>(), "broker topology declared");

    Ok((conn, channel))
}

/// The outbox-publisher side of the broker: publishes to the live exchange
/// or, on retry exhaustion, to the DLX with an `x-death-reason` header.
pub struct LapinOutboxPublisher {
    channel: Channel,
}

impl LapinOutboxPublisher {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl OutboxPublisher for LapinOutboxPublisher {
    async fn publish(&self, routing_key: &str, message_id: &str, payload: &[u8]) -> CoreResult<()> {
        let props = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2)
            .with_message_id(message_id.into());

        self.channel
            .basic_publish(
                EXCHANGE,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                props,
            )
            .await
            .map_err(CoreError::Broker)?
            .await
            .map_err(CoreError::Broker)?;

        Ok(())
    }

    async fn publish_to_dlq(
        &self,
        routing_key: &str,
        message_id: &str,
        payload: &[u8],
        death_reason: &str,
    ) -> CoreResult<()> {
        let mut headers = FieldTable::default();
        headers.insert(
            ShortString::from("x-death-reason"),
            AMQPValue::LongString(death_reason.into()),
        );

        let props = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2)
            .with_message_id(message_id.into())
            .with_headers(headers);

        let dlq_routing_key = format!("{routing_key}.dlq");

        self.channel
            .basic_publish(
                DLX_EXCHANGE,
                &dlq_routing_key,
                BasicPublishOptions::default(),
                payload,
                props,
            )
            .await
            .map_err(CoreError::Broker)?
            .await
            .map_err(CoreError::Broker)?;

        Ok(())
    }
}

/// Applies the effects of one decoded event. Implemented per event type by
/// each service (apply-processed on the Order side, handle-order-created on
/// the Processor side). The pipeline itself never branches on event type.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The event type this handler binds to, e.g. `"order.processed"`.
    fn event_type(&self) -> &'static str;

    /// Extracts `(order_id, version)` from the decoded payload, used to
    /// build the inbox event key before the handler runs.
    fn identity(&self, payload: &serde_json::Value) -> CoreResult<(String, i64)>;

    /// Applies the event's effects within `uow`. Must not commit — the
    /// pipeline commits once the inbox key has also been recorded.
    async fn handle(&self, uow: &mut UnitOfWork, payload: serde_json::Value) -> CoreResult<()>;
}

/// Binds a durable queue to one handler and drains it with up to
/// `prefetch` messages in flight.
pub struct ConsumerPipeline {
    channel: Channel,
    pool: sqlx::PgPool,
    handler: Arc<dyn Handler>,
    prefetch: u16,
}

impl ConsumerPipeline {
    pub fn new(channel: Channel, pool: sqlx::PgPool, handler: Arc<dyn Handler>, prefetch: u16) -> Self {
        Self {
            channel,
            pool,
            handler,
            prefetch,
        }
    }

    /// Consumes until `shutdown` is cancelled, draining in-flight work up to
    /// `drain_timeout` before returning.
    ///
    /// Up to `prefetch` deliveries are handled concurrently: each delivery
    /// acquires a permit from a `prefetch`-sized semaphore and runs its own
    /// decode/dedupe/handle/ack cycle on a spawned task, so `basic_qos`'s
    /// prefetch count actually bounds in-flight work instead of just the
    /// broker's unacked-message buffer.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken, drain_timeout: Duration) -> CoreResult<()> {
        self.channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await
            .map_err(CoreError::Broker)?;

        let routing_key = RoutingKey(self.handler.event_type());
        let queue_name = routing_key.queue_name();
        let consumer_tag = format!("{}-consumer", routing_key.0);

        let mut consumer = self
            .channel
            .basic_consume(
                &queue_name,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(CoreError::Broker)?;

        let permits = Arc::new(Semaphore::new(self.prefetch.max(1) as usize));
        let mut in_flight: JoinSet<()> = JoinSet::new();

        let outcome = loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(queue = %queue_name, "consumer draining before shutdown");
                    break Ok(());
                }
                next = consumer.next() => {
                    let Some(delivery) = next else {
                        warn!(queue = %queue_name, "consumer stream ended");
                        break Ok(());
                    };
                    let delivery = match delivery {
                        Ok(d) => d,
                        Err(e) => {
                            error!(queue = %queue_name, error = %e, "delivery error");
                            continue;
                        }
                    };

                    let permit = permits.clone().acquire_owned().await.expect("semaphore never closed");
                    let pipeline = self.clone();
                    let queue_name_task = queue_name.clone();
                    in_flight.spawn(async move {
                        let _permit = permit;
                        match pipeline.process_one(&delivery.data).await {
                            Ok(()) => {
                                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                                    error!(queue = %queue_name_task, error = %e, "ack failed");
                                }
                            }
                            Err(CoreError::Validation(_)) | Err(CoreError::PoisonMessage(_)) => {
                                warn!(queue = %queue_name_task, "poison message, routing to DLQ without requeue");
                                if let Err(e) = delivery
                                    .nack(BasicNackOptions { requeue: false, ..Default::default() })
                                    .await
                                {
                                    error!(queue = %queue_name_task, error = %e, "nack failed");
                                }
                            }
                            Err(e) => {
                                warn!(queue = %queue_name_task, error = %e, "handler or commit failed, requeueing");
                                if let Err(e) = delivery
                                    .nack(BasicNackOptions { requeue: true, ..Default::default() })
                                    .await
                                {
                                    error!(queue = %queue_name_task, error = %e, "nack failed");
                                }
                            }
                        }
                    });
                }
            }
        };

        let drain = async {
            while in_flight.join_next().await.is_some() {}
        };
        if tokio::time::timeout(drain_timeout, drain).await.is_err() {
            warn!(queue = %queue_name, "drain timeout elapsed with deliveries still in flight");
        }

        outcome
    }

    async fn process_one(&self, body: &[u8]) -> CoreResult<()> {
        apply_event(&self.pool, self.handler.as_ref(), body).await
    }
}

/// Decodes one delivery body, dedupes it against the inbox, runs `handler`,
/// and commits — the per-delivery logic `ConsumerPipeline` drives. Exposed
/// standalone (not gated behind a live broker connection) so the
/// idempotent-redelivery path can be driven directly in tests.
pub async fn apply_event(pool: &sqlx::PgPool, handler: &dyn Handler, body: &[u8]) -> CoreResult<()> {
    let payload: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| CoreError::PoisonMessage(format!("undecodable payload: {e}")))?;

    let (order_id, version) = handler.identity(&payload)?;
    let key = inbox::event_key(handler.event_type(), &order_id, version);

    let mut uow = UnitOfWork::begin(pool).await?;

    if uow.inbox_exists(&key).await? {
        uow.commit().await?;
        return Ok(());
    }

    handler.handle(&mut uow, payload).await?;

    match uow.inbox_add(&key).await {
        Ok(()) => {
            uow.commit().await?;
            Ok(())
        }
        Err(CoreError::Conflict(_)) => {
            // Lost the race to insert the inbox key: a concurrent delivery
            // of the same event already applied and committed it. Drop this
            // UoW (rolling back our own uncommitted mutation) and retry once
            // by re-checking the inbox.
            drop(uow);
            let mut retry_uow = UnitOfWork::begin(pool).await?;
            let now_recorded = retry_uow.inbox_exists(&key).await?;
            retry_uow.commit().await?;
            if now_recorded {
                Ok(())
            } else {
                Err(CoreError::Conflict(format!(
                    "inbox conflict for {key} did not resolve on retry"
                )))
            }
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_key_derives_queue_and_dlq_names_per_the_topology_contract() {
        assert_eq!(ORDER_CREATED.queue_name(), "order.created.q");
        assert_eq!(ORDER_CREATED.dlq_name(), "order.created.dlq");
        assert_eq!(ORDER_CREATED.dlq_routing_key(), "order.created.dlq");
        assert_eq!(ORDER_PROCESSED.queue_name(), "order.processed.q");
    }
}
