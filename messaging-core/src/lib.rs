//! Shared transactional messaging substrate: outbox, inbox, unit-of-work,
//! and the AMQP broker topology/consumer pipeline used identically by the
//! Order service and the Processor service.

pub mod broker;
pub mod error;
pub mod inbox;
pub mod metrics;
pub mod outbox;
pub mod uow;

pub use error::{CoreError, CoreResult};
pub use uow::UnitOfWork;
