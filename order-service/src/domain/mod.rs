pub mod order;

pub use order::{LineItem, Order, OrderStatus};
