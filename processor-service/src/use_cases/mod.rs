pub mod handle_order_created;
