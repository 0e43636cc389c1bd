pub mod amqp;
pub mod config;

pub use amqp::{AmqpBroker, AmqpConsumer};
pub use config::AmqpConfig;
