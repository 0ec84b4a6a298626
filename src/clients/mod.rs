pub mod circuit_breaker;
pub mod database;
pub mod health;
pub mod rbmq;
pub mod telegram;
