pub mod circuit_breaker;
pub mod delivery;
pub mod event;
pub mod failure;
pub mod health;
pub mod message;
pub mod response;
pub mod retry;
pub mod routing;
pub mod status;
pub mod telegram;
pub mod validation;
