mod common;
mod config_tests;
mod cooldown_tests;
mod failure_store_tests;
mod telegram_tests;
