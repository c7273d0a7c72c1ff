pub mod database;
pub mod events;
pub mod memory;
pub mod push;
pub mod redis;
pub mod token_store;
