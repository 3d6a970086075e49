pub mod user_store;

pub use user_store::{InMemoryUserStore, UserId, UserRepository};
