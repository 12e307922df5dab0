pub mod health;
pub mod reconcile;
pub mod reset;
pub mod stream;
