pub mod call;
pub mod health;
pub mod invoke;
pub mod tools;
