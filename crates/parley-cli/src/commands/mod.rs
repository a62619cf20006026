pub mod chat;
pub mod check;
pub mod settings;
pub mod tools;
