pub mod events;
pub mod health;
pub mod logs;
pub mod tokens;
pub mod verifications;
