pub mod handlers;
pub mod notifier;
