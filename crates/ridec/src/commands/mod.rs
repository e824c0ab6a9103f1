pub mod auth;
pub mod backend;
pub mod dashboard;
pub mod notifications;
pub mod occurrence;
pub mod preferences;
pub mod scan;
pub mod stage;
pub mod template;
pub mod watch;
