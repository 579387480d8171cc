//! Notification Dispatcher.
//!
//! Consumes `notification.requested`, records every request, renders it
//! from a template registry and delivers it through the sender for its
//! contact type, retrying transport failures with exponential backoff.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod repository;
pub mod retry;
pub mod senders;
pub mod templates;
pub mod transport;

pub use config::Config;
pub use dispatcher::NotificationDispatcher;
pub use error::{NotificationError, Result};
pub use handler::NotificationRequestedHandler;
pub use memory::InMemoryNotificationRepository;
pub use model::{NewNotification, Notification, NotificationContent, NotificationStatus};
pub use postgres::PostgresNotificationRepository;
pub use repository::NotificationRepository;
pub use retry::RetryPolicy;
pub use senders::{EmailSender, NotificationSender, SenderRegistry, SmsSender};
pub use templates::{NotificationTemplate, TemplateRegistry};
pub use transport::{ChannelTransport, LogTransport, RecordingTransport};
