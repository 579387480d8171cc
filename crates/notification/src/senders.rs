//! Channel senders and the registry that selects them by contact type.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::ContactType;

use crate::error::{NotificationError, Result};
use crate::model::NotificationContent;
use crate::transport::ChannelTransport;

/// Sends notifications over one channel.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// The channel this sender serves.
    fn contact_type(&self) -> ContactType;

    /// Checks that the destination is usable on this channel. A failure is
    /// structural: retrying cannot fix the address.
    fn validate_contact(&self, contact: &str) -> Result<()>;

    /// Delivers the content.
    async fn send(&self, contact: &str, content: &NotificationContent) -> Result<()>;
}

fn invalid(contact_type: ContactType, contact: &str) -> NotificationError {
    NotificationError::InvalidContact {
        contact_type,
        contact: contact.to_string(),
    }
}

/// E-mail sender.
#[derive(Clone)]
pub struct EmailSender {
    transport: Arc<dyn ChannelTransport>,
}

impl EmailSender {
    pub fn new(transport: Arc<dyn ChannelTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl NotificationSender for EmailSender {
    fn contact_type(&self) -> ContactType {
        ContactType::Email
    }

    fn validate_contact(&self, contact: &str) -> Result<()> {
        let contact = contact.trim();
        match contact.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(invalid(ContactType::Email, contact)),
        }
    }

    async fn send(&self, contact: &str, content: &NotificationContent) -> Result<()> {
        self.transport.send(contact.trim(), content).await
    }
}

/// SMS sender. Only the body is sent.
#[derive(Clone)]
pub struct SmsSender {
    transport: Arc<dyn ChannelTransport>,
}

impl SmsSender {
    pub fn new(transport: Arc<dyn ChannelTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl NotificationSender for SmsSender {
    fn contact_type(&self) -> ContactType {
        ContactType::Sms
    }

    fn validate_contact(&self, contact: &str) -> Result<()> {
        if contact.trim().is_empty() {
            return Err(invalid(ContactType::Sms, contact));
        }
        Ok(())
    }

    async fn send(&self, contact: &str, content: &NotificationContent) -> Result<()> {
        let text = NotificationContent::new(String::new(), content.body.clone());
        self.transport.send(contact.trim(), &text).await
    }
}

/// Immutable mapping from contact type to sender, built once at startup.
#[derive(Clone)]
pub struct SenderRegistry {
    senders: HashMap<ContactType, Arc<dyn NotificationSender>>,
}

impl SenderRegistry {
    pub fn new(senders: impl IntoIterator<Item = Arc<dyn NotificationSender>>) -> Self {
        Self {
            senders: senders
                .into_iter()
                .map(|s| (s.contact_type(), s))
                .collect(),
        }
    }

    /// Registers the e-mail and SMS senders over the given transports.
    pub fn standard(email: Arc<dyn ChannelTransport>, sms: Arc<dyn ChannelTransport>) -> Self {
        Self::new(ContactType::ALL.into_iter().map(|contact_type| {
            let sender: Arc<dyn NotificationSender> = match contact_type {
                ContactType::Email => Arc::new(EmailSender::new(Arc::clone(&email))),
                ContactType::Sms => Arc::new(SmsSender::new(Arc::clone(&sms))),
            };
            sender
        }))
    }

    pub fn resolve(&self, contact_type: ContactType) -> Result<&dyn NotificationSender> {
        self.senders
            .get(&contact_type)
            .map(|s| s.as_ref())
            .ok_or(NotificationError::MissingSender(contact_type))
    }
}

impl std::fmt::Debug for SenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderRegistry")
            .field("channels", &self.senders.keys().collect::<Vec<_>>())
            .finish()
    }
}
