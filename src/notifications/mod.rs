pub mod models;
pub mod senders;

pub use models::Alert;
pub use senders::{Notifier, SenderError, mailgun::MailgunSender};
