//! Outgoing email: voter credentials and verification codes.

#[cfg(test)]
use std::sync::Mutex;

use lettre::{
    address::AddressError,
    message::{header::ContentType, Mailbox},
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use log::info;
use thiserror::Error;

use crate::model::api::otp::Code;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid email address '{0}': {1}")]
    Address(String, #[source] AddressError),
    #[error(transparent)]
    Build(#[from] lettre::error::Error),
    #[error(transparent)]
    Smtp(#[from] SmtpError),
}

/// A plain-text email ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    /// The one-time delivery of a new voter's login credentials.
    pub fn credentials(
        to: &str,
        name: &str,
        student_id: &str,
        password: &str,
        voter_key: &str,
        app_url: &str,
    ) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your voting credentials".to_string(),
            body: format!(
                "Hello {name},\n\n\
                 An account has been created for you on the university voting portal.\n\n\
                 Student ID: {student_id}\n\
                 Password:   {password}\n\
                 Voter key:  {voter_key}\n\n\
                 Log in at {app_url}/login. You will be asked to confirm this email address \
                 the first time you log in.\n\n\
                 Keep these details private; they will not be sent again.\n"
            ),
        }
    }

    /// A login verification code.
    pub fn verification_code(to: &str, name: &str, code: &Code, valid_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your verification code".to_string(),
            body: format!(
                "Hello {name},\n\n\
                 Your verification code is {code}. It expires in {valid_minutes} minutes.\n\n\
                 If you did not try to log in, you can ignore this email.\n"
            ),
        }
    }
}

enum Transport {
    Smtp {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    },
    Log,
    #[cfg(test)]
    Capture(Mutex<Vec<OutgoingMail>>),
}

/// Sends mail over SMTP, or just logs it when no SMTP account is configured.
pub struct Mailer {
    transport: Transport,
}

impl Mailer {
    /// A mailer relaying through `host` over TLS with the given account.
    pub fn smtp(host: &str, user: String, pass: String, from: &str) -> Result<Self, MailError> {
        let from = parse_mailbox(from)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
            .credentials(Credentials::new(user, pass))
            .build();
        Ok(Self {
            transport: Transport::Smtp { transport, from },
        })
    }

    /// A mailer that logs messages instead of sending them.
    pub fn log_only() -> Self {
        Self {
            transport: Transport::Log,
        }
    }

    /// A mailer that keeps every message in memory.
    #[cfg(test)]
    pub fn capturing() -> Self {
        Self {
            transport: Transport::Capture(Mutex::new(Vec::new())),
        }
    }

    /// Everything sent so far by a capturing mailer.
    #[cfg(test)]
    pub fn sent(&self) -> Vec<OutgoingMail> {
        match &self.transport {
            Transport::Capture(sent) => sent.lock().unwrap().clone(),
            _ => Vec::new(),
        }
    }

    /// Send a message, waiting for the server to accept it.
    pub async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        match &self.transport {
            Transport::Smtp { transport, from } => {
                let message = Message::builder()
                    .from(from.clone())
                    .to(parse_mailbox(&mail.to)?)
                    .subject(mail.subject)
                    .header(ContentType::TEXT_PLAIN)
                    .body(mail.body)?;
                transport.send(message).await?;
                info!("Sent mail to {}", mail.to);
            }
            Transport::Log => {
                info!(
                    "Mail to {} ({}):\n{}",
                    mail.to, mail.subject, mail.body
                );
            }
            #[cfg(test)]
            Transport::Capture(sent) => sent.lock().unwrap().push(mail),
        }
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| MailError::Address(address.to_string(), e))
}
