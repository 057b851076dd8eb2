//! Contact form delivery (Resend)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{check_status, non_blank, validate_email, validate_length, FormError};
use crate::config::ContactConfig;
use crate::helpers::html_escape;

/// Contact form body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
    /// Honeypot: hidden from people, filled in by bots
    #[serde(default)]
    pub website: String,
}

impl ContactMessage {
    /// Trim fields and drop a blank subject
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            subject: non_blank(self.subject),
            message: self.message.trim().to_string(),
            website: self.website.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        validate_length("name", "name", &self.name, 1, 100)?;
        validate_email(&self.email)?;
        if let Some(subject) = &self.subject {
            validate_length("subject", "subject", subject, 0, 150)?;
        }
        validate_length("message", "message", &self.message, 10, 5000)?;
        Ok(())
    }

    pub fn is_spam(&self) -> bool {
        !self.website.is_empty()
    }

    /// Subject line of the notification email
    pub fn email_subject(&self, prefix: &str) -> String {
        let subject = match &self.subject {
            Some(s) => s.clone(),
            None => format!("Message from {}", self.name),
        };
        if prefix.is_empty() {
            subject
        } else {
            format!("{} {}", prefix, subject)
        }
    }

    pub fn text_body(&self) -> String {
        format!(
            "Name: {}\nEmail: {}\n\n{}\n",
            self.name, self.email, self.message
        )
    }

    pub fn html_body(&self) -> String {
        let paragraphs: String = self
            .message
            .split("\n\n")
            .map(|p| format!("<p>{}</p>", html_escape(p.trim()).replace('\n', "<br>")))
            .collect();
        format!(
            "<p><strong>Name:</strong> {}<br><strong>Email:</strong> {}</p>{}",
            html_escape(&self.name),
            html_escape(&self.email),
            paragraphs
        )
    }
}

/// A transactional email service that delivers contact messages
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_contact(&self, message: &ContactMessage) -> Result<(), FormError>;
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    reply_to: &'a str,
    subject: String,
    text: String,
    html: String,
}

/// Resend emails API client
pub struct ResendClient {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
    to: Vec<String>,
    subject_prefix: String,
}

impl ResendClient {
    pub fn new(config: &ContactConfig, api_key: String) -> Result<Self, FormError> {
        if config.to.is_empty() {
            return Err(FormError::NotConfigured(
                "contact.to has no recipients".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            from: config.from.clone(),
            to: config.to.clone(),
            subject_prefix: config.subject_prefix.clone(),
        })
    }

    /// Build a client with the API key taken from the configured env var
    pub fn from_env(config: &ContactConfig) -> Result<Self, FormError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| FormError::NotConfigured(format!("{} is not set", config.api_key_env)))?;
        Self::new(config, api_key)
    }

    fn request_body<'a>(&'a self, message: &'a ContactMessage) -> EmailRequest<'a> {
        EmailRequest {
            from: &self.from,
            to: &self.to,
            reply_to: &message.email,
            subject: message.email_subject(&self.subject_prefix),
            text: message.text_body(),
            html: message.html_body(),
        }
    }
}

#[async_trait]
impl Mailer for ResendClient {
    async fn send_contact(&self, message: &ContactMessage) -> Result<(), FormError> {
        let url = format!("{}/emails", self.api_url);

        tracing::debug!("Sending contact message from {}", message.email);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(message))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        check_status(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> ContactMessage {
        ContactMessage {
            name: " Ada ".to_string(),
            email: "ada@example.org".to_string(),
            subject: Some("  ".to_string()),
            message: "I would like to <visit> the workshop.\n\nThanks!".to_string(),
            website: String::new(),
        }
        .normalized()
    }

    #[test]
    fn test_validate() {
        let m = message();
        assert!(m.validate().is_ok());
        assert!(m.subject.is_none());

        let short = ContactMessage {
            message: "hi".to_string(),
            ..message()
        };
        let err = short.validate().unwrap_err();
        assert!(matches!(err, FormError::Invalid { field: "message", .. }));

        let nameless = ContactMessage {
            name: String::new(),
            ..message()
        };
        assert!(matches!(
            nameless.validate(),
            Err(FormError::Invalid { field: "name", .. })
        ));

        let long_subject = ContactMessage {
            subject: Some("s".repeat(151)),
            ..message()
        };
        assert!(long_subject.validate().is_err());
    }

    #[test]
    fn test_email_subject_and_bodies() {
        let m = message();
        assert_eq!(m.email_subject("[Contact]"), "[Contact] Message from Ada");
        let with_subject = ContactMessage {
            subject: Some("Volunteering".to_string()),
            ..message()
        };
        assert_eq!(with_subject.email_subject(""), "Volunteering");

        assert!(m.text_body().contains("Email: ada@example.org"));
        let html = m.html_body();
        assert!(html.contains("&lt;visit&gt;"));
        assert!(html.contains("<p>Thanks!</p>"));
    }

    #[test]
    fn test_request_body_shape() {
        let config = ContactConfig {
            to: vec!["team@example.org".to_string()],
            ..Default::default()
        };
        let client = ResendClient::new(&config, "key".to_string()).unwrap();
        let m = message();
        let json = serde_json::to_value(client.request_body(&m)).unwrap();
        assert_eq!(json["to"], serde_json::json!(["team@example.org"]));
        assert_eq!(json["reply_to"], "ada@example.org");
        assert_eq!(json["from"], "Website <noreply@example.com>");
    }

    #[test]
    fn test_no_recipients_is_not_configured() {
        let err = ResendClient::new(&ContactConfig::default(), "key".to_string())
            .err()
            .unwrap();
        assert!(matches!(err, FormError::NotConfigured(_)));
    }
}
