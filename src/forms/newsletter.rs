//! Newsletter signup (MailerLite)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{check_status, non_blank, validate_email, validate_length, FormError};
use crate::config::NewsletterConfig;

/// Newsletter signup form body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsletterSignup {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Honeypot: hidden from people, filled in by bots
    #[serde(default)]
    pub website: String,
}

impl NewsletterSignup {
    /// Trim fields and drop blank optional ones
    pub fn normalized(self) -> Self {
        Self {
            email: self.email.trim().to_string(),
            name: non_blank(self.name),
            website: self.website.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        validate_email(&self.email)?;
        if let Some(name) = &self.name {
            validate_length("name", "name", name, 1, 100)?;
        }
        Ok(())
    }

    pub fn is_spam(&self) -> bool {
        !self.website.is_empty()
    }
}

/// A mailing-list service that can add subscribers
#[async_trait]
pub trait NewsletterProvider: Send + Sync {
    async fn subscribe(&self, signup: &NewsletterSignup) -> Result<(), FormError>;
}

#[derive(Debug, Serialize)]
struct SubscriberRequest<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<SubscriberFields<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    groups: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct SubscriberFields<'a> {
    name: &'a str,
}

/// MailerLite subscribers API client
pub struct MailerLiteClient {
    client: Client,
    api_url: String,
    api_key: String,
    group_id: Option<String>,
}

impl MailerLiteClient {
    pub fn new(config: &NewsletterConfig, api_key: String) -> Result<Self, FormError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            group_id: config.group_id.clone(),
        })
    }

    /// Build a client with the API key taken from the configured env var
    pub fn from_env(config: &NewsletterConfig) -> Result<Self, FormError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| FormError::NotConfigured(format!("{} is not set", config.api_key_env)))?;
        Self::new(config, api_key)
    }

    fn request_body<'a>(&'a self, signup: &'a NewsletterSignup) -> SubscriberRequest<'a> {
        SubscriberRequest {
            email: &signup.email,
            fields: signup
                .name
                .as_deref()
                .map(|name| SubscriberFields { name }),
            groups: self.group_id.as_deref().into_iter().collect(),
        }
    }
}

#[async_trait]
impl NewsletterProvider for MailerLiteClient {
    async fn subscribe(&self, signup: &NewsletterSignup) -> Result<(), FormError> {
        let url = format!("{}/subscribers", self.api_url);

        tracing::debug!("Subscribing {} to newsletter", signup.email);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&self.request_body(signup))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        check_status(status, &body)
    }
}
