//! Form submissions: validation, provider calls and user-facing outcomes
//!
//! Each form validates its input, makes a single call to an external
//! service, and reports back a [`FormOutcome`]. Providers sit behind traits
//! so the HTTP clients can be swapped or faked.

mod contact;
mod newsletter;

pub use contact::{ContactMessage, Mailer, ResendClient};
pub use newsletter::{MailerLiteClient, NewsletterProvider, NewsletterSignup};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").unwrap();
}

const MAX_EMAIL_LEN: usize = 254;

pub const NEWSLETTER_SUCCESS: &str = "Thanks for subscribing! Please check your inbox.";
pub const CONTACT_SUCCESS: &str = "Thanks for your message. We will get back to you soon.";

/// Result object returned to the browser after a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormOutcome {
    pub success: bool,
    pub message: String,
}

impl FormOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(error: &FormError) -> Self {
        Self {
            success: false,
            message: error.user_message(),
        }
    }
}

/// Everything that can go wrong between a form post and the provider
#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("provider not configured: {0}")]
    NotConfigured(String),

    #[error("provider rejected the submission: {0}")]
    Rejected(String),

    #[error("provider refused our credentials (status {0})")]
    Unauthorized(u16),

    #[error("provider rate limit reached")]
    RateLimited,

    #[error("provider returned status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FormError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        FormError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// A body that could not be decoded at all
    pub fn malformed() -> Self {
        FormError::invalid("form", "Please check the form and try again.")
    }

    /// Message safe to show to the person who submitted the form
    pub fn user_message(&self) -> String {
        match self {
            FormError::Invalid { reason, .. } => reason.clone(),
            FormError::Rejected(_) => {
                "That email address was rejected. Please check it and try again.".to_string()
            }
            FormError::NotConfigured(_) | FormError::Unauthorized(_) => {
                "This form is temporarily unavailable. Please try again later.".to_string()
            }
            FormError::RateLimited => "Too many requests, please try again later.".to_string(),
            FormError::Provider { .. } | FormError::Transport(_) => {
                "Something went wrong. Please try again later.".to_string()
            }
        }
    }

    /// Errors caused by the submitter rather than by us or the provider
    pub fn is_client_error(&self) -> bool {
        matches!(self, FormError::Invalid { .. } | FormError::Rejected(_))
    }
}

/// Validate a newsletter signup and hand it to the provider.
///
/// Honeypot submissions are reported as successful without any call.
pub async fn submit_newsletter(
    provider: Option<&dyn NewsletterProvider>,
    signup: NewsletterSignup,
) -> Result<FormOutcome, FormError> {
    let signup = signup.normalized();
    if signup.is_spam() {
        tracing::debug!(form = "newsletter", "Dropping honeypot submission");
        return Ok(FormOutcome::ok(NEWSLETTER_SUCCESS));
    }
    signup.validate()?;

    let provider = provider
        .ok_or_else(|| FormError::NotConfigured("no newsletter provider".to_string()))
        .inspect_err(|e| log_failure("newsletter", e))?;
    provider
        .subscribe(&signup)
        .await
        .inspect_err(|e| log_failure("newsletter", e))?;

    tracing::info!(form = "newsletter", "New subscriber");
    Ok(FormOutcome::ok(NEWSLETTER_SUCCESS))
}

/// Validate a contact message and send it through the mailer
pub async fn submit_contact(
    mailer: Option<&dyn Mailer>,
    message: ContactMessage,
) -> Result<FormOutcome, FormError> {
    let message = message.normalized();
    if message.is_spam() {
        tracing::debug!(form = "contact", "Dropping honeypot submission");
        return Ok(FormOutcome::ok(CONTACT_SUCCESS));
    }
    message.validate()?;

    let mailer = mailer
        .ok_or_else(|| FormError::NotConfigured("no mailer".to_string()))
        .inspect_err(|e| log_failure("contact", e))?;
    mailer
        .send_contact(&message)
        .await
        .inspect_err(|e| log_failure("contact", e))?;

    tracing::info!(form = "contact", "Contact message sent");
    Ok(FormOutcome::ok(CONTACT_SUCCESS))
}

fn log_failure(form: &'static str, error: &FormError) {
    match error {
        FormError::NotConfigured(_) | FormError::Unauthorized(_) => {
            tracing::error!(form, error = %error, "Form provider unavailable")
        }
        e if e.is_client_error() => tracing::debug!(form, error = %e, "Submission rejected"),
        _ => tracing::warn!(form, error = %error, "Form provider call failed"),
    }
}

/// Map a provider response status to success or a [`FormError`]
pub(crate) fn check_status(status: u16, body: &str) -> Result<(), FormError> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(FormError::Unauthorized(status)),
        400 | 422 => Err(FormError::Rejected(body.to_string())),
        429 => Err(FormError::RateLimited),
        _ => Err(FormError::Provider {
            status,
            body: body.to_string(),
        }),
    }
}

pub(crate) fn validate_email(email: &str) -> Result<(), FormError> {
    if email.is_empty() {
        return Err(FormError::invalid("email", "Please enter your email address."));
    }
    if email.chars().count() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(email) {
        return Err(FormError::invalid(
            "email",
            "Please enter a valid email address.",
        ));
    }
    Ok(())
}

pub(crate) fn validate_length(
    field: &'static str,
    label: &str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), FormError> {
    let len = value.chars().count();
    if len < min {
        let reason = if min <= 1 {
            format!("Please enter your {}.", label)
        } else {
            format!("{} must be at least {} characters.", capitalize(label), min)
        };
        return Err(FormError::invalid(field, reason));
    }
    if len > max {
        return Err(FormError::invalid(
            field,
            format!("{} must be at most {} characters.", capitalize(label), max),
        ));
    }
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Collapse a missing or blank optional field to `None`
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
