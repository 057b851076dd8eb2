//! Configuration module

mod site;

pub use site::ContactConfig;
pub use site::ExternalLinkConfig;
pub use site::MediaConfig;
pub use site::NewsletterConfig;
pub use site::SiteConfig;
