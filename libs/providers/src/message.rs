use serde::{Deserialize, Serialize};

/// Body used when a message carries neither text nor HTML content and the
/// provider requires a body.
pub const DEFAULT_TEXT_BODY: &str = "(no content)";

/// The person an email is addressed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// RFC 5322 style display form, `Name <addr>` when a name is present.
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, self.email),
            _ => self.email.clone(),
        }
    }
}

/// A provider-independent email to be delivered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailMessage {
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    /// Extra headers, passed through to the transport.
    pub headers: Vec<(String, String)>,
    /// Campaign tags for providers that support them.
    pub tags: Vec<String>,
}

impl EmailMessage {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body_text = Some(text.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.body_html = Some(html.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Result of a successful send.
#[derive(Debug, Clone)]
pub struct SendResult {
    /// Provider-specific message ID.
    pub message_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipient_display() {
        assert_eq!(Recipient::new("a@b.com").display(), "a@b.com");
        assert_eq!(
            Recipient::new("a@b.com").with_name("Ada").display(),
            "Ada <a@b.com>"
        );
        assert_eq!(Recipient::new("a@b.com").with_name("").display(), "a@b.com");
    }

    #[test]
    fn test_message_builder() {
        let message = EmailMessage::new("Hello")
            .with_text("plain")
            .with_header("X-Campaign", "onboarding")
            .with_tag("welcome");

        assert_eq!(message.subject, "Hello");
        assert_eq!(message.body_text.as_deref(), Some("plain"));
        assert!(message.body_html.is_none());
        assert_eq!(message.headers.len(), 1);
        assert_eq!(message.tags, vec!["welcome"]);
    }
}
