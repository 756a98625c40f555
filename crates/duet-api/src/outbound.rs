use serde_json::json;
use tracing::{debug, warn};

/// Best-effort email/SMS delivery through configured HTTP relay endpoints.
/// Unconfigured channels log the would-be delivery and report not-sent;
/// failures are logged and swallowed — they never fail the primary request.
#[derive(Clone)]
pub struct Outbound {
    client: reqwest::Client,
    mail_webhook: Option<String>,
    sms_webhook: Option<String>,
}

impl Outbound {
    pub fn new(mail_webhook: Option<String>, sms_webhook: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            mail_webhook,
            sms_webhook,
        }
    }

    /// No delivery channels at all — used by tests.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    /// Returns whether the email was actually handed to the relay.
    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> bool {
        let Some(url) = &self.mail_webhook else {
            debug!("Email relay not configured. Would send email to: {}", to);
            return false;
        };

        let payload = json!({ "to": to, "subject": subject, "body": body });
        match self.client.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("Email relay returned {} for {}", resp.status(), to);
                false
            }
            Err(e) => {
                warn!("Error sending email to {}: {}", to, e);
                false
            }
        }
    }

    /// Returns whether the SMS was actually handed to the relay.
    pub async fn send_sms(&self, to: &str, message: &str) -> bool {
        let Some(url) = &self.sms_webhook else {
            debug!("SMS relay not configured. Would send SMS to: {}", to);
            return false;
        };

        let payload = json!({ "to": to, "message": message });
        match self.client.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("SMS relay returned {} for {}", resp.status(), to);
                false
            }
            Err(e) => {
                warn!("Error sending SMS to {}: {}", to, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_channels_report_not_sent() {
        let outbound = Outbound::disabled();
        assert!(!outbound.send_email("a@example.com", "hi", "body").await);
        assert!(!outbound.send_sms("+62000", "hi").await);
    }
}
