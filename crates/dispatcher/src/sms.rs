//! Outbound SMS transport.

use async_trait::async_trait;
use serde::Serialize;

use courier_common::error::DispatchError;
use courier_common::types::SmsMessage;

/// Capability that sends one SMS. `Ok(false)` means the gateway rejected the
/// message; transport-level failures are `Err`.
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send(&self, sms: &SmsMessage) -> Result<bool, DispatchError>;
}

#[derive(Serialize)]
struct GatewayPayload<'a> {
    to: &'a str,
    body: &'a str,
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
}

/// HTTP SMS gateway client: POSTs a JSON payload, success is a 2xx response.
pub struct HttpSmsGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    sender: Option<String>,
}

impl HttpSmsGateway {
    pub fn new(endpoint: String, api_key: Option<String>, sender: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            sender,
        }
    }
}

#[async_trait]
impl SmsTransport for HttpSmsGateway {
    async fn send(&self, sms: &SmsMessage) -> Result<bool, DispatchError> {
        let payload = GatewayPayload {
            to: &sms.phone_number,
            body: &sms.body,
            subject: &sms.subject,
            from: self.sender.as_deref(),
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::DeliveryFailed(e.to_string()))?;

        let accepted = response.status().is_success();
        if !accepted {
            tracing::warn!(
                status = response.status().as_u16(),
                "SMS gateway rejected message"
            );
        }
        Ok(accepted)
    }
}
