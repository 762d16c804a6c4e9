use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use cargolink_core::errors::ExternalServiceError;
use cargolink_core::ports::{InvoiceRequest, PaymentGateway};

const SERVICE: &str = "paykeeper";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvoiceResponse {
    #[serde(default)]
    invoice_id: Option<Value>,
}

/// PayKeeper instant-payment invoices, authenticated with HTTP basic auth.
#[derive(Clone)]
pub struct PayKeeperGateway {
    client: Client,
    token_url: String,
    invoice_url: String,
    user: String,
    password: SecretString,
}

impl PayKeeperGateway {
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        invoice_url: impl Into<String>,
        user: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            invoice_url: invoice_url.into(),
            user: user.into(),
            password,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.user, Some(self.password.expose_secret()))
    }

    async fn read<T: DeserializeOwned>(
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ExternalServiceError> {
        let response = request.send().await.map_err(|error| {
            ExternalServiceError::new(SERVICE, operation, error.without_url().to_string())
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExternalServiceError::new(SERVICE, operation, format!("HTTP {status}")));
        }
        response
            .json()
            .await
            .map_err(|error| ExternalServiceError::new(SERVICE, operation, error.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PayKeeperGateway {
    async fn fetch_token(&self) -> Result<String, ExternalServiceError> {
        let request = self.authorized(self.client.get(&self.token_url));
        let payload: TokenResponse = Self::read("token", request).await?;
        payload
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ExternalServiceError::new(SERVICE, "token", "response has no token"))
    }

    async fn create_invoice(
        &self,
        token: &str,
        request: &InvoiceRequest,
    ) -> Result<String, ExternalServiceError> {
        let amount = request.amount.to_string();
        let form = [
            ("pay_amount", amount.as_str()),
            ("clientid", request.client_id.as_str()),
            ("orderid", request.order_reference.as_str()),
            ("service_name", request.service_name.as_str()),
            ("client_phone", request.client_phone.as_str()),
            ("token", token),
        ];
        let builder = self.authorized(self.client.post(&self.invoice_url)).form(&form);
        let payload: InvoiceResponse = Self::read("invoice.preview", builder).await?;

        let invoice_id = match payload.invoice_id {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(ExternalServiceError::new(
                    SERVICE,
                    "invoice.preview",
                    "response has no invoice_id",
                ))
            }
        };
        info!(
            event_name = "paykeeper.invoice.created",
            invoice_id = %invoice_id,
            order_reference = %request.order_reference,
            "instant-payment invoice created"
        );
        Ok(bill_link(&self.invoice_url, &invoice_id))
    }
}

/// Payer page on the same PayKeeper host as the invoice API.
fn bill_link(invoice_url: &str, invoice_id: &str) -> String {
    let server = invoice_url.split("/change").next().unwrap_or(invoice_url).trim_end_matches('/');
    format!("{server}/bill/{invoice_id}/")
}
