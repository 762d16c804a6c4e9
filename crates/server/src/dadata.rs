use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use cargolink_core::errors::ExternalServiceError;
use cargolink_core::ports::{CompanyProfile, IdentityLookup};

const SERVICE: &str = "dadata";
const OPERATION: &str = "findById/party";
const FIND_PARTY_PATH: &str = "/suggestions/api/4_1/rs/findById/party";
const MISSING_ADDRESS: &str = "— адрес не указан —";

/// Company registry lookup by tax id.
#[derive(Clone)]
pub struct DaDataLookup {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl DaDataLookup {
    pub fn new(client: Client, base_url: impl Into<String>, token: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url, token }
    }
}

#[async_trait]
impl IdentityLookup for DaDataLookup {
    async fn find_by_inn(&self, inn: &str) -> Result<Option<CompanyProfile>, ExternalServiceError> {
        let response = self
            .client
            .post(format!("{}{FIND_PARTY_PATH}", self.base_url))
            .header("Accept", "application/json")
            .header("Authorization", format!("Token {}", self.token.expose_secret()))
            .json(&json!({ "query": inn }))
            .send()
            .await
            .map_err(|error| ExternalServiceError::new(SERVICE, OPERATION, error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExternalServiceError::new(SERVICE, OPERATION, format!("HTTP {status}")));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|error| ExternalServiceError::new(SERVICE, OPERATION, error.to_string()))?;
        Ok(profile_from(&payload))
    }
}

/// First suggestion wins; a suggestion without a name counts as no match.
fn profile_from(payload: &Value) -> Option<CompanyProfile> {
    let data = &payload["suggestions"].as_array()?.first()?["data"];
    let name = data["name"]["full_with_opf"].as_str().filter(|name| !name.is_empty())?;
    let address = data["address"]["value"]
        .as_str()
        .filter(|address| !address.is_empty())
        .unwrap_or(MISSING_ADDRESS);
    Some(CompanyProfile { name: name.to_owned(), address: address.to_owned() })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::profile_from;

    #[test]
    fn first_suggestion_gives_name_and_address() {
        let payload = json!({ "suggestions": [{
            "value": "Ромашка",
            "data": {
                "name": { "full_with_opf": "ОБЩЕСТВО С ОГРАНИЧЕННОЙ ОТВЕТСТВЕННОСТЬЮ \"РОМАШКА\"" },
                "address": { "value": "г Москва, ул Тверская, д 1" }
            }
        }]});

        let profile = profile_from(&payload).expect("profile");

        assert_eq!(profile.name, "ОБЩЕСТВО С ОГРАНИЧЕННОЙ ОТВЕТСТВЕННОСТЬЮ \"РОМАШКА\"");
        assert_eq!(profile.address, "г Москва, ул Тверская, д 1");
    }

    #[test]
    fn missing_address_gets_placeholder() {
        let payload = json!({ "suggestions": [{
            "data": { "name": { "full_with_opf": "ИП Иванов Иван Иванович" }, "address": null }
        }]});

        let profile = profile_from(&payload).expect("profile");
        assert_eq!(profile.address, "— адрес не указан —");
    }

    #[test]
    fn empty_suggestions_mean_unknown_company() {
        assert!(profile_from(&json!({ "suggestions": [] })).is_none());
        assert!(profile_from(&json!({})).is_none());
    }
}
