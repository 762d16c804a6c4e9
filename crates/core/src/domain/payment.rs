use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use md5::{Digest, Md5};
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::order::DealId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PaymentNoticeError {
    #[error("missing required parameter `{0}`")]
    MissingField(&'static str),
    #[error("signature does not match")]
    Signature,
    #[error("order reference `{0}` carries no deal id")]
    InvalidOrderReference(String),
    #[error("invalid sum `{0}`")]
    InvalidSum(String),
}

/// Payment confirmation posted by the payment provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentNotice {
    pub id: String,
    pub sum: String,
    pub client_id: String,
    pub order_id: String,
    pub key: String,
}

impl PaymentNotice {
    /// Reads the provider's form fields; `id`, `sum` and `key` are mandatory.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, PaymentNoticeError> {
        let required = |name: &'static str| {
            form.get(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .ok_or(PaymentNoticeError::MissingField(name))
        };
        let optional =
            |name: &str| form.get(name).map(|value| value.trim().to_owned()).unwrap_or_default();

        Ok(Self {
            id: required("id")?,
            sum: required("sum")?,
            client_id: optional("clientid"),
            order_id: optional("orderid"),
            key: required("key")?,
        })
    }

    pub fn expected_key(&self, secret: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.id.as_bytes());
        hasher.update(self.sum.as_bytes());
        hasher.update(self.client_id.as_bytes());
        hasher.update(self.order_id.as_bytes());
        hasher.update(secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn verify(&self, secret: &str) -> Result<(), PaymentNoticeError> {
        if self.expected_key(secret) == self.key.to_ascii_lowercase() {
            Ok(())
        } else {
            Err(PaymentNoticeError::Signature)
        }
    }

    /// Deal id taken from the first digit run of the order reference (`Заказ №123`).
    pub fn deal_id(&self) -> Result<DealId, PaymentNoticeError> {
        static DIGITS: OnceLock<Option<Regex>> = OnceLock::new();
        DIGITS
            .get_or_init(|| Regex::new(r"(\d+)").ok())
            .as_ref()
            .and_then(|pattern| pattern.find(&self.order_id))
            .map(|matched| DealId(matched.as_str().to_owned()))
            .ok_or_else(|| PaymentNoticeError::InvalidOrderReference(self.order_id.clone()))
    }

    pub fn amount(&self) -> Result<Decimal, PaymentNoticeError> {
        Decimal::from_str(&self.sum.replace(',', "."))
            .map_err(|_| PaymentNoticeError::InvalidSum(self.sum.clone()))
    }
}

/// True when `paid` is within `tolerance` of the expected whole-rouble cost.
pub fn amount_matches(paid: Decimal, expected: u64, tolerance: Decimal) -> bool {
    (paid - Decimal::from(expected)).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal::Decimal;

    use super::{amount_matches, PaymentNotice, PaymentNoticeError};
    use crate::domain::order::DealId;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    fn signed_notice(secret: &str) -> PaymentNotice {
        let mut notice = PaymentNotice {
            id: "981".to_owned(),
            sum: "1100.00".to_owned(),
            client_id: "ООО Ромашка".to_owned(),
            order_id: "Заказ №5531".to_owned(),
            key: String::new(),
        };
        notice.key = notice.expected_key(secret).to_uppercase();
        notice
    }

    #[test]
    fn missing_required_field_is_reported() {
        let error = PaymentNotice::from_form(&form(&[("id", "1"), ("key", "abc")]))
            .expect_err("sum is required");
        assert_eq!(error, PaymentNoticeError::MissingField("sum"));
    }

    #[test]
    fn signature_check_is_case_insensitive_on_key() {
        let notice = signed_notice("s3cret");
        notice.verify("s3cret").expect("valid signature");
        assert_eq!(notice.verify("other"), Err(PaymentNoticeError::Signature));
    }

    #[test]
    fn deal_id_is_first_digit_run() {
        let notice = signed_notice("x");
        assert_eq!(notice.deal_id().expect("digits"), DealId("5531".to_owned()));
    }

    #[test]
    fn amount_tolerance_is_inclusive() {
        let tolerance = Decimal::new(1, 2);
        assert!(amount_matches(Decimal::new(110_001, 2), 1_100, tolerance));
        assert!(!amount_matches(Decimal::new(110_002, 2), 1_100, tolerance));
        assert!(!amount_matches(Decimal::new(1_000, 0), 1_100, tolerance));
    }

    #[test]
    fn invalid_sum_is_rejected() {
        let mut notice = signed_notice("x");
        notice.sum = "много".to_owned();
        assert!(matches!(notice.amount(), Err(PaymentNoticeError::InvalidSum(_))));
    }
}
