use std::fmt;

use thiserror::Error;

use cargolink_core::domain::order::DealId;

/// Driver inline-button actions, decoded once from `callback_data`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallbackIntent {
    PickedUp(DealId),
    Packing(DealId),
    Delivering(DealId),
    Delivered(DealId),
    /// Status-only button; pressing it does nothing.
    Inert,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CallbackParseError {
    #[error("unknown callback action `{0}`")]
    UnknownAction(String),
    #[error("callback `{0}` carries no valid deal id")]
    MissingDeal(String),
}

const INERT: &str = "null";

impl CallbackIntent {
    fn prefix(&self) -> Option<&'static str> {
        match self {
            Self::PickedUp(_) => Some("got"),
            Self::Packing(_) => Some("packing"),
            Self::Delivering(_) => Some("delivering"),
            Self::Delivered(_) => Some("delivered"),
            Self::Inert => None,
        }
    }

    pub fn deal_id(&self) -> Option<&DealId> {
        match self {
            Self::PickedUp(deal)
            | Self::Packing(deal)
            | Self::Delivering(deal)
            | Self::Delivered(deal) => Some(deal),
            Self::Inert => None,
        }
    }

    /// Wire form, at most a few dozen bytes so it fits Telegram's 64-byte limit.
    pub fn encode(&self) -> String {
        match (self.prefix(), self.deal_id()) {
            (Some(prefix), Some(deal)) => format!("{prefix}#{deal}"),
            _ => INERT.to_owned(),
        }
    }

    pub fn parse(data: &str) -> Result<Self, CallbackParseError> {
        let data = data.trim();
        if data == INERT {
            return Ok(Self::Inert);
        }

        let Some((action, raw_deal)) = data.split_once('#') else {
            return Err(CallbackParseError::UnknownAction(data.to_owned()));
        };
        let build: fn(DealId) -> Self = match action {
            "got" => Self::PickedUp,
            "packing" => Self::Packing,
            "delivering" => Self::Delivering,
            "delivered" => Self::Delivered,
            other => return Err(CallbackParseError::UnknownAction(other.to_owned())),
        };

        let digits: String = raw_deal.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(CallbackParseError::MissingDeal(data.to_owned()));
        }
        Ok(build(DealId(digits)))
    }
}

impl fmt::Display for CallbackIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
