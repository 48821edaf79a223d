//! Static marketplace table for the Selling Partner API.
//!
//! Every market code maps to the regional API endpoint, the marketplace id and
//! the AWS region that hosts it. `UK` and `GB` are separate codes for the same
//! storefront and resolve to identical descriptors.

use catalog_core::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const EU_ENDPOINT: &str = "https://sellingpartnerapi-eu.amazon.com";
const FE_ENDPOINT: &str = "https://sellingpartnerapi-fe.amazon.com";
const NA_ENDPOINT: &str = "https://sellingpartnerapi-na.amazon.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Eu,
    Fe,
    Na,
}

impl Region {
    pub const fn endpoint(self) -> &'static str {
        match self {
            Region::Eu => EU_ENDPOINT,
            Region::Fe => FE_ENDPOINT,
            Region::Na => NA_ENDPOINT,
        }
    }

    pub fn aws_region(self) -> &'static str {
        match self {
            Region::Eu => "eu-west-1",
            Region::Fe => "us-west-2",
            Region::Na => "us-east-1",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Region::Eu => "EU",
            Region::Fe => "FE",
            Region::Na => "NA",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketDescriptor {
    pub api_endpoint: &'static str,
    pub marketplace_id: &'static str,
    pub region: Region,
}

impl MarketDescriptor {
    const fn new(region: Region, marketplace_id: &'static str) -> Self {
        Self {
            api_endpoint: region.endpoint(),
            marketplace_id,
            region,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Market {
    Ae,
    Be,
    De,
    Pl,
    Eg,
    Es,
    Fr,
    Gb,
    In,
    It,
    Nl,
    Sa,
    Se,
    Tr,
    Uk,
    Za,
    Au,
    Jp,
    Sg,
    Us,
    Br,
    Ca,
    Mx,
}

impl Market {
    pub const ALL: [Market; 23] = [
        Market::Ae,
        Market::Be,
        Market::De,
        Market::Pl,
        Market::Eg,
        Market::Es,
        Market::Fr,
        Market::Gb,
        Market::In,
        Market::It,
        Market::Nl,
        Market::Sa,
        Market::Se,
        Market::Tr,
        Market::Uk,
        Market::Za,
        Market::Au,
        Market::Jp,
        Market::Sg,
        Market::Us,
        Market::Br,
        Market::Ca,
        Market::Mx,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Market::Ae => "AE",
            Market::Be => "BE",
            Market::De => "DE",
            Market::Pl => "PL",
            Market::Eg => "EG",
            Market::Es => "ES",
            Market::Fr => "FR",
            Market::Gb => "GB",
            Market::In => "IN",
            Market::It => "IT",
            Market::Nl => "NL",
            Market::Sa => "SA",
            Market::Se => "SE",
            Market::Tr => "TR",
            Market::Uk => "UK",
            Market::Za => "ZA",
            Market::Au => "AU",
            Market::Jp => "JP",
            Market::Sg => "SG",
            Market::Us => "US",
            Market::Br => "BR",
            Market::Ca => "CA",
            Market::Mx => "MX",
        }
    }

    pub fn descriptor(self) -> MarketDescriptor {
        use Region::*;
        match self {
            Market::Ae => MarketDescriptor::new(Eu, "A2VIGQ35RCS4UG"),
            Market::Be => MarketDescriptor::new(Eu, "AMEN7PMS3EDWL"),
            Market::De => MarketDescriptor::new(Eu, "A1PA6795UKMFR9"),
            Market::Pl => MarketDescriptor::new(Eu, "A1C3SOZRARQ6R3"),
            Market::Eg => MarketDescriptor::new(Eu, "ARBP9OOSHTCHU"),
            Market::Es => MarketDescriptor::new(Eu, "A1RKKUPIHCS9HS"),
            Market::Fr => MarketDescriptor::new(Eu, "A13V1IB3VIYZZH"),
            Market::Gb | Market::Uk => MarketDescriptor::new(Eu, "A1F83G8C2ARO7P"),
            Market::In => MarketDescriptor::new(Eu, "A21TJRUUN4KGV"),
            Market::It => MarketDescriptor::new(Eu, "APJ6JRA9NG5V4"),
            Market::Nl => MarketDescriptor::new(Eu, "A1805IZSGTT6HS"),
            Market::Sa => MarketDescriptor::new(Eu, "A17E79C6D8DWNP"),
            Market::Se => MarketDescriptor::new(Eu, "A2NODRKZP88ZB9"),
            Market::Tr => MarketDescriptor::new(Eu, "A33AVAJ2PDY3EV"),
            Market::Za => MarketDescriptor::new(Eu, "AE08WJ6YKNBMC"),
            Market::Au => MarketDescriptor::new(Fe, "A39IBJ37TRP1C6"),
            Market::Jp => MarketDescriptor::new(Fe, "A1VC38T7YXB528"),
            Market::Sg => MarketDescriptor::new(Fe, "A19VAU5U5O7RUS"),
            Market::Us => MarketDescriptor::new(Na, "ATVPDKIKX0DER"),
            Market::Br => MarketDescriptor::new(Na, "A2Q3Y263D00KWC"),
            Market::Ca => MarketDescriptor::new(Na, "A2EUQ1WTGCTBG2"),
            Market::Mx => MarketDescriptor::new(Na, "A1AM78C64UM0Y8"),
        }
    }

    /// First market in table order carrying `marketplace_id`. For the shared
    /// UK/GB id this is `GB`.
    pub fn from_marketplace_id(marketplace_id: &str) -> Option<Market> {
        Market::ALL
            .into_iter()
            .find(|m| m.descriptor().marketplace_id == marketplace_id)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

impl FromStr for Market {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Market::ALL
            .into_iter()
            .find(|m| m.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| Error::UnknownMarket(s.to_string()))
    }
}

impl TryFrom<String> for Market {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Market> for String {
    fn from(market: Market) -> Self {
        market.code().to_string()
    }
}
