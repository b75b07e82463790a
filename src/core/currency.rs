//! Currency conversion abstractions

use crate::core::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exchange rate of one currency pair, as of a given date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateObservation {
    pub base: String,
    pub quote: String,
    pub rate: f64,
    pub as_of: NaiveDate,
}

/// Every quote the provider publishes for one base currency.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    pub base: String,
    pub as_of: NaiveDate,
    pub rates: BTreeMap<String, f64>,
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rate(&self, base: &str, quote: &str) -> Result<RateObservation>;

    async fn fetch_rates(&self, base: &str) -> Result<RateTable>;
}

/// Currency used when a country is missing from [`currency_for_country`].
pub const FALLBACK_CURRENCY: &str = "USD";

/// Maps an ISO2 country code to its currency, falling back to USD.
pub fn currency_for_country(country_code: &str) -> &'static str {
    match country_code {
        "US" => "USD",
        "TR" => "TRY",
        "DE" | "FR" | "IT" | "ES" => "EUR",
        "GB" => "GBP",
        "JP" => "JPY",
        "CN" => "CNY",
        "IN" => "INR",
        "BR" => "BRL",
        "RU" => "RUB",
        "CA" => "CAD",
        "AU" => "AUD",
        "MX" => "MXN",
        "KR" => "KRW",
        "ID" => "IDR",
        "SA" => "SAR",
        "AR" => "ARS",
        "ZA" => "ZAR",
        "NG" => "NGN",
        "EG" => "EGP",
        "PK" => "PKR",
        "BD" => "BDT",
        "VN" => "VND",
        "TH" => "THB",
        "MY" => "MYR",
        "SG" => "SGD",
        "PH" => "PHP",
        "NZ" => "NZD",
        "CH" => "CHF",
        "SE" => "SEK",
        "NO" => "NOK",
        "DK" => "DKK",
        "PL" => "PLN",
        "CZ" => "CZK",
        "HU" => "HUF",
        "RO" => "RON",
        "UA" => "UAH",
        "IL" => "ILS",
        "AE" => "AED",
        "CL" => "CLP",
        "CO" => "COP",
        "PE" => "PEN",
        _ => FALLBACK_CURRENCY,
    }
}

pub fn currency_symbol(currency: &str) -> Option<&'static str> {
    let symbol = match currency {
        "USD" | "MXN" | "ARS" | "CLP" | "COP" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" | "CNY" => "¥",
        "INR" => "₹",
        "TRY" => "₺",
        "RUB" => "₽",
        "KRW" => "₩",
        "BRL" => "R$",
        "CAD" => "C$",
        "AUD" => "A$",
        "CHF" => "CHF",
        "SEK" | "NOK" | "DKK" => "kr",
        "PLN" => "zł",
        "CZK" => "Kč",
        "HUF" => "Ft",
        "ILS" => "₪",
        "AED" => "د.إ",
        "SAR" => "ر.س",
        "ZAR" => "R",
        "NGN" => "₦",
        "EGP" => "E£",
        "PKR" => "₨",
        "BDT" => "৳",
        "VND" => "₫",
        "THB" => "฿",
        "MYR" => "RM",
        "SGD" => "S$",
        "PHP" => "₱",
        "IDR" => "Rp",
        "NZD" => "NZ$",
        "PEN" => "S/",
        _ => return None,
    };
    Some(symbol)
}
