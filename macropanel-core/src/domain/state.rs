//! US state identifiers.
//!
//! The panel covers the 50 states (no DC, no territories). Each state carries
//! its two-letter postal code, display name, and two-digit FIPS code, which
//! several FRED series ids embed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Two-letter uppercase postal code, e.g. `CA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StateCode([u8; 2]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid state code '{0}'")]
pub struct InvalidStateCode(pub String);

impl StateCode {
    pub fn as_str(&self) -> &str {
        // Constructed only from validated ASCII uppercase bytes.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }

    /// Static metadata for this state.
    pub fn info(&self) -> Option<&'static StateInfo> {
        STATES.iter().find(|s| s.code == self.as_str())
    }

    /// All 50 states in alphabetical code order.
    pub fn all() -> Vec<StateCode> {
        let mut codes: Vec<StateCode> = STATES
            .iter()
            .filter_map(|s| s.code.parse().ok())
            .collect();
        codes.sort();
        codes
    }
}

impl FromStr for StateCode {
    type Err = InvalidStateCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bytes = trimmed.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(InvalidStateCode(s.to_string()));
        }
        let code = [bytes[0].to_ascii_uppercase(), bytes[1].to_ascii_uppercase()];
        let upper = std::str::from_utf8(&code).map_err(|_| InvalidStateCode(s.to_string()))?;
        if !STATES.iter().any(|st| st.code == upper) {
            return Err(InvalidStateCode(s.to_string()));
        }
        Ok(StateCode(code))
    }
}

impl TryFrom<String> for StateCode {
    type Error = InvalidStateCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StateCode> for String {
    fn from(code: StateCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static state metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub fips: &'static str,
}

const fn st(code: &'static str, name: &'static str, fips: &'static str) -> StateInfo {
    StateInfo { code, name, fips }
}

pub const STATES: [StateInfo; 50] = [
    st("AL", "Alabama", "01"),
    st("AK", "Alaska", "02"),
    st("AZ", "Arizona", "04"),
    st("AR", "Arkansas", "05"),
    st("CA", "California", "06"),
    st("CO", "Colorado", "08"),
    st("CT", "Connecticut", "09"),
    st("DE", "Delaware", "10"),
    st("FL", "Florida", "12"),
    st("GA", "Georgia", "13"),
    st("HI", "Hawaii", "15"),
    st("ID", "Idaho", "16"),
    st("IL", "Illinois", "17"),
    st("IN", "Indiana", "18"),
    st("IA", "Iowa", "19"),
    st("KS", "Kansas", "20"),
    st("KY", "Kentucky", "21"),
    st("LA", "Louisiana", "22"),
    st("ME", "Maine", "23"),
    st("MD", "Maryland", "24"),
    st("MA", "Massachusetts", "25"),
    st("MI", "Michigan", "26"),
    st("MN", "Minnesota", "27"),
    st("MS", "Mississippi", "28"),
    st("MO", "Missouri", "29"),
    st("MT", "Montana", "30"),
    st("NE", "Nebraska", "31"),
    st("NV", "Nevada", "32"),
    st("NH", "New Hampshire", "33"),
    st("NJ", "New Jersey", "34"),
    st("NM", "New Mexico", "35"),
    st("NY", "New York", "36"),
    st("NC", "North Carolina", "37"),
    st("ND", "North Dakota", "38"),
    st("OH", "Ohio", "39"),
    st("OK", "Oklahoma", "40"),
    st("OR", "Oregon", "41"),
    st("PA", "Pennsylvania", "42"),
    st("RI", "Rhode Island", "44"),
    st("SC", "South Carolina", "45"),
    st("SD", "South Dakota", "46"),
    st("TN", "Tennessee", "47"),
    st("TX", "Texas", "48"),
    st("UT", "Utah", "49"),
    st("VT", "Vermont", "50"),
    st("VA", "Virginia", "51"),
    st("WA", "Washington", "53"),
    st("WV", "West Virginia", "54"),
    st("WI", "Wisconsin", "55"),
    st("WY", "Wyoming", "56"),
];
