//! Finding status

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a finding.
///
/// The text values are stored in the workbook as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "PENDENTE")]
    Pending,
    #[serde(rename = "REALIZADO DURANTE A CONDUÇÃO")]
    DoneDuringConduct,
    #[serde(rename = "REALIZADO")]
    Done,
    #[serde(rename = "VERIFICANDO")]
    Verifying,
    #[serde(rename = "NÃO APLICÁVEL")]
    NotApplicable,
}

impl Status {
    pub const ALL: [Self; 5] = [
        Self::DoneDuringConduct,
        Self::Done,
        Self::Verifying,
        Self::Pending,
        Self::NotApplicable,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDENTE",
            Self::DoneDuringConduct => "REALIZADO DURANTE A CONDUÇÃO",
            Self::Done => "REALIZADO",
            Self::Verifying => "VERIFICANDO",
            Self::NotApplicable => "NÃO APLICÁVEL",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status '{0}'")]
pub struct ParseStatusError(pub String);

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseStatusError(s.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_every_stored_value() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_trims() {
        assert_eq!(" não aplicável ".parse::<Status>().unwrap(), Status::NotApplicable);
        assert_eq!("pendente".parse::<Status>().unwrap(), Status::Pending);
    }

    #[test]
    fn parse_rejects_unknown_text() {
        let err = "ARQUIVADO".parse::<Status>().unwrap_err();
        assert_eq!(err, ParseStatusError("ARQUIVADO".to_string()));
    }
}
