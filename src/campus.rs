use crate::api_error::ApiError;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Campus {
    #[display(fmt = "F")]
    F,
    #[display(fmt = "L")]
    L,
    #[display(fmt = "I")]
    I,
    #[display(fmt = "K")]
    K,
    #[display(fmt = "P")]
    P,
}

impl Campus {
    pub fn code(self) -> &'static str {
        match self {
            Campus::F => "F",
            Campus::L => "L",
            Campus::I => "I",
            Campus::K => "K",
            Campus::P => "P",
        }
    }

    /// Mail domain used for generated account emails.
    pub fn domain(self) -> &'static str {
        match self {
            Campus::F => "cfd.nu.edu.pk",
            Campus::L => "lhr.nu.edu.pk",
            Campus::I => "isb.nu.edu.pk",
            Campus::K => "khi.nu.edu.pk",
            Campus::P => "pwr.nu.edu.pk",
        }
    }
}

impl FromStr for Campus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "F" | "f" => Ok(Campus::F),
            "L" | "l" => Ok(Campus::L),
            "I" | "i" => Ok(Campus::I),
            "K" | "k" => Ok(Campus::K),
            "P" | "p" => Ok(Campus::P),
            other => Err(ApiError::bad_request(format!("Unknown campus {:?}", other))),
        }
    }
}

/// `{batchYear}{campus}-{4digits}`, e.g. `24F-3029`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollNumber {
    pub batch_year: String,
    pub campus: Campus,
    pub serial: String,
}

impl RollNumber {
    pub fn new(batch_year: &str, campus: Campus, serial: &str) -> Result<Self, ApiError> {
        let batch_year = batch_year.trim();
        let serial = serial.trim();

        if batch_year.len() != 2 || !batch_year.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::bad_request("Batch year must be two digits, e.g. 24"));
        }
        if serial.len() != 4 || !serial.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::bad_request("Roll number must be four digits, e.g. 3029"));
        }

        Ok(RollNumber {
            batch_year: batch_year.to_string(),
            campus,
            serial: serial.to_string(),
        })
    }

    pub fn parse(roll_number: &str) -> Result<Self, ApiError> {
        let invalid = || ApiError::bad_request(format!("Malformed roll number {:?}", roll_number));

        let (head, serial) = roll_number.split_once('-').ok_or_else(invalid)?;
        if !head.is_ascii() || head.len() != 3 {
            return Err(invalid());
        }
        let (batch_year, campus) = head.split_at(2);
        let campus = campus.parse::<Campus>().map_err(|_| invalid())?;

        RollNumber::new(batch_year, campus, serial).map_err(|_| invalid())
    }

    /// Student email: `f243029@cfd.nu.edu.pk`.
    pub fn email(&self) -> String {
        format!(
            "{}{}{}@{}",
            self.campus.code().to_lowercase(),
            self.batch_year,
            self.serial,
            self.campus.domain()
        )
    }
}

impl std::fmt::Display for RollNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}-{}", self.batch_year, self.campus, self.serial)
    }
}

/// Splits a batch label `BSE-3B` into program and section.
pub fn split_batch(batch: &str) -> Option<(&str, &str)> {
    batch.rsplit_once('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roll_number_formats_and_derives_email() {
        let roll = RollNumber::new("24", Campus::F, "3029").unwrap();
        assert_eq!(roll.to_string(), "24F-3029");
        assert_eq!(roll.email(), "f243029@cfd.nu.edu.pk");
    }

    #[test]
    fn roll_number_parses_back_its_campus() {
        let roll = RollNumber::parse("23L-0042").unwrap();
        assert_eq!(roll.campus, Campus::L);
        assert_eq!(roll.batch_year, "23");
        assert_eq!(roll.serial, "0042");
    }

    #[test]
    fn malformed_roll_numbers_are_rejected() {
        for bad in &["24F3029", "24X-3029", "2F-3029", "24F-302", "24F-30a9", ""] {
            assert!(RollNumber::parse(bad).is_err(), "{} should be rejected", bad);
        }
        assert!(RollNumber::new("2024", Campus::I, "3029").is_err());
    }

    #[test]
    fn non_ascii_roll_number_is_rejected_not_split() {
        assert!(RollNumber::parse("2é-1234").is_err());
        assert!(RollNumber::parse("é4F-1234").is_err());
    }

    #[test]
    fn campus_codes_are_case_insensitive() {
        assert_eq!("k".parse::<Campus>().unwrap(), Campus::K);
        assert_eq!(Campus::P.domain(), "pwr.nu.edu.pk");
        assert!("Z".parse::<Campus>().is_err());
    }

    #[test]
    fn batch_splits_on_last_dash() {
        assert_eq!(split_batch("BSE-3B"), Some(("BSE", "3B")));
        assert_eq!(split_batch("BS-CS-5A"), Some(("BS-CS", "5A")));
        assert_eq!(split_batch("BSE"), None);
    }
}
