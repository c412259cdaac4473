//! Timing sample naming
//!
//! Every timing sample is identified by `application.testName.throttleProfile.phase`.
//! This module is the only place that knows how that string is built and split, so the
//! recorder side and the aggregation side always agree on the encoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator between the four name fields
pub const SEPARATOR: char = '.';

/// Number of fields in an encoded sample name
pub const FIELD_COUNT: usize = 4;

/// Applications that always get report columns, in column order
pub const KNOWN_APPLICATIONS: [&str; 2] = ["scix", "bbb"];

/// Measured interaction phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Time To Results from Load
    #[serde(rename = "TTRL")]
    Ttrl,
    /// Time To Search-Bar Interactive
    #[serde(rename = "TTSBI")]
    Ttsbi,
    /// Time To Results from Search
    #[serde(rename = "TTRS")]
    Ttrs,
    /// Time To Results from Refinement
    #[serde(rename = "TTRR")]
    Ttrr,
}

impl Phase {
    /// All phases in report column order
    pub const ALL: [Phase; 4] = [Phase::Ttrl, Phase::Ttsbi, Phase::Ttrs, Phase::Ttrr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Ttrl => "TTRL",
            Phase::Ttsbi => "TTSBI",
            Phase::Ttrs => "TTRS",
            Phase::Ttrr => "TTRR",
        }
    }

    /// Parse a canonical phase token
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == token)
    }

    /// Map a superseded `pre-load`/`post-load` label onto its canonical phase
    pub fn from_legacy(token: &str) -> Option<Self> {
        match token {
            "pre-load" => Some(Phase::Ttrl),
            "post-load" => Some(Phase::Ttrs),
            _ => None,
        }
    }

    /// The phase that marks one complete scenario execution
    pub fn is_load(&self) -> bool {
        matches!(self, Phase::Ttrl)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_token(s).ok_or_else(|| Error::InvalidField {
            field: "phase",
            value: s.to_string(),
            reason: "not one of TTRL, TTSBI, TTRS, TTRR",
        })
    }
}

/// Structured timing identifier
///
/// Field order matters: it is the encoding order and also the sort order used for
/// aggregate buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimingSampleName {
    pub application: String,
    pub test_name: String,
    pub throttle_profile: String,
    pub phase: String,
}

impl TimingSampleName {
    /// Build a validated sample name
    pub fn new(
        application: impl Into<String>,
        test_name: impl Into<String>,
        throttle_profile: impl Into<String>,
        phase: impl Into<String>,
    ) -> Result<Self> {
        let name = Self {
            application: application.into(),
            test_name: test_name.into(),
            throttle_profile: throttle_profile.into(),
            phase: phase.into(),
        };
        validate_token("application", &name.application)?;
        validate_token("testName", &name.test_name)?;
        validate_token("throttleProfile", &name.throttle_profile)?;
        validate_token("phase", &name.phase)?;
        Ok(name)
    }

    /// Canonical `a.t.p.ph` string form
    pub fn encode(&self) -> String {
        [
            self.application.as_str(),
            self.test_name.as_str(),
            self.throttle_profile.as_str(),
            self.phase.as_str(),
        ]
        .join(".")
    }

    /// Split a raw name into its four fields
    pub fn decode(raw: &str) -> Result<Self> {
        let tokens: Vec<&str> = raw.split(SEPARATOR).collect();
        if tokens.len() != FIELD_COUNT {
            return Err(Error::Decode {
                raw: raw.to_string(),
                tokens: tokens.len(),
            });
        }
        Self::new(tokens[0], tokens[1], tokens[2], tokens[3])
    }

    /// The canonical phase, if the phase token is one
    pub fn phase_kind(&self) -> Option<Phase> {
        Phase::from_token(&self.phase)
    }

    /// Rewrite a legacy `pre-load`/`post-load` phase to its canonical token
    pub fn with_legacy_phase_mapped(mut self) -> Self {
        if let Some(phase) = Phase::from_legacy(&self.phase) {
            self.phase = phase.as_str().to_string();
        }
        self
    }
}

impl fmt::Display for TimingSampleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for TimingSampleName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

/// The `application.testName.throttleProfile` part shared by all samples of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SamplePrefix {
    application: String,
    test_name: String,
    throttle_profile: String,
}

impl SamplePrefix {
    pub fn new(
        application: impl Into<String>,
        test_name: impl Into<String>,
        throttle_profile: impl Into<String>,
    ) -> Result<Self> {
        let prefix = Self {
            application: application.into(),
            test_name: test_name.into(),
            throttle_profile: throttle_profile.into(),
        };
        validate_token("application", &prefix.application)?;
        validate_token("testName", &prefix.test_name)?;
        validate_token("throttleProfile", &prefix.throttle_profile)?;
        Ok(prefix)
    }

    /// Full sample name for one phase of this scenario
    pub fn sample(&self, phase: Phase) -> TimingSampleName {
        TimingSampleName {
            application: self.application.clone(),
            test_name: self.test_name.clone(),
            throttle_profile: self.throttle_profile.clone(),
            phase: phase.as_str().to_string(),
        }
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn throttle_profile(&self) -> &str {
        &self.throttle_profile
    }
}

impl fmt::Display for SamplePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.application, self.test_name, self.throttle_profile)
    }
}

/// Encode four fields into a flat sample name
pub fn encode(application: &str, test_name: &str, throttle_profile: &str, phase: &str) -> Result<String> {
    TimingSampleName::new(application, test_name, throttle_profile, phase).map(|n| n.encode())
}

/// Decode a flat sample name into its fields
pub fn decode(raw: &str) -> Result<TimingSampleName> {
    TimingSampleName::decode(raw)
}

/// Check that a value can be used as a name field
pub fn validate_token(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidField {
            field,
            value: value.to_string(),
            reason: "must not be empty",
        });
    }
    if value.contains(SEPARATOR) {
        return Err(Error::InvalidField {
            field,
            value: value.to_string(),
            reason: "must not contain '.'",
        });
    }
    Ok(())
}
