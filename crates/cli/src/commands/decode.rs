//! Decode Command

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use searchperf_common::{sample_name, TimingSampleName};

use crate::output::{or_dash, print_item, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Encoded sample name, e.g. scix.first-author.normal.TTRL
    pub name: String,

    /// Map legacy pre-load/post-load phases onto TTRL/TTRS
    #[arg(long)]
    pub legacy_phases: bool,
}

/// Decoded sample name display wrapper for serialization
#[derive(Serialize)]
pub struct DecodedDisplay {
    pub application: String,
    pub test_name: String,
    pub throttle_profile: String,
    pub phase: String,
    /// Canonical phase, if the phase token is one
    pub canonical_phase: Option<String>,
    pub known_profile: bool,
}

impl From<TimingSampleName> for DecodedDisplay {
    fn from(name: TimingSampleName) -> Self {
        let canonical_phase = name.phase_kind().map(|p| p.to_string());
        let known_profile = searchperf_common::throttle::lookup(&name.throttle_profile).is_ok();
        Self {
            application: name.application,
            test_name: name.test_name,
            throttle_profile: name.throttle_profile,
            phase: name.phase,
            canonical_phase,
            known_profile,
        }
    }
}

impl TableDisplay for DecodedDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Application", "Test", "Profile", "Phase", "Canonical", "Known Profile"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.application.clone(),
            self.test_name.clone(),
            self.throttle_profile.clone(),
            self.phase.clone(),
            or_dash(self.canonical_phase.as_deref()),
            if self.known_profile { "yes" } else { "no" }.to_string(),
        ]
    }
}

/// Decode and print a sample name; a malformed name is an error
pub async fn execute(args: DecodeArgs, format: OutputFormat) -> Result<()> {
    let mut name = sample_name::decode(&args.name)?;
    if args.legacy_phases {
        name = name.with_legacy_phase_mapped();
    }
    print_item(&DecodedDisplay::from(name), format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_of_legacy_name() {
        let name = sample_name::decode("bbb.citations.normal.pre-load").unwrap();
        let display = DecodedDisplay::from(name.clone());
        assert_eq!(display.canonical_phase, None);

        let display = DecodedDisplay::from(name.with_legacy_phase_mapped());
        assert_eq!(display.canonical_phase.as_deref(), Some("TTRL"));
        assert!(display.known_profile);
    }
}
