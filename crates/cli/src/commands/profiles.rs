//! Profiles Command

use anyhow::Result;
use serde::Serialize;
use searchperf_common::throttle::{self, ThrottleProfile};

use crate::output::{print_list, OutputFormat, TableDisplay};

/// Throttle profile display wrapper for serialization
#[derive(Serialize)]
pub struct ProfileDisplay {
    #[serde(flatten)]
    pub profile: ThrottleProfile,
    pub baseline: bool,
}

impl From<&ThrottleProfile> for ProfileDisplay {
    fn from(profile: &ThrottleProfile) -> Self {
        Self {
            profile: *profile,
            baseline: profile.is_baseline(),
        }
    }
}

impl TableDisplay for ProfileDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Tag", "CPU", "Network", "Baseline"]
    }

    fn row(&self) -> Vec<String> {
        let network = match &self.profile.network_conditions {
            Some(conditions) => format!("{:?}", conditions.connection_type).to_lowercase(),
            None => "-".to_string(),
        };
        vec![
            self.profile.tag.to_string(),
            format!("{}x", self.profile.cpu_rate),
            network,
            if self.baseline { "yes" } else { "no" }.to_string(),
        ]
    }
}

pub async fn execute(format: OutputFormat) -> Result<()> {
    let profiles: Vec<ProfileDisplay> = throttle::all().iter().map(ProfileDisplay::from).collect();
    print_list(&profiles, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_describe_emulation() {
        let row = ProfileDisplay::from(throttle::lookup("3g-4x").unwrap()).row();
        assert_eq!(row, vec!["3g-4x", "4x", "cellular3g", "no"]);

        let row = ProfileDisplay::from(throttle::lookup("normal").unwrap()).row();
        assert_eq!(row, vec!["normal", "1x", "-", "yes"]);
    }
}
