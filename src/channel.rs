use std::fmt;

use log::info;

use crate::engine::models::Manifest;
use crate::error::UpdateError;

const FORCE_STABLE_KEY: &str = "ForceStable";
const ROLLOUT_PERCENT_KEY: &str = "LatestRolloutPercent";

/// Rollout track. Its name suffixes every manifest URL/version key for the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Channel {
    Stable,
    Latest,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Stable => "Stable",
            Channel::Latest => "Latest",
        }
    }

    /// Draw a channel for this run from the manifest's rollout settings.
    pub fn from_manifest(manifest: &Manifest) -> Result<Self, UpdateError> {
        let force_stable = manifest.boolean(FORCE_STABLE_KEY)?;
        let percent = manifest.integer(ROLLOUT_PERCENT_KEY)?;
        let percent = u32::try_from(percent.clamp(0, 100)).unwrap_or(0);
        let draw: f32 = rand::random();
        let channel = select_channel(force_stable, percent, draw);
        info!(
            "channel: {} (force_stable={}, rollout={}%)",
            channel, force_stable, percent
        );
        Ok(channel)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Latest` with probability `rollout_percent / 100` unless forced stable.
///
/// `draw` is a uniform sample in `[0, 1)`.
#[must_use]
pub fn select_channel(force_stable: bool, rollout_percent: u32, draw: f32) -> Channel {
    if force_stable {
        return Channel::Stable;
    }
    let bucket = (draw.clamp(0.0, 1.0) * 100.0) as u32;
    if bucket < rollout_percent.min(100) {
        Channel::Latest
    } else {
        Channel::Stable
    }
}
