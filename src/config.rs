//! Tunables of a room. Every field has a default, so a partial JSON document
//! is a valid configuration.

use instant::Duration;
use serde::{Deserialize, Serialize};

use crate::storage::CAMERA_STATE_KEY;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub move_duration_ms: u64,
    pub intro_duration_ms: u64,
    /// Upper bound on how long a video load waits for its first frame.
    pub media_ready_deadline_ms: u64,
    pub storage_key: String,
    pub clear_colour: [f64; 4],
    pub play_intro: bool,
    pub ambient: AmbientConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            move_duration_ms: 1_600,
            intro_duration_ms: 3_200,
            media_ready_deadline_ms: 2_500,
            storage_key: CAMERA_STATE_KEY.to_string(),
            clear_colour: [0.02, 0.02, 0.03, 1.0],
            play_intro: true,
            ambient: AmbientConfig::default(),
        }
    }
}

impl RoomConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn move_duration(&self) -> Duration {
        Duration::from_millis(self.move_duration_ms)
    }

    pub fn intro_duration(&self) -> Duration {
        Duration::from_millis(self.intro_duration_ms)
    }

    pub fn media_ready_deadline(&self) -> Duration {
        Duration::from_millis(self.media_ready_deadline_ms)
    }
}

/// Parameters of the per-frame feature animations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub led_blink_period_ms: u64,
    /// Peak chair rotation in degrees.
    pub chair_sway_degrees: f32,
    pub chair_sway_period_ms: u64,
    pub steam_particles: usize,
    pub steam_rise_speed: f32,
    pub steam_height: f32,
    pub steam_opacity: f32,
    /// Where the steam column starts, usually right above the coffee mug.
    pub steam_origin: [f32; 3],
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            led_blink_period_ms: 1_200,
            chair_sway_degrees: 6.0,
            chair_sway_period_ms: 9_000,
            steam_particles: 8,
            steam_rise_speed: 0.12,
            steam_height: 0.45,
            steam_opacity: 0.35,
            steam_origin: [0.55, 0.95, -0.35],
        }
    }
}
