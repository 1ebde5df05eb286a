// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application identifier (config directory name)
pub const APP_ID: &str = "livecast";

/// Config file name inside the application config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Timing constants for device handling
pub mod timing {
    use super::Duration;

    /// Settle delay between releasing a video track and re-acquiring it
    /// after the operator turns video back on
    pub const TOGGLE_DEBOUNCE: Duration = Duration::from_millis(500);

    /// Settle delay before the one-shot automatic reacquire
    pub const RECOVERY_SETTLE: Duration = Duration::from_millis(500);
}

/// Capture quality targets used to build the standard constraint cascade
pub mod capture {
    /// Broadcast target resolution (720p)
    pub const TARGET_WIDTH: u32 = 1280;
    pub const TARGET_HEIGHT: u32 = 720;

    /// Broadcast target framerate
    pub const TARGET_FRAME_RATE: u32 = 30;

    /// Lowest framerate accepted by the relaxed tiers
    pub const MIN_FRAME_RATE: u32 = 15;

    /// Relaxed-tier floors
    pub const MIN_WIDTH: u32 = 640;
    pub const MIN_HEIGHT: u32 = 480;

    /// Basic-tier target and floors
    pub const BASIC_WIDTH: u32 = 640;
    pub const BASIC_HEIGHT: u32 = 480;
    pub const BASIC_MIN_WIDTH: u32 = 320;
    pub const BASIC_MIN_HEIGHT: u32 = 240;

    /// 16:9
    pub const TARGET_ASPECT_RATIO: f64 = 16.0 / 9.0;

    /// Output narrower or shorter than this is treated as under-provisioned
    pub const MIN_VIDEO_DIMENSION: u32 = 100;
}

/// Session defaults
pub mod session {
    /// Capacity of the session event channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;

    /// Streamer display name when none is configured
    pub const DEFAULT_OPERATOR: &str = "Streamer";

    /// Author name used for system chat messages
    pub const SYSTEM_AUTHOR: &str = "System";

    /// Second greeting appended when a session goes live
    pub const WELCOME_MESSAGE: &str = "Welcome to the live stream chat!";
}

/// Stream directory defaults
pub mod directory {
    /// Default number of approved streams returned by a listing
    pub const DEFAULT_LIST_LIMIT: usize = 20;

    /// YouTube live embed prefix; the channel id is appended
    pub const YOUTUBE_EMBED_PREFIX: &str = "https://www.youtube.com/embed/live_stream?channel=";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relaxed_floors_below_target() {
        assert!(capture::MIN_WIDTH < capture::TARGET_WIDTH);
        assert!(capture::MIN_HEIGHT < capture::TARGET_HEIGHT);
        assert!(capture::BASIC_MIN_WIDTH < capture::BASIC_WIDTH);
        assert!(capture::MIN_FRAME_RATE < capture::TARGET_FRAME_RATE);
    }

    #[test]
    fn test_target_matches_aspect_ratio() {
        let ratio = capture::TARGET_WIDTH as f64 / capture::TARGET_HEIGHT as f64;
        assert!((ratio - capture::TARGET_ASPECT_RATIO).abs() < 1e-9);
    }
}
