use std::collections::{HashMap, HashSet};

use crate::engine::{
    NetworkQuality, NetworkQualityStats, RemoteAudioStats, RemoteStreamStats, RemoteVideoStats,
};
use crate::settings::VOLUME_SPEAKING_THRESHOLD;

/// Remote stream statistics with the latest network quality attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStatsReport {
    pub user_id: String,
    pub quality: NetworkQuality,
    pub audio: Option<RemoteAudioStats>,
    pub video: Option<RemoteVideoStats>,
}

/// Edge detector over periodic audio level samples.
///
/// Local and remote users share one cache, keyed by user id. Only ids
/// currently speaking are stored.
#[derive(Debug, Default)]
pub struct SpeakingTracker {
    speaking: HashSet<String>,
}

impl SpeakingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new speaking state when it differs from the last sample.
    pub fn update(&mut self, user_id: &str, linear_volume: i32) -> Option<bool> {
        let speaking = linear_volume > VOLUME_SPEAKING_THRESHOLD;
        let was_speaking = self.speaking.contains(user_id);
        if speaking == was_speaking {
            return None;
        }
        if speaking {
            self.speaking.insert(user_id.to_string());
        } else {
            self.speaking.remove(user_id);
        }
        Some(speaking)
    }

    pub fn is_speaking(&self, user_id: &str) -> bool {
        self.speaking.contains(user_id)
    }

    pub fn forget(&mut self, user_id: &str) {
        self.speaking.remove(user_id);
    }

    pub fn clear(&mut self) {
        self.speaking.clear();
    }
}

/// Latest receive-side quality per remote user.
///
/// Quality and detailed stats arrive on separate callbacks; the cached
/// quality is stitched onto the next stats report for that user.
#[derive(Debug, Default)]
pub struct NetworkQualityCache {
    qualities: HashMap<String, NetworkQuality>,
}

impl NetworkQualityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, remote: &[NetworkQualityStats]) {
        for stats in remote {
            self.qualities.insert(stats.user_id.clone(), stats.rx_quality);
        }
    }

    pub fn quality(&self, user_id: &str) -> NetworkQuality {
        self.qualities.get(user_id).copied().unwrap_or_default()
    }

    pub fn stitch(&self, stats: RemoteStreamStats) -> RemoteStatsReport {
        RemoteStatsReport {
            quality: self.quality(&stats.user_id),
            user_id: stats.user_id,
            audio: stats.audio,
            video: stats.video,
        }
    }

    pub fn forget(&mut self, user_id: &str) {
        self.qualities.remove(user_id);
    }

    pub fn clear(&mut self) {
        self.qualities.clear();
    }
}
