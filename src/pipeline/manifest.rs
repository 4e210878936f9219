use super::encoder::RenditionArtifact;
use super::planner::level_by_label;

/// Build the HLS master playlist for a finished set of renditions. Entries
/// reference renditions by file name only, so the manifest is valid wherever
/// the job prefix ends up being served from.
pub fn build_master_playlist(renditions: &[RenditionArtifact]) -> String {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");

    for artifact in renditions {
        let Some(level) = level_by_label(artifact.quality) else {
            continue;
        };

        playlist.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{},NAME=\"{}\"\n",
            (level.video_kbps + level.audio_kbps) as u64 * 1000,
            level.width,
            level.height,
            level.label,
        ));
        playlist.push_str(relative_location(&artifact.storage_key));
        playlist.push('\n');
    }

    playlist
}

fn relative_location(storage_key: &str) -> &str {
    storage_key.rsplit('/').next().unwrap_or(storage_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(quality: &'static str, key: &str) -> RenditionArtifact {
        RenditionArtifact {
            quality,
            byte_size: 1024,
            storage_key: key.to_string(),
            checksum: "deadbeef".to_string(),
            local_path: None,
        }
    }

    #[test]
    fn references_every_rendition_by_relative_location() {
        let renditions = vec![
            artifact("1080p", "s1/1/1/j1/1080p.mp4"),
            artifact("720p", "s1/1/1/j1/720p.mp4"),
            artifact("480p", "s1/1/1/j1/480p.mp4"),
            artifact("360p", "s1/1/1/j1/360p.mp4"),
        ];

        let playlist = build_master_playlist(&renditions);

        for name in ["1080p.mp4", "720p.mp4", "480p.mp4", "360p.mp4"] {
            assert!(playlist.contains(&format!("\n{}\n", name)), "missing {}", name);
        }
        assert!(!playlist.contains("s1/1/1/j1"), "locations must be relative");
    }

    #[test]
    fn preserves_plan_order_and_declares_bandwidth() {
        let renditions = vec![
            artifact("720p", "p/720p.mp4"),
            artifact("360p", "p/360p.mp4"),
        ];

        let playlist = build_master_playlist(&renditions);

        let hi = playlist.find("720p.mp4").unwrap();
        let lo = playlist.find("360p.mp4").unwrap();
        assert!(hi < lo);
        assert!(playlist.contains("BANDWIDTH=2928000"));
        assert!(playlist.contains("RESOLUTION=1280x720"));
    }

    #[test]
    fn starts_with_the_m3u8_header() {
        let playlist = build_master_playlist(&[artifact("360p", "p/360p.mp4")]);
        assert!(playlist.starts_with("#EXTM3U\n"));
    }
}
