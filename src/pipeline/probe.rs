use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::info;

/// What ffprobe tells us about the source before any plan is made.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceProbe {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
    pub bit_rate: Option<u64>,
    pub codec: String,
}

pub struct Prober {
    ffprobe_path: String,
}

impl Prober {
    pub fn new(ffprobe_path: &str) -> Self {
        Self {
            ffprobe_path: ffprobe_path.to_string(),
        }
    }

    pub async fn probe(&self, video_path: &Path) -> Result<SourceProbe> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(video_path)
            .output()
            .await
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let probe = parse_probe_output(&output.stdout)?;

        info!(
            width = probe.width,
            height = probe.height,
            duration = probe.duration_seconds,
            codec = %probe.codec,
            "Source probe completed"
        );

        Ok(probe)
    }
}

fn parse_probe_output(stdout: &[u8]) -> Result<SourceProbe> {
    let probe_data: serde_json::Value =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe output")?;

    let stream = probe_data["streams"]
        .get(0)
        .ok_or_else(|| anyhow!("No video stream found"))?;

    let format = &probe_data["format"];

    let duration = format["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| anyhow!("Could not parse duration"))?;

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse width"))? as u32;

    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse height"))? as u32;

    let codec = stream["codec_name"]
        .as_str()
        .unwrap_or("unknown")
        .to_string();

    let bit_rate = format["bit_rate"].as_str().and_then(|b| b.parse::<u64>().ok());

    Ok(SourceProbe {
        width,
        height,
        duration_seconds: duration,
        bit_rate,
        codec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_HD: &str = r#"{
        "streams": [
            {"codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "25/1"}
        ],
        "format": {"duration": "1420.500000", "bit_rate": "4800000"}
    }"#;

    #[test]
    fn parses_a_full_hd_probe() {
        let probe = parse_probe_output(FULL_HD.as_bytes()).unwrap();
        assert_eq!(probe.width, 1920);
        assert_eq!(probe.height, 1080);
        assert_eq!(probe.duration_seconds, 1420.5);
        assert_eq!(probe.bit_rate, Some(4_800_000));
        assert_eq!(probe.codec, "h264");
    }

    #[test]
    fn rejects_output_without_a_video_stream() {
        let json = r#"{"streams": [], "format": {"duration": "10.0"}}"#;
        let err = parse_probe_output(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("No video stream"));
    }

    #[test]
    fn rejects_output_without_duration() {
        let json = r#"{
            "streams": [{"codec_name": "h264", "width": 640, "height": 360}],
            "format": {}
        }"#;
        assert!(parse_probe_output(json.as_bytes()).is_err());
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(parse_probe_output(b"\xff\xfenot json").is_err());
    }
}
