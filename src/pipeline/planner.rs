use super::probe::SourceProbe;

/// One rung of the fixed encoding ladder.
#[derive(Debug, PartialEq, Eq)]
pub struct QualityLevel {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_kbps: u32,
    pub audio_kbps: u32,
}

/// Highest to lowest. The order here is the encode and manifest order.
pub const QUALITY_LADDER: [QualityLevel; 4] = [
    QualityLevel {
        label: "1080p",
        width: 1920,
        height: 1080,
        video_kbps: 5000,
        audio_kbps: 192,
    },
    QualityLevel {
        label: "720p",
        width: 1280,
        height: 720,
        video_kbps: 2800,
        audio_kbps: 128,
    },
    QualityLevel {
        label: "480p",
        width: 854,
        height: 480,
        video_kbps: 1400,
        audio_kbps: 128,
    },
    QualityLevel {
        label: "360p",
        width: 640,
        height: 360,
        video_kbps: 800,
        audio_kbps: 96,
    },
];

pub fn level_by_label(label: &str) -> Option<&'static QualityLevel> {
    QUALITY_LADDER.iter().find(|l| l.label == label)
}

/// Knobs that shape the plan besides the source itself. Today that is only
/// the optional trailer cap.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanPolicy {
    pub max_height: Option<u32>,
}

/// Qualities selected for one job, highest bitrate first. Immutable once
/// computed.
#[derive(Debug)]
pub struct RenditionPlan {
    levels: Vec<&'static QualityLevel>,
}

impl RenditionPlan {
    pub fn levels(&self) -> &[&'static QualityLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.levels.iter().map(|l| l.label.to_string()).collect()
    }
}

/// Select the ladder rungs that do not exceed the source resolution. Never
/// upscale; if the source sits below the whole ladder, fall back to the
/// lowest rung as a best-effort single rendition.
pub fn plan(probe: &SourceProbe, policy: &PlanPolicy) -> RenditionPlan {
    let cap = policy.max_height.unwrap_or(u32::MAX);

    let mut levels: Vec<&'static QualityLevel> = QUALITY_LADDER
        .iter()
        .filter(|l| l.height <= probe.height && l.height <= cap)
        .collect();

    if levels.is_empty() {
        let lowest = QUALITY_LADDER.last().expect("ladder is never empty");
        levels.push(lowest);
    }

    RenditionPlan { levels }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(width: u32, height: u32) -> SourceProbe {
        SourceProbe {
            width,
            height,
            duration_seconds: 1320.0,
            bit_rate: Some(4_000_000),
            codec: "h264".to_string(),
        }
    }

    fn labels(plan: &RenditionPlan) -> Vec<&'static str> {
        plan.levels().iter().map(|l| l.label).collect()
    }

    #[test]
    fn full_hd_source_gets_the_whole_ladder() {
        let p = plan(&probe(1920, 1080), &PlanPolicy::default());
        assert_eq!(labels(&p), vec!["1080p", "720p", "480p", "360p"]);
    }

    #[test]
    fn never_upscales_past_the_source() {
        let p = plan(&probe(1280, 720), &PlanPolicy::default());
        assert_eq!(labels(&p), vec!["720p", "480p", "360p"]);
        for level in p.levels() {
            assert!(level.height <= 720);
        }
    }

    #[test]
    fn source_below_the_ladder_gets_exactly_the_lowest_rung() {
        let p = plan(&probe(426, 240), &PlanPolicy::default());
        assert_eq!(labels(&p), vec!["360p"]);
    }

    #[test]
    fn bitrates_strictly_decrease_down_the_plan() {
        let p = plan(&probe(3840, 2160), &PlanPolicy::default());
        let rates: Vec<u32> = p.levels().iter().map(|l| l.video_kbps).collect();
        for pair in rates.windows(2) {
            assert!(pair[0] > pair[1], "expected strictly decreasing: {:?}", rates);
        }
    }

    #[test]
    fn same_probe_always_yields_the_same_plan() {
        let a = plan(&probe(1920, 1080), &PlanPolicy::default());
        let b = plan(&probe(1920, 1080), &PlanPolicy::default());
        assert_eq!(labels(&a), labels(&b));
    }

    #[test]
    fn trailer_cap_limits_the_top_rung() {
        let policy = PlanPolicy {
            max_height: level_by_label("720p").map(|l| l.height),
        };
        let p = plan(&probe(1920, 1080), &policy);
        assert_eq!(labels(&p), vec!["720p", "480p", "360p"]);
    }

    #[test]
    fn cap_below_the_ladder_still_produces_one_rendition() {
        let policy = PlanPolicy {
            max_height: Some(200),
        };
        let p = plan(&probe(1920, 1080), &policy);
        assert_eq!(labels(&p), vec!["360p"]);
    }
}
