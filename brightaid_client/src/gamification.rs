use crate::models::NgoGamification;

/// Point thresholds at which a new level is reached.
pub const LEVEL_THRESHOLDS: [i64; 5] = [100, 200, 500, 1000, 2000];

pub const STARTER_BADGES: &str = r#"["New NGO"]"#;

/// Points still needed to reach the next level; `0` once the top level is reached.
pub fn points_to_next_level(points: i64) -> i64 {
    LEVEL_THRESHOLDS
        .iter()
        .find(|&&threshold| points < threshold)
        .map(|threshold| threshold - points)
        .unwrap_or(0)
}

/// How far through the current level band `points` is, as a percentage in `[0, 100]`.
pub fn progress_percentage(points: i64) -> f64 {
    let mut lower = 0;
    for &upper in &LEVEL_THRESHOLDS {
        if points < upper {
            let progress = (points - lower) as f64 / (upper - lower) as f64 * 100.0;
            return progress.clamp(0.0, 100.0);
        }
        lower = upper;
    }
    100.0
}

impl NgoGamification {
    /// Default record for an NGO whose gamification could not be loaded.
    pub fn starter(ngo_id: i64) -> Self {
        Self {
            ngo_id: Some(ngo_id),
            total_points: Some(0),
            badges_earned: Some(STARTER_BADGES.to_string()),
            points_to_next_level: Some(100),
            progress_percentage: Some(0.0),
            ..Self::default()
        }
    }

    /// Fills in the level fields from `total_points`.
    pub fn with_level_progress(mut self) -> Self {
        let points = self.total_points.unwrap_or(0);
        self.points_to_next_level = Some(points_to_next_level(points));
        self.progress_percentage = Some(progress_percentage(points));
        self
    }
}
