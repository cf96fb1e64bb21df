//! 综合专注度评分模块
//!
//! score = clamp(1 - |EAR - 参考值| / EAR容差 - 速度 / 速度上限, 0, 1)
//!
//! EAR 接近经验上的"清醒"值且眼动速度接近 0 时得分最高，
//! 任一维度偏离都会线性扣分。实时仪表盘与离线报告共用同一个评分器，
//! 保证两处数值一致。

use serde::{Deserialize, Serialize};

/// 默认 EAR 参考值（清醒状态）
pub const DEFAULT_EAR_REFERENCE: f64 = 0.25;
/// 默认 EAR 容差，同时用作仪表盘 EAR 归一化基准
pub const DEFAULT_EAR_TOLERANCE: f64 = 0.30;
/// 默认速度上限（像素/秒），同时用作仪表盘速度归一化基准
pub const DEFAULT_SPEED_CEILING: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionScorer {
    pub ear_reference: f64,
    pub ear_tolerance: f64,
    pub speed_ceiling: f64,
}

impl Default for AttentionScorer {
    fn default() -> Self {
        Self {
            ear_reference: DEFAULT_EAR_REFERENCE,
            ear_tolerance: DEFAULT_EAR_TOLERANCE,
            speed_ceiling: DEFAULT_SPEED_CEILING,
        }
    }
}

impl AttentionScorer {
    /// 由平均 EAR 与平均速度计算专注度，结果总在 [0, 1]
    pub fn score(&self, ear: f64, speed: f64) -> f64 {
        let raw = 1.0 - (ear - self.ear_reference).abs() / self.ear_tolerance
            - speed / self.speed_ceiling;
        clamp_unit(raw)
    }

    /// 离线报告按行评分：速度取左右眼平均
    pub fn score_row(&self, left_speed: f64, right_speed: f64, average_ear: f64) -> f64 {
        self.score(average_ear, (left_speed + right_speed) / 2.0)
    }

    /// 仪表盘 EAR 条的归一化值
    pub fn normalized_ear(&self, ear: f64) -> f64 {
        clamp_unit(ear / self.ear_tolerance)
    }

    /// 仪表盘速度条的归一化值
    pub fn normalized_speed(&self, speed: f64) -> f64 {
        clamp_unit(speed / self.speed_ceiling)
    }
}

// f64::clamp 对 NaN 原样返回，这里统一归零
fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_scenario_scores() {
        let s = AttentionScorer::default();
        assert!((s.score(0.25, 0.0) - 1.0).abs() < 1e-12);
        assert!((s.score(0.10, 0.0) - 0.5).abs() < 1e-12);
        assert!(s.score(0.25, 300.0).abs() < 1e-12);
    }

    #[test]
    fn row_score_uses_mean_speed() {
        let s = AttentionScorer::default();
        assert!((s.score_row(0.0, 150.0, 0.25) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn infinities_stay_bounded() {
        let s = AttentionScorer::default();
        assert_eq!(s.score(f64::INFINITY, 0.0), 0.0);
        assert_eq!(s.score(0.25, f64::INFINITY), 0.0);
        assert_eq!(s.score(0.25, f64::NEG_INFINITY), 1.0);
        assert_eq!(s.score(f64::INFINITY, f64::NEG_INFINITY), 0.0);
        assert_eq!(s.score(f64::NAN, 0.0), 0.0);
    }

    #[test]
    fn normalization_clamps() {
        let s = AttentionScorer::default();
        assert!((s.normalized_ear(0.15) - 0.5).abs() < 1e-12);
        assert_eq!(s.normalized_ear(0.9), 1.0);
        assert_eq!(s.normalized_speed(-5.0), 0.0);
        assert!((s.normalized_speed(150.0) - 0.5).abs() < 1e-12);
    }
}
