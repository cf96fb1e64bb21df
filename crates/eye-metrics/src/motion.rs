//! 眼动速度估计模块
//!
//! 相邻两帧眼睛中心点的欧氏距离除以经过的秒数，单位为 像素/秒。

use serde::{Deserialize, Serialize};

use crate::PixelPoint;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EyeSpeeds {
    pub left: f64,
    pub right: f64,
}

impl EyeSpeeds {
    pub fn average(&self) -> f64 {
        (self.left + self.right) / 2.0
    }
}

#[derive(Debug, Clone, Copy)]
struct MotionSample {
    left: PixelPoint,
    right: PixelPoint,
    /// 时间戳（秒）
    timestamp: f64,
}

/// 速度估计器
///
/// 会话第一帧没有前一帧可比较，速度定义为 0。
#[derive(Debug, Clone, Default)]
pub struct MotionEstimator {
    previous: Option<MotionSample>,
}

impl MotionEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 输入当前帧双眼中心点与时间戳（秒），返回双眼瞬时速度
    ///
    /// 时间差不为正（重复或乱序时间戳）时该帧速度记为 0，
    /// 当前帧仍会成为下一次计算的参考点。
    pub fn update(&mut self, left: PixelPoint, right: PixelPoint, timestamp: f64) -> EyeSpeeds {
        let speeds = match self.previous {
            Some(prev) => {
                let elapsed = timestamp - prev.timestamp;
                if elapsed > 0.0 {
                    EyeSpeeds {
                        left: left.distance(&prev.left) / elapsed,
                        right: right.distance(&prev.right) / elapsed,
                    }
                } else {
                    EyeSpeeds::default()
                }
            }
            None => EyeSpeeds::default(),
        };

        self.previous = Some(MotionSample {
            left,
            right,
            timestamp,
        });
        speeds
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}
