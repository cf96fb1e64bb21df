//! 眨眼检测模块
//!
//! 基于双阈值（滞回）的两状态机进行眨眼检测：
//! Open（睁眼）→ Closing（眨眼进行中）→ Open
//!
//! 使用左右眼各自的 EAR（而非平均值）判断状态转换：
//! - 任一只眼低于低阈值即进入 Closing
//! - 双眼都高于高阈值才回到 Open，并计一次眨眼
//!
//! 两个阈值之间的死区用来吸收噪声，避免信号在单一阈值附近抖动时
//! 被误判为连续多次眨眼。

use serde::{Deserialize, Serialize};

/// 默认低阈值
pub const DEFAULT_LOW_THRESHOLD: f64 = 0.21;
/// 默认高阈值
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.23;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlinkState {
    Open,
    Closing,
}

/// 单帧更新结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkUpdate {
    /// 本帧是否完成了一次眨眼
    pub blink_completed: bool,
    pub state: BlinkState,
    /// 累计眨眼次数
    pub count: u64,
}

/// 眨眼检测器
///
/// 计数器单调不减，只由本检测器修改。
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    low_threshold: f64,
    high_threshold: f64,
    state: BlinkState,
    count: u64,
}

impl Default for BlinkDetector {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_THRESHOLD, DEFAULT_HIGH_THRESHOLD)
    }
}

impl BlinkDetector {
    pub fn new(low_threshold: f64, high_threshold: f64) -> Self {
        Self {
            low_threshold,
            high_threshold,
            state: BlinkState::Open,
            count: 0,
        }
    }

    pub fn update(&mut self, left_ear: f64, right_ear: f64) -> BlinkUpdate {
        let mut blink_completed = false;

        if left_ear < self.low_threshold || right_ear < self.low_threshold {
            self.state = BlinkState::Closing;
        } else if self.state == BlinkState::Closing
            && left_ear > self.high_threshold
            && right_ear > self.high_threshold
        {
            self.state = BlinkState::Open;
            self.count += 1;
            blink_completed = true;
        }

        BlinkUpdate {
            blink_completed,
            state: self.state,
            count: self.count,
        }
    }

    pub fn state(&self) -> BlinkState {
        self.state
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn thresholds(&self) -> (f64, f64) {
        (self.low_threshold, self.high_threshold)
    }
}
