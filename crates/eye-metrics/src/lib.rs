//! 眼部注意力信号计算库
//!
//! 本库把单帧的眼部关键点转换为注意力相关的指标，所有计算均为纯函数或
//! 由调用方独占的小型状态机，不涉及 IO 与线程。
//!
//! ## 模块
//! - `ear`: EAR (Eye Aspect Ratio) 眼部纵横比与眼睛中心点
//! - `blink`: 双阈值（滞回）眨眼状态机
//! - `motion`: 眼睛中心点移动速度估计
//! - `attention`: 综合专注度评分
//! - `smoothing`: 仪表盘显示值的限速缓动

pub mod attention;
pub mod blink;
pub mod ear;
pub mod motion;
pub mod smoothing;

use serde::{Deserialize, Serialize};

// 重新导出核心类型，方便外部使用
pub use attention::AttentionScorer;
pub use blink::{BlinkDetector, BlinkState, BlinkUpdate};
pub use ear::{extract, EyeMetrics};
pub use motion::{EyeSpeeds, MotionEstimator};
pub use smoothing::smooth_change;

/// 像素坐标系中的二维关键点
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 截断为整数像素的眼睛中心点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &PixelPoint) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

/// 单只眼睛的 6 个关键点
///
/// 顺序固定为解剖学顺序：
/// - p0: 外眼角
/// - p1, p2: 上眼睑
/// - p3: 内眼角
/// - p4, p5: 下眼睑（p4 与 p2 相对，p5 与 p1 相对）
///
/// 点数由数组类型保证；调换顺序会破坏 EAR 公式。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EyeShape {
    points: [Point; 6],
}

impl EyeShape {
    pub const fn new(points: [Point; 6]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point; 6] {
        &self.points
    }

    /// 水平宽度 |p0 - p3|，即 EAR 的分母（未乘 2）
    pub fn horizontal_width(&self) -> f64 {
        self.points[0].distance(&self.points[3])
    }

    /// 对所有点做统一缩放与平移，主要用于测试几何不变性
    pub fn transformed(&self, scale: f64, dx: f64, dy: f64) -> Self {
        let mut points = self.points;
        for p in &mut points {
            p.x = p.x * scale + dx;
            p.y = p.y * scale + dy;
        }
        Self { points }
    }
}

/// 一帧中检测到的一张人脸（仅包含双眼）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left: EyeShape,
    pub right: EyeShape,
}
