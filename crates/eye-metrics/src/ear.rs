//! EAR (Eye Aspect Ratio) 计算模块
//!
//! 基于标准 6 点眼部关键点计算睁眼程度与眼睛中心点。
//! EAR 值用于判断眼睛的睁闭状态，是眨眼检测与专注度评分的输入。

use serde::{Deserialize, Serialize};

use crate::{EyeShape, FaceLandmarks, PixelPoint};

/// 标准 6 点 EAR
///
/// 公式: EAR = (|p1-p5| + |p2-p4|) / (2 * |p0-p3|)
/// - p0, p3: 眼角点（水平方向）
/// - p1, p5 / p2, p4: 上下眼睑配对点
///
/// 水平距离为 0 时不做保护，直接返回 IEEE 结果（inf 或 NaN），
/// 由调用方决定如何处理退化几何。
pub fn eye_aspect_ratio(eye: &EyeShape) -> f64 {
    let p = eye.points();
    let vertical1 = p[1].distance(&p[5]);
    let vertical2 = p[2].distance(&p[4]);
    (vertical1 + vertical2) / (2.0 * eye.horizontal_width())
}

/// 6 个关键点的算术平均，截断为整数像素
pub fn eye_center(eye: &EyeShape) -> PixelPoint {
    let (sum_x, sum_y) = eye
        .points()
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let n = eye.points().len() as f64;
    // `as` 向零截断
    PixelPoint::new((sum_x / n) as i32, (sum_y / n) as i32)
}

/// 单帧双眼几何指标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EyeMetrics {
    pub left_ear: f64,
    pub right_ear: f64,
    pub average_ear: f64,
    pub left_center: PixelPoint,
    pub right_center: PixelPoint,
}

/// 从一张人脸的双眼关键点提取 EAR 与中心点
pub fn extract(face: &FaceLandmarks) -> EyeMetrics {
    let left_ear = eye_aspect_ratio(&face.left);
    let right_ear = eye_aspect_ratio(&face.right);
    EyeMetrics {
        left_ear,
        right_ear,
        average_ear: (left_ear + right_ear) / 2.0,
        left_center: eye_center(&face.left),
        right_center: eye_center(&face.right),
    }
}
