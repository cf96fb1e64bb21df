//! 显示值限速缓动
//!
//! 每个 tick 把上一次显示值向目标值移动至多 `step`，避免仪表盘跳变。

// 浮点累加误差容忍度，避免最后一步因 1ulp 的偏差多走一个 tick
const SNAP_TOLERANCE: f64 = 1e-9;

/// 把 `current` 向 `target` 移动至多 `step`；距离不超过 `step` 时直接到达目标
pub fn smooth_change(current: f64, target: f64, step: f64) -> f64 {
    let delta = target - current;
    if delta.abs() <= step * (1.0 + SNAP_TOLERANCE) {
        target
    } else if delta > 0.0 {
        current + step
    } else {
        current - step
    }
}
