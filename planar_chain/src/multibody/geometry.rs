//! # 几何工具模块
//!
//! 提供计算平面连杆转动惯量的工具函数

/// 细长杆绕质心的转动惯量
///
/// ```text
/// I = m L² / 12
/// ```
pub fn rod_inertia(mass: f64, length: f64) -> f64 {
    mass * length * length / 12.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rod_inertia() {
        assert_relative_eq!(rod_inertia(12.0, 1.0), 1.0);
    }
}
