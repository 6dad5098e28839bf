//! # 平面空间代数
//!
//! 6D 空间向量在平面运动下退化为 3 个分量：
//!
//! ```text
//! motion = [ω_z, v_x, v_y]   (角速度, 参考点线速度)
//! force  = [τ_z, f_x, f_y]   (力矩,   力)
//! ```
//!
//! 参考点统一取刚体质心，因此惯性矩阵是对角的 diag(I, m, m)。

use std::ops::Sub;

use bevy::math::DVec2;

/// 平面运动向量 (Planar Motion Vector)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanarMotion {
    /// 垂直于平面的角速度 (ω_z)
    pub angular: f64,
    /// 参考点线速度
    pub linear: DVec2,
}

impl PlanarMotion {
    pub fn new(angular: f64, linear: DVec2) -> Self {
        Self { angular, linear }
    }

    /// 绕 `pivot` 以单位角速度转动时，`at` 点处的运动
    ///
    /// 对于 hinge 关节这就是运动子空间（偏速度）：
    /// ```text
    /// S = [1, ẑ × (at − pivot)]
    /// ```
    pub fn rotation_about(pivot: DVec2, at: DVec2) -> Self {
        Self {
            angular: 1.0,
            linear: (at - pivot).perp(),
        }
    }

    /// 两点速度公式：把参考点移动 `r` 后的运动
    ///
    /// ```text
    /// v_B = v_A + ω ẑ × r_AB
    /// ```
    pub fn transfer(&self, r: DVec2) -> Self {
        Self {
            angular: self.angular,
            linear: self.linear + self.angular * r.perp(),
        }
    }

    /// 运动与力的点积（功率），用于投影到关节空间
    ///
    /// ```text
    /// dot = ω·τ + v·f
    /// ```
    pub fn dot(&self, force: &PlanarForce) -> f64 {
        self.angular * force.torque + self.linear.dot(force.force)
    }
}

/// 平面力向量 (Planar Force Vector)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanarForce {
    /// 垂直于平面的力矩 (τ_z)
    pub torque: f64,
    /// 作用在参考点的力
    pub force: DVec2,
}

impl PlanarForce {
    pub fn new(torque: f64, force: DVec2) -> Self {
        Self { torque, force }
    }
}

impl Sub for PlanarForce {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            torque: self.torque - other.torque,
            force: self.force - other.force,
        }
    }
}

/// 质心处的惯性乘运动：f = diag(I, m, m) · v
///
/// 平面内没有陀螺项（ω × Iω 恒为零），所以不需要 cross_force。
pub fn inertia_mul_motion(mass: f64, inertia: f64, v: &PlanarMotion) -> PlanarForce {
    PlanarForce {
        torque: inertia * v.angular,
        force: mass * v.linear,
    }
}

/// 向心加速度 −ω² r
///
/// 刚体上相距 `r` 的两点，在角加速度为零时的相对加速度。
pub fn centripetal(omega: f64, r: DVec2) -> DVec2 {
    -omega * omega * r
}
