//! # 能量计算模块
//!
//! 动能、重力势能和总机械能，用于检查积分的能量漂移。

use super::dynamics::EquationsOfMotion;
use super::kinematics::forward_kinematics;
use super::planar_algebra::inertia_mul_motion;

/// 动能
///
/// ```text
/// T = Σ ½ m v_com² + ½ I ω²
/// ```
pub fn kinetic_energy(eom: &EquationsOfMotion, q: &[f64], u: &[f64]) -> f64 {
    let kin = eom.kinematics(q, u);
    eom.chain()
        .links
        .iter()
        .zip(&kin.bodies)
        .map(|(link, body)| {
            0.5 * body
                .twist
                .dot(&inertia_mul_motion(link.mass, link.inertia, &body.twist))
        })
        .sum()
}

/// 重力势能，以锚点高度为零
///
/// ```text
/// V = Σ m g y_com        (重力沿 -Y)
/// ```
pub fn potential_energy(eom: &EquationsOfMotion, q: &[f64]) -> f64 {
    let kin = forward_kinematics(eom.chain(), q);
    eom.chain()
        .links
        .iter()
        .zip(&kin.bodies)
        .map(|(link, body)| link.mass * eom.gravity() * body.com.y)
        .sum()
}

/// 总机械能 T + V
pub fn total_energy(eom: &EquationsOfMotion, q: &[f64], u: &[f64]) -> f64 {
    kinetic_energy(eom, q, u) + potential_energy(eom, q)
}
