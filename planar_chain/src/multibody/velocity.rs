//! # 速度计算模块
//!
//! 沿链从根到叶传播角速度、连接点速度和向心偏置加速度。
//! 每一节都由父节点的量递推得到，不会对每个刚体从头重新推导。

use super::kinematics::{ChainKinematics, ChainModel};
use super::planar_algebra::{centripetal, PlanarMotion};

/// 计算速度和偏置加速度
///
/// 需要先调用 [`forward_kinematics`](super::kinematics::forward_kinematics)。
///
/// ## 算法
///
/// 对连杆 k（起点 p_k，末端 p_{k+1}）：
/// ```text
/// ω_k      = ω_{k−1} + u_k
/// v_{k+1}  = v_k + ω_k ẑ × (p_{k+1} − p_k)          (两点公式)
/// a_{k+1}  = a_k − ω_k² (p_{k+1} − p_k)              (u̇ = 0 时)
/// ```
/// 质心的速度和偏置加速度用同样的公式，只是把 p_{k+1} 换成 c_k。
///
/// 平面内角加速度 α_k = Σ u̇ 不含速度相关项，所以偏置只有向心部分。
pub fn compute_velocities(chain: &ChainModel, kin: &mut ChainKinematics, u: &[f64]) {
    for (k, &uk) in u.iter().enumerate().take(chain.len()) {
        let parent_omega = kin.frames[k].angular_velocity;
        let origin = kin.points[k];

        let omega = parent_omega + uk;
        kin.frames[k + 1].angular_velocity = omega;

        // 以连杆起点为参考点的运动
        let at_origin = PlanarMotion::new(omega, origin.velocity);

        let r_tip = kin.points[k + 1].position - origin.position;
        kin.points[k + 1].velocity = at_origin.transfer(r_tip).linear;
        kin.points[k + 1].bias_acceleration = origin.bias_acceleration + centripetal(omega, r_tip);

        let r_com = kin.bodies[k].com - origin.position;
        kin.bodies[k].twist = at_origin.transfer(r_com);
        kin.bodies[k].bias_acceleration = origin.bias_acceleration + centripetal(omega, r_com);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multibody::kinematics::{forward_kinematics, Link};
    use crate::multibody::model::{BodyId, JointId};
    use approx::assert_abs_diff_eq;

    fn rod(i: u32, length: f64) -> Link {
        Link {
            body: BodyId(2 * i),
            joint: JointId(2 * i + 1),
            mass: 1.0,
            inertia: 0.1,
            length,
            com_offset: 0.5 * length,
        }
    }

    #[test]
    fn test_single_link_velocity() {
        let chain = ChainModel {
            links: vec![rod(0, 1.0)],
            base: None,
        };
        let mut kin = forward_kinematics(&chain, &[0.0]);
        compute_velocities(&chain, &mut kin, &[1.0]);

        // 质心 (0, -0.5) 以 1 rad/s 绕原点转动，速度沿 +x
        let body = &kin.bodies[0];
        assert_abs_diff_eq!(body.twist.angular, 1.0);
        assert_abs_diff_eq!(body.twist.linear.x, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(body.twist.linear.y, 0.0, epsilon = 1e-12);

        // 向心加速度指向转轴
        assert_abs_diff_eq!(body.bias_acceleration.y, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_chain_rule_propagation() {
        let chain = ChainModel {
            links: vec![rod(0, 1.0), rod(1, 1.0)],
            base: None,
        };
        let mut kin = forward_kinematics(&chain, &[0.0, 0.0]);
        compute_velocities(&chain, &mut kin, &[1.0, -1.0]);

        // 第二节绝对角速度为零，整体平移：速度等于关节 1 的速度
        assert_abs_diff_eq!(kin.frames[2].angular_velocity, 0.0);
        assert_abs_diff_eq!(kin.points[1].velocity.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kin.points[2].velocity.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kin.bodies[1].twist.linear.x, 1.0, epsilon = 1e-12);

        // 关节 1 的向心加速度沿链传递
        assert_abs_diff_eq!(kin.points[2].bias_acceleration.y, 1.0, epsilon = 1e-12);
    }
}
