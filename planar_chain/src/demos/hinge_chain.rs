//! # Hinge Chain Demo
//!
//! 使用平面多体框架搭建的铰链链条模型。
//!
//! ## 系统描述
//!
//! - **N 根均匀细杆**：沿 -Y 首尾相接，惯量 m L²/12
//! - **N 个 Hinge 关节**：第一个关节固定在世界原点，其余连接相邻两杆
//! - **重力**：9.81 m/s² 沿 -Y 方向
//!
//! ## 物理参数
//!
//! - 时间步长: 0.01s
//! - 积分器: RK4 (四阶龙格库塔)

use bevy::math::DVec2;
use log::debug;

use crate::multibody::error::Result;
use crate::multibody::geometry::rod_inertia;
use crate::multibody::model::{Topology, TopologyBuilder};

/// 默认连杆数量
pub const NUM_LINKS: usize = 6;

/// 默认连杆参数
pub const LINK_LENGTH: f64 = 0.5;
pub const LINK_MASS: f64 = 1.0;

/// 关节阻尼 (N·m·s/rad)
pub const JOINT_DAMPING: f64 = 0.1;

/// 创建铰链链条
///
/// ## 几何结构
///
/// ```text
///     ● (anchor point at origin)
///     |
///     ├─── Link 1 (y: 0 → -L)
///     |    Joint 2 (at y=-L)
///     |
///     ├─── Link 2 (y: -L → -2L)
///     |    Joint 3 (at y=-2L)
///     ...
/// ```
///
/// 所有关节角为 0 时链条竖直下垂，是重力下的平衡位置。
pub fn create_hinge_chain(num_links: usize, link_length: f64, link_mass: f64) -> Result<Topology> {
    let mut builder = TopologyBuilder::new();
    let inertia = rod_inertia(link_mass, link_length);

    let mut parent = None;
    for i in 0..num_links {
        let top = DVec2::new(0.0, -(i as f64) * link_length);
        let bottom = DVec2::new(0.0, -((i + 1) as f64) * link_length);

        let body = builder.add_body(top, bottom, link_mass, inertia);
        let joint = builder.add_joint(parent, body, Some(top), Default::default());
        builder.set_joint_damping(joint, JOINT_DAMPING);
        parent = Some(body);
    }

    debug!(
        "hinge chain: {num_links} links, L = {link_length} m, m = {link_mass} kg, I = {inertia:.6} kg·m²"
    );

    builder.build()
}

/// 双连杆力矩场景
///
/// 两根杆 L = 1, m = 1, I = 0.1，从静止下垂开始；第二个关节上施加 1 N·m 的常值载荷。
/// h = 0.01, T = 1.0，共 101 个采样点。
pub fn two_link_torque_scenario() -> Result<Topology> {
    let mut builder = TopologyBuilder::new();

    let upper = builder.add_body(DVec2::ZERO, DVec2::new(0.0, -1.0), 1.0, 0.1);
    let lower = builder.add_body(DVec2::new(0.0, -1.0), DVec2::new(0.0, -2.0), 1.0, 0.1);

    builder.add_hinge(None, upper);
    let elbow = builder.add_hinge(Some(upper), lower);
    builder.add_load(elbow, 1.0);

    builder.time_step(0.01).duration(1.0);
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multibody::model::JointKind;

    #[test]
    fn test_create_hinge_chain() {
        let topology = create_hinge_chain(NUM_LINKS, LINK_LENGTH, LINK_MASS).unwrap();

        assert_eq!(topology.bodies().len(), NUM_LINKS);
        assert_eq!(topology.joints().len(), NUM_LINKS);

        // 检查第一个关节固定在锚点
        assert_eq!(topology.joints()[0].parent, None);
        assert_eq!(topology.joints()[0].position, DVec2::ZERO);

        // 检查链式连接
        for i in 1..NUM_LINKS {
            let joint = &topology.joints()[i];
            assert_eq!(joint.parent, Some(topology.bodies()[i - 1].id()));
            assert_eq!(joint.child, topology.bodies()[i].id());
            assert_eq!(joint.kind, JointKind::Hinge);
        }

        for body in topology.bodies() {
            assert!((body.length() - LINK_LENGTH).abs() < 1e-12);
        }
    }

    #[test]
    fn test_two_link_scenario() {
        let topology = two_link_torque_scenario().unwrap();

        assert_eq!(topology.joints().len(), 2);
        assert_eq!(topology.loads().len(), 1);
        assert_eq!(topology.loads()[0].joint, topology.joints()[1].id);
        assert_eq!(topology.settings().sample_count(), 101);
    }
}
