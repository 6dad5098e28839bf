//! # 运动学模块
//!
//! 从固定的惯性锚点出发，沿串联链逐个构建坐标系和连接点。

use bevy::math::DVec2;

use super::coordinates::CoordinateMap;
use super::error::{Result, SimulationError};
use super::model::{Body, BodyId, JointId, Topology};
use super::planar_algebra::PlanarMotion;
use super::DOWN;

/// 串联链上的一节连杆
///
/// 连杆 k 由第 k 个关节带动，从 point[k] 延伸到 point[k+1]。
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub body: BodyId,
    pub joint: JointId,
    pub mass: f64,
    /// 绕质心的转动惯量
    pub inertia: f64,
    pub length: f64,
    /// 质心到连杆起点的距离（杆件中点）
    pub com_offset: f64,
}

/// 串联链模型
///
/// ## 系统假设
/// - 严格串联：连杆 k 只与 k−1 和 k+1 相连
/// - 可选的底座刚体固定在锚点上，不参与动力学
#[derive(Debug, Clone, PartialEq)]
pub struct ChainModel {
    pub links: Vec<Link>,
    /// 底座刚体（如果拓扑里有）
    pub base: Option<BodyId>,
}

impl ChainModel {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn total_mass(&self) -> f64 {
        self.links.iter().map(|link| link.mass).sum()
    }
}

/// 检查拓扑是否构成串联链，并生成 [`ChainModel`]
///
/// ## 串联规则
/// - 刚体数量为 N（全部是运动连杆）或 N+1（第一个是固定底座）
/// - 关节 0 的父体是锚点（`None`）或底座
/// - 关节 i ≥ 1 的父体是关节 i−1 的子体
/// - 第 i 个运动连杆就是关节 i 的子体
pub fn build_chain(topology: &Topology, coords: &CoordinateMap) -> Result<ChainModel> {
    let joints = topology.joints();
    let bodies = topology.bodies();
    let n = joints.len();

    let (base, moving): (Option<&Body>, &[Body]) = if bodies.len() == n + 1 {
        (Some(&bodies[0]), &bodies[1..])
    } else if bodies.len() == n {
        (None, bodies)
    } else {
        return Err(SimulationError::TopologyMismatch(format!(
            "{n} joints need {n} or {} bodies, got {}",
            n + 1,
            bodies.len()
        )));
    };

    let mut links = Vec::with_capacity(n);
    let mut parent = base.map(Body::id);

    for (i, (joint, body)) in joints.iter().zip(moving).enumerate() {
        if coords.index_of(joint.id) != Some(i) {
            return Err(SimulationError::TopologyMismatch(format!(
                "{} has no coordinate at index {i}",
                joint.id
            )));
        }
        if joint.child != body.id() {
            return Err(SimulationError::TopologyMismatch(format!(
                "{} drives {}, expected {} (chain order)",
                joint.id,
                joint.child,
                body.id()
            )));
        }
        if joint.parent != parent {
            let describe = |id: Option<BodyId>| match id {
                Some(id) => id.to_string(),
                None => "the anchor".to_string(),
            };
            return Err(SimulationError::TopologyMismatch(format!(
                "{} attaches to {}, expected {}",
                joint.id,
                describe(joint.parent),
                describe(parent)
            )));
        }

        links.push(Link {
            body: body.id(),
            joint: joint.id,
            mass: body.mass(),
            inertia: body.inertia(),
            length: body.length(),
            com_offset: 0.5 * body.length(),
        });
        parent = Some(body.id());
    }

    Ok(ChainModel {
        links,
        base: base.map(Body::id),
    })
}

/// 坐标系：frame[i] = frame[i−1] 绕 z 轴转 qᵢ
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame {
    /// 相对惯性系的绝对转角 φᵢ = q₁ + … + qᵢ
    pub angle: f64,
    /// 连杆方向（参考方向 `DOWN` 转过 φᵢ）
    pub axis: DVec2,
    /// 绝对角速度 ωᵢ = u₁ + … + uᵢ
    pub angular_velocity: f64,
}

/// 连接点（锚点、关节、链末端）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChainPoint {
    pub position: DVec2,
    pub velocity: DVec2,
    /// 广义加速度为零时的加速度（向心项）
    pub bias_acceleration: DVec2,
}

/// 连杆质心处的刚体状态
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    pub com: DVec2,
    /// 质心处的运动 [ω, v_com]
    pub twist: PlanarMotion,
    pub bias_acceleration: DVec2,
}

/// 某一构型下整条链的运动学量
///
/// ## 下标约定
/// - `frames[0]` 惯性系，`frames[i]` 对应第 i 个广义坐标（1 起）
/// - `points[0]` 锚点，`points[i]` 是连杆 i−1 的末端
/// - `bodies[k]` 对应连杆 k（从 0 起），位于 `frames[k+1]`
#[derive(Debug, Clone, PartialEq)]
pub struct ChainKinematics {
    pub frames: Vec<Frame>,
    pub points: Vec<ChainPoint>,
    pub bodies: Vec<BodyState>,
}

/// 前向运动学：从广义坐标计算坐标系、连接点和质心位置
///
/// ## 算法流程
///
/// ```text
/// φᵢ     = φᵢ₋₁ + qᵢ
/// eᵢ     = R(φᵢ) · DOWN
/// pᵢ     = pᵢ₋₁ + Lᵢ · eᵢ
/// c_body = pᵢ₋₁ + (Lᵢ / 2) · eᵢ
/// ```
///
/// 速度在这里清零，由 [`compute_velocities`](super::velocity::compute_velocities) 填写。
pub fn forward_kinematics(chain: &ChainModel, q: &[f64]) -> ChainKinematics {
    let n = chain.len();
    let mut frames = Vec::with_capacity(n + 1);
    let mut points = Vec::with_capacity(n + 1);
    let mut bodies = Vec::with_capacity(n);

    frames.push(Frame {
        angle: 0.0,
        axis: DOWN,
        angular_velocity: 0.0,
    });
    points.push(ChainPoint::default());

    for (link, &qi) in chain.links.iter().zip(q) {
        let parent_frame = frames[frames.len() - 1];
        let parent_point = points[points.len() - 1].position;

        let angle = parent_frame.angle + qi;
        let axis = DVec2::from_angle(angle).rotate(DOWN);

        bodies.push(BodyState {
            com: parent_point + link.com_offset * axis,
            ..Default::default()
        });
        frames.push(Frame {
            angle,
            axis,
            angular_velocity: 0.0,
        });
        points.push(ChainPoint {
            position: parent_point + link.length * axis,
            ..Default::default()
        });
    }

    ChainKinematics {
        frames,
        points,
        bodies,
    }
}

/// 锚点、各关节和链末端的世界坐标，供可视化层使用
pub fn joint_positions(chain: &ChainModel, q: &[f64]) -> Vec<DVec2> {
    forward_kinematics(chain, q)
        .points
        .iter()
        .map(|point| point.position)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multibody::coordinates::assign_coordinates;
    use crate::multibody::model::TopologyBuilder;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn two_links() -> (Topology, ChainModel) {
        let mut builder = TopologyBuilder::new();
        let a = builder.add_body(DVec2::ZERO, DVec2::new(0.0, -1.0), 1.0, 0.1);
        let b = builder.add_body(DVec2::new(0.0, -1.0), DVec2::new(0.0, -3.0), 1.0, 0.1);
        builder.add_hinge(None, a);
        builder.add_hinge(Some(a), b);
        let topology = builder.build().unwrap();
        let coords = assign_coordinates(&topology).unwrap();
        let chain = build_chain(&topology, &coords).unwrap();
        (topology, chain)
    }

    #[test]
    fn test_build_chain() {
        let (_, chain) = two_links();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.base, None);
        assert_abs_diff_eq!(chain.links[1].length, 2.0);
        assert_abs_diff_eq!(chain.links[1].com_offset, 1.0);
    }

    #[test]
    fn test_forward_kinematics_rest() {
        let (_, chain) = two_links();
        let kin = forward_kinematics(&chain, &[0.0, 0.0]);

        // 零位时整条链沿 -Y 伸直
        assert_abs_diff_eq!(kin.points[1].position.y, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kin.points[2].position.y, -3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kin.bodies[1].com.y, -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_forward_kinematics_relative_angles() {
        let (_, chain) = two_links();
        // 第一节转到水平 (+x)，第二节相对再转 90° 指向 +y
        let kin = forward_kinematics(&chain, &[FRAC_PI_2, FRAC_PI_2]);

        assert_abs_diff_eq!(kin.points[1].position.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kin.points[1].position.y, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kin.points[2].position.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kin.points[2].position.y, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kin.frames[2].angle, std::f64::consts::PI);
    }

    #[test]
    fn test_joint_positions() {
        let (_, chain) = two_links();
        let positions = joint_positions(&chain, &[FRAC_PI_2, 0.0]);

        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0], DVec2::ZERO);
        assert_abs_diff_eq!(positions[2].x, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(positions[2].y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_base_body_accepted() {
        let mut builder = TopologyBuilder::new();
        let base = builder.add_body(DVec2::new(-1.0, 0.0), DVec2::new(1.0, 0.0), 5.0, 1.0);
        let arm = builder.add_body(DVec2::ZERO, DVec2::new(0.0, -1.0), 1.0, 0.1);
        builder.add_hinge(Some(base), arm);
        let topology = builder.build().unwrap();
        let coords = assign_coordinates(&topology).unwrap();

        let chain = build_chain(&topology, &coords).unwrap();
        assert_eq!(chain.base, Some(base));
        assert_eq!(chain.links[0].body, arm);
    }

    #[test]
    fn test_branching_rejected() {
        // 两个关节都挂在同一个刚体上：不是串联链
        let mut builder = TopologyBuilder::new();
        let a = builder.add_body(DVec2::ZERO, DVec2::NEG_Y, 1.0, 0.1);
        let b = builder.add_body(DVec2::NEG_Y, DVec2::new(0.0, -2.0), 1.0, 0.1);
        let c = builder.add_body(DVec2::NEG_Y, DVec2::new(1.0, -1.0), 1.0, 0.1);
        builder.add_hinge(None, a);
        builder.add_hinge(Some(a), b);
        builder.add_hinge(Some(a), c);
        let topology = builder.build().unwrap();
        let coords = assign_coordinates(&topology).unwrap();

        assert!(matches!(
            build_chain(&topology, &coords),
            Err(SimulationError::TopologyMismatch(_))
        ));
    }

    #[test]
    fn test_body_count_mismatch() {
        let mut builder = TopologyBuilder::new();
        let a = builder.add_body(DVec2::ZERO, DVec2::NEG_Y, 1.0, 0.1);
        builder.add_body(DVec2::ZERO, DVec2::X, 1.0, 0.1);
        builder.add_body(DVec2::ZERO, DVec2::Y, 1.0, 0.1);
        builder.add_hinge(None, a);
        let topology = builder.build().unwrap();
        let coords = assign_coordinates(&topology).unwrap();

        assert!(build_chain(&topology, &coords).is_err());
    }
}
