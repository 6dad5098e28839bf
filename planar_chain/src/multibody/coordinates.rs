//! # 广义坐标分配
//!
//! 每个关节对应一个广义坐标 qᵢ（相对转角）和一个广义速度 uᵢ。
//! 这里确定的下标 i 就是后续所有阶段以及最终输出使用的规范下标，
//! 等于关节在拓扑输入序列中的位置。

use std::collections::HashMap;

use super::error::{Result, SimulationError};
use super::model::{JointId, Topology};

/// 一个广义坐标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralizedCoordinate {
    /// 规范下标（从 0 开始）
    pub index: usize,
    pub joint: JointId,
    /// 坐标符号，如 `q1`
    pub coordinate: String,
    /// 速度符号，如 `u1`
    pub speed: String,
}

/// 关节到广义坐标的映射
///
/// 载荷按关节标识匹配，下标在这里一次性记录下来。
#[derive(Debug, Clone)]
pub struct CoordinateMap {
    coordinates: Vec<GeneralizedCoordinate>,
    by_joint: HashMap<JointId, usize>,
}

/// 为拓扑中的每个关节分配广义坐标
///
/// # 错误
/// 没有关节时返回 [`SimulationError::EmptyTopology`]。
pub fn assign_coordinates(topology: &Topology) -> Result<CoordinateMap> {
    let joints = topology.joints();
    if joints.is_empty() {
        return Err(SimulationError::EmptyTopology);
    }

    let mut coordinates = Vec::with_capacity(joints.len());
    let mut by_joint = HashMap::with_capacity(joints.len());

    for (index, joint) in joints.iter().enumerate() {
        if by_joint.insert(joint.id, index).is_some() {
            return Err(SimulationError::TopologyMismatch(format!(
                "{} appears more than once",
                joint.id
            )));
        }
        coordinates.push(GeneralizedCoordinate {
            index,
            joint: joint.id,
            coordinate: format!("q{}", index + 1),
            speed: format!("u{}", index + 1),
        });
    }

    Ok(CoordinateMap {
        coordinates,
        by_joint,
    })
}

impl CoordinateMap {
    /// 自由度数量 N
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// 状态向量长度 2N
    pub fn state_len(&self) -> usize {
        2 * self.coordinates.len()
    }

    pub fn coordinates(&self) -> &[GeneralizedCoordinate] {
        &self.coordinates
    }

    pub fn index_of(&self, joint: JointId) -> Option<usize> {
        self.by_joint.get(&joint).copied()
    }

    /// 把状态向量拆成 (q, u)
    pub fn split_state<'a>(&self, state: &'a [f64]) -> (&'a [f64], &'a [f64]) {
        state.split_at(self.len())
    }

    /// 运动学微分方程 q̇ᵢ = uᵢ
    ///
    /// 方程右端只通过这里填写 q 的导数。
    pub fn kinematic_differential(&self, u: &[f64], qdot: &mut [f64]) {
        qdot.copy_from_slice(u);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multibody::model::TopologyBuilder;
    use bevy::math::DVec2;

    #[test]
    fn test_empty_topology() {
        let topology = TopologyBuilder::new().build().unwrap();
        assert_eq!(
            assign_coordinates(&topology).unwrap_err(),
            SimulationError::EmptyTopology
        );
    }

    #[test]
    fn test_canonical_order() {
        let mut builder = TopologyBuilder::new();
        let a = builder.add_body(DVec2::ZERO, DVec2::NEG_Y, 1.0, 0.1);
        let b = builder.add_body(DVec2::NEG_Y, DVec2::new(0.0, -2.0), 1.0, 0.1);
        let j0 = builder.add_hinge(None, a);
        let j1 = builder.add_hinge(Some(a), b);
        let topology = builder.build().unwrap();

        let coords = assign_coordinates(&topology).unwrap();
        assert_eq!(coords.len(), 2);
        assert_eq!(coords.state_len(), 4);
        assert_eq!(coords.index_of(j0), Some(0));
        assert_eq!(coords.index_of(j1), Some(1));
        assert_eq!(coords.coordinates()[1].coordinate, "q2");
        assert_eq!(coords.coordinates()[1].speed, "u2");

        let mut qdot = [0.0; 2];
        coords.kinematic_differential(&[0.5, -1.5], &mut qdot);
        assert_eq!(qdot, [0.5, -1.5]);
    }
}
