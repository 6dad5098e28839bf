//! # 结果提取
//!
//! 把积分器输出的状态序列按规范下标切分为每个关节的角度和角速度轨迹。
//! 纯投影，不做任何计算。

use serde::Serialize;

use super::coordinates::CoordinateMap;
use super::integrator::Sample;
use super::model::JointId;

/// 单个关节的轨迹
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointTrajectory {
    /// 规范下标（与坐标分配一致）
    pub index: usize,
    pub joint: JointId,
    pub coordinate: String,
    /// (时间, 角度)
    pub angles: Vec<(f64, f64)>,
    /// (时间, 角速度)
    pub speeds: Vec<(f64, f64)>,
}

/// 全部关节的轨迹
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub joints: Vec<JointTrajectory>,
}

/// 从采样中提取轨迹
pub fn extract(coords: &CoordinateMap, samples: &[Sample]) -> Trajectory {
    let n = coords.len();
    let times = samples.iter().map(|sample| sample.time).collect();

    let joints = coords
        .coordinates()
        .iter()
        .map(|coordinate| {
            let i = coordinate.index;
            JointTrajectory {
                index: i,
                joint: coordinate.joint,
                coordinate: coordinate.coordinate.clone(),
                angles: samples.iter().map(|s| (s.time, s.state[i])).collect(),
                speeds: samples.iter().map(|s| (s.time, s.state[n + i])).collect(),
            }
        })
        .collect();

    Trajectory { times, joints }
}

impl Trajectory {
    /// 采样点数量
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn joint(&self, index: usize) -> Option<&JointTrajectory> {
        self.joints.get(index)
    }

    pub fn by_joint(&self, joint: JointId) -> Option<&JointTrajectory> {
        self.joints.iter().find(|trajectory| trajectory.joint == joint)
    }

    /// 第 k 个采样点的广义坐标 q
    pub fn angles_at(&self, k: usize) -> Option<Vec<f64>> {
        self.joints
            .iter()
            .map(|joint| joint.angles.get(k).map(|&(_, angle)| angle))
            .collect()
    }
}
