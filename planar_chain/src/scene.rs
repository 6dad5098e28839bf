//! # 场景文件
//!
//! JSON 格式的铰链链条场景。刚体、关节和载荷在文件中按数组下标互相引用，
//! 读取时一次性解析成 [`BodyId`] / [`JointId`]，之后只使用标识。
//!
//! ```json
//! {
//!   "bodies": [
//!     { "point1": [0, 0], "point2": [0, -1], "mass": 1, "inertia": 0.1 }
//!   ],
//!   "joints": [{ "parent": null, "child": 0 }],
//!   "loads": [{ "joint": 0, "torque": 1.0 }],
//!   "settings": { "time_step": 0.01, "duration": 1.0 },
//!   "initial": { "q": [0.3], "u": [0.0] }
//! }
//! ```

use std::path::Path;

use bevy::math::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::multibody::error::SimulationError;
use crate::multibody::model::{BodyId, JointId, JointKind, SimulationSettings, Topology, TopologyBuilder};
use crate::multibody::simulation::Simulation;

/// 场景读取错误
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

pub type Result<T> = std::result::Result<T, SceneError>;

/// 场景文件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSpec {
    pub bodies: Vec<BodySpec>,
    #[serde(default)]
    pub joints: Vec<JointSpec>,
    #[serde(default)]
    pub loads: Vec<LoadSpec>,
    #[serde(default)]
    pub settings: SimulationSettings,
    #[serde(default)]
    pub initial: Option<InitialSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySpec {
    pub point1: [f64; 2],
    pub point2: [f64; 2],
    pub mass: f64,
    pub inertia: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    /// 父刚体下标；`null` 表示连接到锚点
    #[serde(default)]
    pub parent: Option<usize>,
    pub child: usize,
    #[serde(default)]
    pub position: Option<[f64; 2]>,
    #[serde(default)]
    pub kind: JointKind,
    #[serde(default)]
    pub torque: f64,
    #[serde(default)]
    pub damping: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSpec {
    /// 关节下标
    pub joint: usize,
    pub torque: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialSpec {
    pub q: Vec<f64>,
    #[serde(default)]
    pub u: Option<Vec<f64>>,
}

/// 读取好的场景：已校验的拓扑 + 可选的初始状态
#[derive(Debug, Clone)]
pub struct Scene {
    pub topology: Topology,
    pub initial: Option<InitialSpec>,
}

impl Scene {
    /// 生成场景描述的仿真
    ///
    /// 没有给出初始角速度时取零。
    pub fn into_simulation(self) -> Simulation {
        let simulation = Simulation::new(self.topology);
        match self.initial {
            Some(InitialSpec { q, u }) => {
                let u = u.unwrap_or_else(|| vec![0.0; q.len()]);
                simulation.with_initial_state(q, u)
            }
            None => simulation,
        }
    }
}

impl SceneSpec {
    /// 把下标解析成标识并构建拓扑
    pub fn into_scene(self) -> Result<Scene> {
        let mut builder = TopologyBuilder::new();
        builder.settings(self.settings);

        let bodies: Vec<BodyId> = self
            .bodies
            .iter()
            .map(|body| {
                builder.add_body(
                    DVec2::from(body.point1),
                    DVec2::from(body.point2),
                    body.mass,
                    body.inertia,
                )
            })
            .collect();

        let body = |index: usize| {
            bodies.get(index).copied().ok_or_else(|| {
                SceneError::InvalidReference(format!(
                    "body index {index} out of range ({} bodies)",
                    bodies.len()
                ))
            })
        };

        let mut joints: Vec<JointId> = Vec::with_capacity(self.joints.len());
        for spec in &self.joints {
            let parent = spec.parent.map(body).transpose()?;
            let child = body(spec.child)?;
            let id = builder.add_joint(parent, child, spec.position.map(DVec2::from), spec.kind);
            builder.set_joint_torque(id, spec.torque);
            builder.set_joint_damping(id, spec.damping);
            joints.push(id);
        }

        for load in &self.loads {
            let joint = joints.get(load.joint).copied().ok_or_else(|| {
                SceneError::InvalidReference(format!(
                    "load references joint index {} ({} joints)",
                    load.joint,
                    joints.len()
                ))
            })?;
            builder.add_load(joint, load.torque);
        }

        Ok(Scene {
            topology: builder.build()?,
            initial: self.initial,
        })
    }
}

/// 从 JSON 字符串解析场景
pub fn from_json(json: &str) -> Result<Scene> {
    let spec: SceneSpec = serde_json::from_str(json)?;
    spec.into_scene()
}

/// 读取场景文件
pub fn load(path: impl AsRef<Path>) -> Result<Scene> {
    let json = std::fs::read_to_string(path)?;
    from_json(&json)
}
