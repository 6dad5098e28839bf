//! # Subtree COM计算模块
//!
//! 计算每节连杆及其所有下游连杆的总质量和总质心

use bevy::math::DVec2;

use super::kinematics::{ChainKinematics, ChainModel};

/// 子树（连杆 k 到链末端）的总质量和质心
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Subtree {
    pub mass: f64,
    pub com: DVec2,
}

/// 计算子树质心
///
/// ## 算法
///
/// 1. 初始化: weighted[k] = mass[k] * com[k]
/// 2. 后向累积(从叶到根): weighted[k] += weighted[k+1]
/// 3. 归一化: com[k] = weighted[k] / mass_sum[k]
///
/// 重力在关节 r 上的广义力只依赖于子树 r 的质量和质心：
/// ```text
/// Q_r = (C_r − p_r) × (M_r g)
/// ```
pub fn compute_subtree_com(chain: &ChainModel, kin: &ChainKinematics) -> Vec<Subtree> {
    let n = chain.len();
    let mut subtree = vec![Subtree::default(); n];

    let mut weighted = DVec2::ZERO;
    let mut mass = 0.0;
    for k in (0..n).rev() {
        let link_mass = chain.links[k].mass;
        weighted += link_mass * kin.bodies[k].com;
        mass += link_mass;

        subtree[k] = Subtree {
            mass,
            com: if mass > 1e-12 {
                weighted / mass
            } else {
                kin.bodies[k].com
            },
        };
    }

    subtree
}
