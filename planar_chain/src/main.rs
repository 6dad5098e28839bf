//! # Hinge Chain Simulation
//!
//! 平面铰链链条仿真的命令行驱动
//!
//! ```text
//! planar_chain [scene.json] [--json]
//! ```
//!
//! - 不给场景文件时运行内置的铰链链条演示
//! - `--json` 把完整轨迹以 JSON 输出到 stdout，否则定期打印关节状态
//! - 日志级别由 `RUST_LOG` 控制，默认 info

use std::process::ExitCode;

use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use planar_chain::demos::hinge_chain::{create_hinge_chain, LINK_LENGTH, LINK_MASS, NUM_LINKS};
use planar_chain::multibody::{Simulation, Trajectory};
use planar_chain::scene;

// 每隔多少个采样点打印一次
const PRINT_EVERY: usize = 50;

fn main() -> ExitCode {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).env().init() {
        eprintln!("logger: {e}");
    }

    let mut scene_path = None;
    let mut json = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            _ => scene_path = Some(arg),
        }
    }

    let simulation = match load_simulation(scene_path.as_deref()) {
        Ok(simulation) => simulation,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match simulation.run() {
        Ok(trajectory) => report(&trajectory, json),
        Err(failure) => {
            error!("{failure}");
            if let Some(partial) = &failure.partial {
                info!("{} samples computed before the failure", partial.len());
                report(partial, json);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_simulation(path: Option<&str>) -> Result<Simulation, scene::SceneError> {
    match path {
        Some(path) => {
            info!("loading scene {path}");
            Ok(scene::load(path)?.into_simulation())
        }
        None => {
            info!("no scene given, running the {NUM_LINKS}-link hinge chain demo");
            let topology = create_hinge_chain(NUM_LINKS, LINK_LENGTH, LINK_MASS)?;
            let mut q0 = vec![0.0; NUM_LINKS];
            // 初始扰动，约 51.4°
            q0[0] = 0.9;
            Ok(Simulation::new(topology).with_initial_state(q0, vec![0.0; NUM_LINKS]))
        }
    }
}

fn report(trajectory: &Trajectory, json: bool) -> ExitCode {
    if json {
        return match serde_json::to_string_pretty(trajectory) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("serializing trajectory: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let Some(first) = trajectory.joint(0) else {
        return ExitCode::SUCCESS;
    };
    for (k, &(time, q)) in first.angles.iter().enumerate() {
        if k % PRINT_EVERY == 0 || k + 1 == first.angles.len() {
            let (_, u) = first.speeds[k];
            println!(
                "Time: {:.2}s | q[0]: {:.3} rad ({:.1}°) | qvel[0]: {:.3} rad/s",
                time,
                q,
                q.to_degrees(),
                u
            );
        }
    }
    ExitCode::SUCCESS
}
