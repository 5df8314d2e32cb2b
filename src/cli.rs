use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use serde::Serialize;
use std::path::PathBuf;

use crate::assets::FsAssetLoader;
use crate::config::PresentationConfig;
use crate::environment::EnvironmentTag;
use crate::galaxy::{GalaxyParameters, ParticleField};
use crate::gpu_data::{galaxy_vertices, trail_vertices, vertex_layouts, warp_vertices, VertexLayoutInfo};
use crate::presentation::{FrameReport, Presentation, SceneEvent, SHOOTING_STAR};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scene headlessly and write a JSON report
    Simulate {
        /// JSON config file (missing fields use defaults)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory the asset paths are resolved against
        #[arg(long, default_value = ".")]
        assets: PathBuf,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Duration in seconds
        #[arg(long, default_value_t = 10.0)]
        duration: f32,

        /// Travel to an environment at a time, e.g. `water@2.0` (repeatable)
        #[arg(long, value_parser = parse_travel)]
        travel: Vec<(EnvironmentTag, f32)>,

        /// Call the UFO at these times (seconds)
        #[arg(long)]
        alien: Vec<f32>,

        /// Toggle shooting stars at these times (seconds)
        #[arg(long)]
        stars: Vec<f32>,

        /// Toggle the soundtrack at these times (seconds)
        #[arg(long)]
        audio: Vec<f32>,

        /// RNG seed (overrides the config)
        #[arg(long)]
        seed: Option<u64>,

        /// Write the report here instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Generate a galaxy field and dump it
    Galaxy {
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Override the particle count
        #[arg(long)]
        count: Option<usize>,

        /// Output JSON file
        #[arg(long)]
        out: PathBuf,

        /// Also write the raw vertex buffer here
        #[arg(long)]
        raw: Option<PathBuf>,
    },
}

fn parse_travel(s: &str) -> std::result::Result<(EnvironmentTag, f32), String> {
    let (tag, at) = s
        .split_once('@')
        .ok_or_else(|| format!("expected <environment>@<seconds>, got '{}'", s))?;
    let tag = tag.parse::<EnvironmentTag>().map_err(|e| e.to_string())?;
    let at = at
        .parse::<f32>()
        .map_err(|e| format!("bad time '{}': {}", at, e))?;
    Ok((tag, at))
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            assets,
            fps,
            duration,
            travel,
            alien,
            stars,
            audio,
            seed,
            report,
        } => {
            let mut config = match config {
                Some(path) => {
                    let json = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    PresentationConfig::from_json(&json)?
                }
                None => PresentationConfig::default(),
            };
            if seed.is_some() {
                config.seed = seed;
            }
            let mut actions: Vec<(f32, Action)> = Vec::new();
            actions.extend(travel.into_iter().map(|(tag, at)| (at, Action::Travel(tag))));
            actions.extend(alien.into_iter().map(|at| (at, Action::Alien)));
            actions.extend(stars.into_iter().map(|at| (at, Action::Stars)));
            actions.extend(audio.into_iter().map(|at| (at, Action::Audio)));
            actions.sort_by(|a, b| a.0.total_cmp(&b.0));

            let result = simulate(config, assets, fps, duration, actions)?;
            let json = serde_json::to_string_pretty(&result)?;
            match report {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Wrote report for {} frames to {:?}", result.frames, path);
                }
                None => println!("{}", json),
            }
        }
        Commands::Galaxy {
            seed,
            count,
            out,
            raw,
        } => dump_galaxy(seed, count, out, raw)?,
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
enum Action {
    Travel(EnvironmentTag),
    Alien,
    Stars,
    Audio,
}

#[derive(Serialize)]
struct ActionLog {
    at: f32,
    action: Action,
    outcome: String,
}

#[derive(Serialize)]
struct SimulationReport {
    frames: usize,
    actions: Vec<ActionLog>,
    events: Vec<(f32, SceneEvent)>,
    final_frame: Option<FrameReport>,
    scene_entities: usize,
    live_resources: usize,
    peak_line_vertices: usize,
}

fn simulate(
    config: PresentationConfig,
    assets: PathBuf,
    fps: f32,
    duration: f32,
    mut actions: Vec<(f32, Action)>,
) -> Result<SimulationReport> {
    anyhow::ensure!(fps > 0.0, "fps must be positive");
    let total_frames = (duration.max(0.0) * fps).ceil() as usize;
    let dt = 1.0 / fps;

    let mut presentation = Presentation::new(config, FsAssetLoader::new(assets))?;
    let mut action_log = Vec::new();
    let mut now = 0.0;
    let mut events = Vec::new();
    let mut final_frame = None;
    let mut peak_line_vertices = 0;
    actions.reverse();

    println!("Simulating {} frames at {} fps...", total_frames, fps);

    for _ in 0..total_frames {
        while actions.last().is_some_and(|(at, _)| *at <= now) {
            let Some((at, action)) = actions.pop() else {
                break;
            };
            let outcome = match action {
                Action::Travel(tag) => match presentation.request_transition(tag) {
                    Ok(()) => "accepted".to_string(),
                    Err(e) => e.to_string(),
                },
                Action::Alien => format!("{:?}", presentation.trigger_scripted_actor()),
                Action::Stars => match presentation.toggle_decorative_effect(SHOOTING_STAR) {
                    Ok(enabled) => format!("enabled={}", enabled),
                    Err(e) => e.to_string(),
                },
                Action::Audio => format!("playing={}", presentation.toggle_audio()),
            };
            log::info!("t={:.2}s {:?}: {}", at, action, outcome);
            action_log.push(ActionLog {
                at,
                action,
                outcome,
            });
        }

        let frame = presentation.on_frame(dt);
        let line_vertices = trail_vertices(&presentation.star().trail, frame.star_visibility).len()
            + presentation
                .transition()
                .warp()
                .map_or(0, |w| warp_vertices(w).len());
        peak_line_vertices = peak_line_vertices.max(line_vertices);
        events.extend(
            presentation
                .drain_events()
                .into_iter()
                .map(|e| (frame.time.elapsed, e)),
        );
        now = frame.time.elapsed;
        final_frame = Some(frame);
    }

    let scene = presentation.scene();
    Ok(SimulationReport {
        frames: total_frames,
        actions: action_log,
        events,
        final_frame,
        scene_entities: scene.scene_entities().count(),
        live_resources: scene.resource_count(),
        peak_line_vertices,
    })
}

#[derive(Serialize)]
struct GalaxyDump<'a> {
    parameters: &'a GalaxyParameters,
    positions: &'a [[f32; 3]],
    colors: &'a [[f32; 3]],
    /// Layout of the raw vertex buffer.
    vertex_layout: VertexLayoutInfo,
}

fn dump_galaxy(seed: u64, count: Option<usize>, out: PathBuf, raw: Option<PathBuf>) -> Result<()> {
    let mut params = GalaxyParameters::default();
    if let Some(count) = count {
        params.count = count;
    }
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let field = ParticleField::generate(&params, &mut rng)?;

    let dump = GalaxyDump {
        parameters: &params,
        positions: &field.positions,
        colors: &field.colors,
        vertex_layout: vertex_layouts().points,
    };
    std::fs::write(&out, serde_json::to_string(&dump)?)
        .with_context(|| format!("writing {}", out.display()))?;
    println!("Wrote {} stars to {:?}", field.len(), out);

    if let Some(raw) = raw {
        let vertices = galaxy_vertices(&field);
        std::fs::write(&raw, bytemuck::cast_slice::<_, u8>(&vertices))
            .with_context(|| format!("writing {}", raw.display()))?;
        println!("Wrote {} vertex bytes to {:?}", vertices.len() * 32, raw);
    }
    Ok(())
}
