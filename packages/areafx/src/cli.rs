use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::camera::Viewport;
use crate::compositor::{FrameReport, RecordingBackend};
use crate::gpu::post_processor::PostProcessor;
use crate::session::{Session, SessionConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the pass plan of each frame as JSON
    Plan {
        /// Session JSON file (window demo when omitted)
        #[arg(long)]
        session: Option<PathBuf>,

        /// Number of frames to plan
        #[arg(long, default_value_t = 1)]
        frames: u32,

        /// Frames per second used to advance animation
        #[arg(long, default_value_t = 60.0)]
        fps: f32,
    },
    /// Run the chain over a scene image and write frames to disk
    Render {
        /// Rendered scene image (PNG or any format the image crate reads)
        #[arg(long)]
        scene: PathBuf,

        /// Session JSON file (window demo when omitted)
        #[arg(long)]
        session: Option<PathBuf>,

        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Number of frames to render
        #[arg(long, default_value_t = 1)]
        frames: u32,

        /// Frames per second used to advance animation
        #[arg(long, default_value_t = 60.0)]
        fps: f32,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan { session, frames, fps } => {
            let mut session = load_session(session.as_deref())?;
            let reports = plan(&mut session, frames, fps);
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Commands::Render { scene, session, out, frames, fps } => {
            let mut session = load_session(session.as_deref())?;
            pollster::block_on(render_offline(&mut session, &scene, &out, frames, fps))?;
        }
    }
    Ok(())
}

fn load_session(path: Option<&Path>) -> Result<Session> {
    let session = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read session file {:?}", path))?;
            let config = SessionConfig::from_json(&text)?;
            Session::from_config(&config)?
        }
        None => Session::window_demo(Viewport::default())?,
    };
    Ok(session)
}

/// Advance and plan `frames` frames without touching the GPU.
pub fn plan(session: &mut Session, frames: u32, fps: f32) -> Vec<FrameReport> {
    let dt = 1.0 / fps.max(1.0);
    (0..frames)
        .map(|_| {
            session.advance(dt);
            let mut backend = RecordingBackend::new();
            session.render(&mut backend)
        })
        .collect()
}

async fn render_offline(session: &mut Session, scene_path: &Path, out_dir: &Path, frames: u32, fps: f32) -> Result<()> {
    let Viewport { width, height } = session.viewport;
    let scene = image::open(scene_path)
        .with_context(|| format!("Failed to open scene image {:?}", scene_path))?
        .to_rgba8();
    let scene = if scene.dimensions() == (width, height) {
        scene
    } else {
        log::info!("Resizing scene {:?} to {}x{}", scene.dimensions(), width, height);
        image::imageops::resize(&scene, width, height, image::imageops::FilterType::Triangle)
    };

    std::fs::create_dir_all(out_dir)?;

    // WGPU Init
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| anyhow::anyhow!("No adapter found"))?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await?;

    let processor = PostProcessor::new(&device, &queue, width, height);

    // Buffer for reading back data
    let unpadded_bytes_per_row = 4 * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Output Buffer"),
        size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let dt = 1.0 / fps.max(1.0);
    println!("Rendering {} frames to {:?}...", frames, out_dir);

    for i in 0..frames {
        session.advance(dt);
        processor.upload_scene(&queue, scene.as_raw());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Post-Process Encoder"),
        });
        let report = {
            let mut frame = processor.frame(&device, &mut encoder);
            session.render(&mut frame)
        };
        log::debug!("Frame {}: {} passes, presented {:?}", i, report.passes.len(), report.presented);

        encoder.copy_texture_to_buffer(
            processor.present_texture().as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        // Map buffer and save
        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .context("Readback channel closed")?
            .context("Failed to map output buffer")?;

        let data = buffer_slice.get_mapped_range();
        let mut unpadded_data = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + unpadded_bytes_per_row as usize;
            unpadded_data.extend_from_slice(&data[start..end]);
        }
        drop(data);
        output_buffer.unmap();

        let frame_path = out_dir.join(format!("frame_{:05}.png", i));
        image::save_buffer(&frame_path, &unpadded_data, width, height, image::ColorType::Rgba8)?;
    }
    println!("Done.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::BufferId;

    #[test]
    fn test_demo_plan_runs_every_window() {
        let mut session = Session::window_demo(Viewport::default()).unwrap();
        let reports = plan(&mut session, 2, 60.0);
        assert_eq!(reports.len(), 2);
        let drawn = reports[0].passes.len() + reports[0].skipped.len();
        assert_eq!(drawn, 6);
    }

    #[test]
    fn test_plan_serialises() {
        let mut session = Session::new(Viewport::new(64, 64));
        let reports = plan(&mut session, 1, 30.0);
        assert_eq!(reports[0].presented, BufferId::A);
        let json = serde_json::to_string(&reports).unwrap();
        assert!(json.contains("\"presented\":\"A\""));
    }
}
