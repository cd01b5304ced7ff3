//! Drives a few frames of the draw core on a real adapter, offscreen.
//!
//! Usage: `sandbox [config.ron]`. Set `RUST_LOG=debug` for per-frame detail.

mod demo;

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tessera_core::math::{Mat4, Vec3};
use tessera_core::renderer::{Color, Extent2D, TextureFormat};
use tessera_core::scene::CameraUniformData;
use tessera_core::DrawCoreConfig;
use tessera_infra::{OffscreenPresenter, WgpuDevice, WgpuGraphicsContext};
use tessera_lanes::pass_lane::{AttachmentDescriptor, PassDescriptor, SubpassDescriptor};
use tessera_lanes::DrawSubmitter;

use demo::{DemoBinder, DemoMeshes, DemoScene};

const FRAMES: u32 = 6;

fn camera(extent: Extent2D, frame: u32) -> Result<CameraUniformData> {
    let eye = Vec3::new(2.0 * (frame as f32 * 0.3).sin(), 0.0, 18.0);
    let view = Mat4::look_at_rh(eye, Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0))
        .context("degenerate camera basis")?;
    let aspect = extent.width as f32 / extent.height.max(1) as f32;
    let projection = Mat4::perspective_rh_zo(std::f32::consts::FRAC_PI_4, aspect, 0.1, 100.0);
    Ok(CameraUniformData::new(view, projection))
}

fn main() -> Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => DrawCoreConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => DrawCoreConfig::default(),
    };
    log::info!("Sandbox configuration: {config:?}");

    let context = WgpuGraphicsContext::new_headless()?;
    let device = WgpuDevice::new(Arc::new(Mutex::new(context)));

    let mut extent = Extent2D::new(640, 360);
    let mut presenter = OffscreenPresenter::new(&device, extent, TextureFormat::Bgra8UnormSrgb)?;
    let mut submitter = DrawSubmitter::new(&device, config, extent)?;
    submitter.set_attachments(
        &device,
        vec![
            AttachmentDescriptor::swapchain(
                0,
                "backbuffer",
                TextureFormat::Bgra8UnormSrgb,
                Color {
                    r: 0.01,
                    g: 0.02,
                    b: 0.03,
                    a: 1.0,
                },
            ),
            AttachmentDescriptor::depth(1, "depth", TextureFormat::Depth32Float, 1.0),
        ],
    )?;
    submitter.set_structure(
        &device,
        vec![PassDescriptor::new(0, vec![SubpassDescriptor::writing(0, &[0, 1])])],
    )?;

    let meshes = DemoMeshes::upload(&device)?;
    let binder = DemoBinder::new(&device, &meshes, submitter.camera_layout())?;
    let scene = DemoScene::grid(&meshes, 12, 4);

    for frame in 0..FRAMES {
        if frame == FRAMES / 2 {
            extent = Extent2D::new(800, 450);
            presenter.resize(&device, extent)?;
            submitter.resize(&device, extent)?;
        }
        let report = submitter.render_frame_with(
            &device,
            &mut presenter,
            &scene,
            &camera(extent, frame)?,
            &binder,
        )?;
        log::info!(
            "frame {} (slot {}): {} objects in {} batches, {} draw calls",
            report.frame_index,
            report.frame_slot,
            report.objects,
            report.batches,
            report.stats.draw_calls
        );
    }

    submitter.destroy(&device);
    binder.destroy();
    meshes.destroy(&device);
    presenter.destroy(&device);
    log::info!(
        "Sandbox done: {} frames presented, {} bytes still allocated",
        presenter.presented_frames(),
        device.vram_allocated_bytes()
    );
    Ok(())
}
