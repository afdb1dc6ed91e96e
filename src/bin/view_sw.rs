//! Interactive viewer for the sample room chain.
//!
//! ```bash
//! cargo run --release --bin view_sw -- --rooms 8 --scale 3
//! ```
//!
//! Arrows / WASD move and turn, Alt + arrows strafe, `[` / `]` narrow and
//! widen the field of view, `C` crouches, `F` toggles the inverted
//! colormap, Esc quits.

use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use glam::Vec3;
use log::info;
use minifb::{Key, KeyRepeat, Scale, Window, WindowOptions};

use yadoom_sw::{
    config::RenderConfig,
    math::Tables,
    renderer::{RendererExt, software::Software},
    world::{Camera, INVERSE_COLORMAP, demo},
};

const EYE_HEIGHT: f32 = 41.0;
const CROUCH_HEIGHT: f32 = 20.0;
const FOV_STEP: f32 = 5.0;
const WALK_SPEED: f32 = 4.0;
const TURN_SPEED: f32 = 0.05;

#[derive(Parser, Debug)]
#[command(about = "Walk through the sample rooms with the software renderer")]
struct Args {
    /// TOML render configuration; flags below override it.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
    #[arg(long)]
    width: Option<usize>,
    #[arg(long)]
    height: Option<usize>,
    /// Horizontal field of view in degrees.
    #[arg(long)]
    fov: Option<f32>,
    /// Number of rooms in the chain.
    #[arg(long, default_value_t = 6)]
    rooms: usize,
    /// Window pixels per frame pixel (1, 2 or 4).
    #[arg(long, default_value_t = 2)]
    scale: u8,
    /// Blend translucent sprites instead of fuzzing them.
    #[arg(long)]
    tranmap: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RenderConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => RenderConfig::default(),
    };
    config.width = args.width.unwrap_or(config.width);
    config.height = args.height.unwrap_or(config.height);
    config.fov_degrees = args.fov.unwrap_or(config.fov_degrees);
    config.validate()?;

    let tables = Tables::new();
    let mut bank = demo::demo_bank(config.resource_mode)?;
    bank.set_palette(demo::demo_palette());
    if args.tranmap {
        bank.build_tranmap();
    }
    config.apply_sky(&mut bank)?;
    let level = demo::room_chain(&bank, &tables, args.rooms)?;

    let mut camera = Camera::new(
        Vec3::new(64.0, 128.0, EYE_HEIGHT),
        0.0,
        config.fov_degrees.to_radians(),
    );
    let mut renderer = Software::new(&config, tables);

    let (w, h) = (config.width, config.height);
    let scale = match args.scale {
        1 => Scale::X1,
        4 => Scale::X4,
        _ => Scale::X2,
    };
    let mut win = Window::new(
        "yadoom_sw",
        w,
        h,
        WindowOptions {
            scale,
            ..WindowOptions::default()
        },
    )?;
    win.set_target_fps(35);

    let mut rgb = vec![0u32; w * h];
    let mut inverse = false;
    let mut crouched = false;
    let mut tick = 0u32;

    // ────────────────── benchmarking state ──────────────────────────────
    let mut acc_time = Duration::ZERO;
    let mut acc_frames = 0usize;
    let mut last_print = Instant::now();

    while win.is_open() && !win.is_key_down(Key::Escape) {
        /* movement --------------------------------------------------------- */
        let mut forward = 0.0;
        let mut side = 0.0;
        if win.is_key_down(Key::Up) || win.is_key_down(Key::W) {
            forward += WALK_SPEED;
        }
        if win.is_key_down(Key::Down) || win.is_key_down(Key::S) {
            forward -= WALK_SPEED;
        }
        let alt = win.is_key_down(Key::LeftAlt) || win.is_key_down(Key::RightAlt);
        if alt {
            if win.is_key_down(Key::Left) {
                side -= WALK_SPEED;
            }
            if win.is_key_down(Key::Right) {
                side += WALK_SPEED;
            }
        } else {
            if win.is_key_down(Key::Left) {
                camera.turn(TURN_SPEED);
            }
            if win.is_key_down(Key::Right) {
                camera.turn(-TURN_SPEED);
            }
        }
        if win.is_key_down(Key::A) {
            side -= WALK_SPEED;
        }
        if win.is_key_down(Key::D) {
            side += WALK_SPEED;
        }
        camera.step(forward, side);
        if win.is_key_pressed(Key::F, KeyRepeat::No) {
            inverse = !inverse;
        }
        if win.is_key_pressed(Key::C, KeyRepeat::No) {
            crouched = !crouched;
            camera.set_eye_height(if crouched { CROUCH_HEIGHT } else { EYE_HEIGHT });
        }
        let zoom = match (
            win.is_key_pressed(Key::LeftBracket, KeyRepeat::Yes),
            win.is_key_pressed(Key::RightBracket, KeyRepeat::Yes),
        ) {
            (true, false) => -FOV_STEP,
            (false, true) => FOV_STEP,
            _ => 0.0,
        };
        if zoom != 0.0 {
            let fov = (camera.fov().to_degrees() + zoom).clamp(30.0, 120.0);
            camera.set_fov(fov.to_radians());
            info!("fov {fov:.0}°");
        }

        /* draw */
        let t0 = Instant::now();
        let pos = camera.pos();
        let floor = level.floor_height_at(
            yadoom_sw::math::Fixed::from_f32(pos.x),
            yadoom_sw::math::Fixed::from_f32(pos.y),
        );
        let mut view = camera.view_params(floor);
        view.fixed_colormap = inverse.then_some(INVERSE_COLORMAP as u8);
        let sprites = demo::chain_sprites(&bank, &level, args.rooms, tick);

        renderer.render_frame(&view, &level, &bank, &sprites, |fb| {
            fb.to_rgb(bank.palette(), &mut rgb);
        });
        acc_time += t0.elapsed();
        acc_frames += 1;
        win.update_with_buffer(&rgb, w, h)?;
        tick = tick.wrapping_add(1);

        if last_print.elapsed() >= Duration::from_secs(3) {
            let avg_ms = acc_time.as_secs_f64() * 1000.0 / acc_frames as f64;
            info!(
                "avg render: {:.2} ms ({:.1} FPS), last frame {:?}",
                avg_ms,
                1000.0 / avg_ms,
                renderer.stats()
            );
            acc_time = Duration::ZERO;
            acc_frames = 0;
            last_print = Instant::now();
        }
    }
    Ok(())
}
