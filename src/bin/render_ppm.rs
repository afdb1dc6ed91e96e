//! Headless snapshot of the sample room chain as a binary PPM.
//!
//! ```bash
//! cargo run --bin render_ppm -- --x 64 --y 128 --angle 0 -o frame.ppm
//! ```

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use log::info;

use yadoom_sw::{
    config::RenderConfig,
    math::{Angle, Fixed, Tables},
    renderer::{RendererExt, ViewParams, software::Software},
    world::{Palette, demo},
};

const EYE_HEIGHT: i32 = 41;

#[derive(Parser, Debug)]
#[command(about = "Render one frame of the sample rooms to a PPM file")]
struct Args {
    /// TOML render configuration; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    width: Option<usize>,
    #[arg(long)]
    height: Option<usize>,
    /// Horizontal field of view in degrees.
    #[arg(long)]
    fov: Option<f32>,
    #[arg(long, default_value_t = 6)]
    rooms: usize,
    /// Viewer position in map units.
    #[arg(long, default_value_t = 64.0)]
    x: f32,
    #[arg(long, default_value_t = 128.0)]
    y: f32,
    /// Heading in degrees, counter-clockwise from east.
    #[arg(long, default_value_t = 0.0)]
    angle: f32,
    /// Animation tick for the spinning sprites.
    #[arg(long, default_value_t = 0)]
    tick: u32,
    /// Blend translucent sprites instead of fuzzing them.
    #[arg(long)]
    tranmap: bool,
    #[arg(short, long, default_value = "frame.ppm")]
    out: PathBuf,
}

fn write_ppm(path: &PathBuf, w: usize, h: usize, rgb: &[u32]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{w} {h}\n255\n")?;
    for &px in rgb {
        out.write_all(&[(px >> 16) as u8, (px >> 8) as u8, px as u8])?;
    }
    out.flush()
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
    let palette: Palette = demo::demo_palette();
    bank.set_palette(palette);
    if args.tranmap {
        bank.build_tranmap();
    }
    config.apply_sky(&mut bank)?;
    let level = demo::room_chain(&bank, &tables, args.rooms)?;
    let sprites = demo::chain_sprites(&bank, &level, args.rooms, args.tick);

    let (x, y) = (Fixed::from_f32(args.x), Fixed::from_f32(args.y));
    let view = ViewParams {
        x,
        y,
        z: level.floor_height_at(x, y) + Fixed::from_int(EYE_HEIGHT),
        angle: Angle::from_degrees(args.angle),
        fov: Angle::from_degrees(config.fov_degrees),
        fixed_colormap: None,
    };

    let (w, h) = (config.width, config.height);
    let mut renderer = Software::new(&config, tables);
    let mut rgb = vec![0u32; w * h];
    renderer.render_frame(&view, &level, &bank, &sprites, |fb| {
        fb.to_rgb(bank.palette(), &mut rgb);
    });
    info!("rendered {w}x{h}: {:?}", renderer.stats());

    write_ppm(&args.out, w, h, &rgb).with_context(|| format!("writing {}", args.out.display()))?;
    info!("wrote {}", args.out.display());
    Ok(())
}
