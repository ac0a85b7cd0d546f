//! Lumen demo: a short scripted scene on either render driver.
//!
//! Usage: `lumen-demo [config.toml|config.json]`. Set `LUMEN_DRIVER` to
//! `direct` or `shared` to override the configured driver.

use anyhow::{Context, Result};
use lumen_core::{
    AnimatableProps, AnimationSettings, AnimationState, Easing, NodeEvent, Prop, ShaderProps,
    ShaderValue, TextureDesc, TextureKind, TextureOptions,
};
use lumen_driver::{Facing, FrameSequence, Node, NodeSettings, Renderer, RendererConfig};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const FRAME: Duration = Duration::from_millis(16);

fn load_config() -> Result<RendererConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => RendererConfig::load(Path::new(&path))
            .with_context(|| format!("loading renderer config {}", path))?,
        None => RendererConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

/// Filter for a configured level name, falling back to `info`.
fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn main() -> Result<()> {
    let config = load_config()?;

    // RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(&config.log_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Lumen demo starting...");
    info!("Using mimalloc allocator");

    let renderer = Renderer::new(config)?;
    let events: Rc<RefCell<Vec<String>>> = Rc::default();

    // Solid background
    let background = renderer.create_node(
        NodeSettings::new()
            .prop(Prop::Width, f64::from(renderer.config().width))
            .prop(Prop::Height, f64::from(renderer.config().height))
            .prop(Prop::Color, f64::from(0x1e1e2eff_u32))
            .parent(renderer.root()),
    )?;

    // Rounded card that slides in and fades
    let mut radius = ShaderProps::new();
    radius.insert("radius".to_string(), ShaderValue::Number(12.0));
    let card = renderer.create_node(
        NodeSettings::new()
            .prop(Prop::Width, 300.0)
            .prop(Prop::Height, 200.0)
            .prop(Prop::Color, f64::from(0xf5c2e7ff_u32))
            .parent(&background)
            .shader(renderer.make_shader("RoundedRectangle", radius))
            .texture(renderer.make_texture(
                TextureKind::Noise {
                    width: 300,
                    height: 200,
                },
                TextureOptions::default(),
            )),
    )?;
    watch(&card, "card", &events);

    // A missing image reports a failure instead of erroring the call
    let missing = renderer.create_node(
        NodeSettings::new()
            .parent(&background)
            .src("assets/does-not-exist.png"),
    )?;
    watch(&missing, "missing", &events);

    // Animated sprite cycling through a sheet
    let sheet = TextureDesc::image("assets/sprite-sheet.png");
    let frames = (0..8)
        .map(|i| TextureDesc::sub_texture(&sheet, i * 100, 0, 100, 150, TextureOptions::default()))
        .collect();
    let sprite_node = renderer.create_node(
        NodeSettings::new()
            .prop(Prop::Width, 100.0)
            .prop(Prop::Height, 150.0)
            .parent(&background),
    )?;
    let mut sprite = FrameSequence::new(sprite_node, frames);
    sprite.play(Facing::Left, 0, 7, Duration::from_millis(100))?;

    let slide = card.animate(
        AnimatableProps::new()
            .with(Prop::X, 400.0)
            .with(Prop::Alpha, 0.5),
        AnimationSettings {
            duration: 250.0,
            easing: Easing::EaseOut,
            ..AnimationSettings::default()
        },
    )?;
    slide.start()?;

    for _ in 0..30 {
        renderer.tick(FRAME)?;
        sprite.advance(FRAME)?;
        std::thread::sleep(FRAME);
    }

    if slide.state() != AnimationState::Finished {
        warn!("Slide animation still {:?} after the scripted run", slide.state());
    }
    slide.release();

    let summary = serde_json::json!({
        "driver": renderer.driver_kind().name(),
        "nodes": renderer.node_count(),
        "card": {
            "x": card.x(),
            "alpha": card.alpha(),
            "children_of_background": background.child_count(),
        },
        "sprite_frame": sprite.current_frame().map(|(_, i)| i),
        "events": events.borrow().clone(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    missing.destroy();
    info!("Lumen demo shutting down");
    Ok(())
}

fn watch(node: &Node, label: &'static str, log: &Rc<RefCell<Vec<String>>>) {
    let log = log.clone();
    node.on(move |event| {
        let line = match event {
            NodeEvent::Loaded(d) => format!("{} loaded {}", label, d),
            NodeEvent::Failed(e) => format!("{} failed: {}", label, e),
            other => format!("{} {}", label, other.name()),
        };
        info!("{}", line);
        log.borrow_mut().push(line);
    });
}
