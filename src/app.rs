use glam::{Affine2, Vec2};
use image::{Rgba, RgbaImage};
use log::{error, info, warn};
use spritegl::config::Config;
use spritegl::core::gfx::backends::opengl::{self, GlWindow, GlowDriver};
use spritegl::core::gfx::sprite::{ImageTexture, SpriteDraw, SpriteRenderer, Target, new_image_texture};
use spritegl::core::gfx::{CompositeMode, Context, Error as GfxError, QuadRequest, VertexSlab};
use spritegl::core::input::{Touch, TouchState};
use std::{error::Error, sync::Arc, time::Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

const SCREENSHOT_PATH: &str = "screenshot.png";
const SPRITE_SIZE: u32 = 96;

/// Premultiplied checkerboard with a soft alpha edge.
fn sprite_image() -> RgbaImage {
    RgbaImage::from_fn(SPRITE_SIZE, SPRITE_SIZE, |x, y| {
        let light = (x / 12 + y / 12) % 2 == 0;
        let edge = x.min(y).min(SPRITE_SIZE - 1 - x).min(SPRITE_SIZE - 1 - y);
        let a = (edge * 32).min(255) as u8;
        let c = if light { a } else { a / 3 };
        Rgba([c, c / 2, a, a])
    })
}

fn backdrop_image() -> RgbaImage {
    RgbaImage::from_pixel(1, 1, Rgba([16, 20, 28, 255]))
}

/// GPU resources owned by the window. Rebuilt wholesale after context loss.
struct Scene {
    sprites: SpriteRenderer<GlowDriver>,
    sprite: ImageTexture<glow::Texture>,
    backdrop: ImageTexture<glow::Texture>,
}

impl Scene {
    fn new(ctx: &mut Context<GlowDriver>) -> Result<Self, GfxError> {
        Ok(Self {
            sprites: SpriteRenderer::new(ctx)?,
            sprite: new_image_texture(ctx, &sprite_image())?,
            backdrop: new_image_texture(ctx, &backdrop_image())?,
        })
    }

    fn delete(self, ctx: &mut Context<GlowDriver>) {
        ctx.delete_texture(self.sprite.texture);
        ctx.delete_texture(self.backdrop.texture);
        self.sprites.delete(ctx);
    }
}

struct Renderer {
    surface: GlWindow,
    ctx: Context<GlowDriver>,
    scene: Scene,
    slab: VertexSlab,
    size: (u32, u32),
}

impl Renderer {
    fn restore(&mut self) -> Result<(), GfxError> {
        warn!("Rebuilding GPU resources after context loss.");
        self.ctx.restore_context();
        self.ctx.reset();
        self.scene = Scene::new(&mut self.ctx)?;
        Ok(())
    }

    fn draw(&mut self, elapsed: f32, pointers: &[(f32, f32)], mode: CompositeMode) -> Result<(), GfxError> {
        let (w, h) = self.size;
        let target = Target::screen(self.ctx.screen_framebuffer(), w, h);
        let (sprite, backdrop) = (&self.scene.sprite, &self.scene.backdrop);
        let sprites = &mut self.scene.sprites;

        let fill = Affine2::from_scale(Vec2::new(w as f32, h as f32));
        sprites.draw(
            &mut self.ctx,
            &mut self.slab,
            &target,
            &SpriteDraw {
                image: backdrop,
                request: backdrop.full_request(),
                geom: &fill,
                composite: CompositeMode::Copy,
                color_scale: [1.0; 4],
            },
        )?;

        let half = SPRITE_SIZE as f32 / 2.0;
        let request = sprite.full_request();
        for (i, &(x, y)) in pointers.iter().enumerate() {
            let angle = elapsed + i as f32 * 0.7;
            let geom = Affine2::from_translation(Vec2::new(x, y))
                * Affine2::from_angle(angle)
                * Affine2::from_translation(Vec2::splat(-half));
            sprites.draw(
                &mut self.ctx,
                &mut self.slab,
                &target,
                &SpriteDraw {
                    image: sprite,
                    request,
                    geom: &geom,
                    composite: mode,
                    color_scale: [1.0; 4],
                },
            )?;
        }

        // A quarter of the sprite, pinned to the top-left corner.
        let corner = QuadRequest::new(sprite.width, sprite.height, 0, 0, sprite.width / 2, sprite.height / 2);
        sprites.draw(
            &mut self.ctx,
            &mut self.slab,
            &target,
            &SpriteDraw {
                image: sprite,
                request: corner,
                geom: &Affine2::from_translation(Vec2::splat(8.0)),
                composite: mode,
                color_scale: [0.5; 4],
            },
        )?;
        Ok(())
    }

    fn screenshot(&mut self) -> Result<(), Box<dyn Error>> {
        let (w, h) = self.size;
        let fb = self.ctx.screen_framebuffer();
        // Rows come back bottom-up.
        let image = image::imageops::flip_vertical(&self.ctx.framebuffer_image(fb, w, h)?);
        image.save(SCREENSHOT_PATH)?;
        info!("Saved {w}x{h} screenshot to '{SCREENSHOT_PATH}'.");
        Ok(())
    }
}

pub struct App {
    config: Config,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    touches: Arc<TouchState>,
    start_time: Instant,
    frame_count: u32,
    last_title_update: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        let now = Instant::now();
        Self {
            config,
            window: None,
            renderer: None,
            touches: Arc::new(TouchState::new()),
            start_time: now,
            frame_count: 0,
            last_title_update: now,
        }
    }

    fn init_graphics(&mut self, event_loop: &ActiveEventLoop) -> Result<(), Box<dyn Error>> {
        let window_attributes = Window::default_attributes()
            .with_title("spritegl")
            .with_resizable(true)
            .with_inner_size(PhysicalSize::new(
                self.config.display_width,
                self.config.display_height,
            ));
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();

        let (surface, mut ctx) =
            opengl::init(window.clone(), self.config.vsync, self.config.gfx_debug)?;
        let scene = Scene::new(&mut ctx)?;

        self.renderer = Some(Renderer {
            surface,
            ctx,
            scene,
            slab: VertexSlab::new(),
            size: (size.width, size.height),
        });
        self.window = Some(window);
        info!("Starting event loop...");
        Ok(())
    }

    fn update_fps_title(&mut self, window: &Window, now: Instant) {
        self.frame_count += 1;
        let elapsed = now.duration_since(self.last_title_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;
            window.set_title(&format!("spritegl | {} | {fps:.2} FPS", self.config.composite_mode));
            self.frame_count = 0;
            self.last_title_update = now;
        }
    }

    fn pointers(&self) -> Vec<(f32, f32)> {
        let touches = self.touches.touches();
        if touches.is_empty() {
            vec![self.touches.cursor()]
        } else {
            touches.iter().map(|t| (t.x, t.y)).collect()
        }
    }

    fn cycle_composite_mode(&mut self) {
        let all = CompositeMode::ALL;
        let i = all
            .iter()
            .position(|&m| m == self.config.composite_mode)
            .unwrap_or(0);
        self.config.composite_mode = all[(i + 1) % all.len()];
        info!("Composite mode: {}", self.config.composite_mode);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop, window: &Window) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.start_time).as_secs_f32();
        let pointers = self.pointers();
        let mode = self.config.composite_mode;
        self.update_fps_title(window, now);

        let Some(renderer) = &mut self.renderer else {
            return;
        };
        if renderer.ctx.is_context_lost()
            && let Err(e) = renderer.restore()
        {
            error!("Failed to restore graphics: {e}");
            event_loop.exit();
            return;
        }
        let frame = renderer
            .draw(elapsed, &pointers, mode)
            .and_then(|()| renderer.surface.swap_buffers());
        if let Err(e) = frame {
            error!("Failed to draw frame: {e}");
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none()
            && let Err(e) = self.init_graphics(event_loop)
        {
            error!("Failed to initialize graphics: {e}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_ref().cloned() else {
            return;
        };
        if window_id != window.id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested. Shutting down.");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if new_size.width > 0
                    && new_size.height > 0
                    && let Some(renderer) = &mut self.renderer
                {
                    renderer.surface.resize(new_size.width, new_size.height);
                    renderer.size = (new_size.width, new_size.height);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.touches.set_cursor(position.x as f32, position.y as f32);
            }
            WindowEvent::Touch(touch) => {
                let t = Touch {
                    id: touch.id,
                    x: touch.location.x as f32,
                    y: touch.location.y as f32,
                };
                match touch.phase {
                    TouchPhase::Started | TouchPhase::Moved => self.touches.upsert_touch(t),
                    TouchPhase::Ended | TouchPhase::Cancelled => self.touches.remove_touch(t.id),
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                    PhysicalKey::Code(KeyCode::KeyB) => self.cycle_composite_mode(),
                    PhysicalKey::Code(KeyCode::KeyS) => {
                        if let Some(renderer) = &mut self.renderer
                            && let Err(e) = renderer.screenshot()
                        {
                            warn!("Screenshot failed: {e}");
                        }
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop, &window),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(Renderer { mut ctx, scene, .. }) = self.renderer.take() {
            info!("Cleaning up OpenGL resources...");
            scene.delete(&mut ctx);
            ctx.flush();
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(spritegl::config::get());
    event_loop.run_app(&mut app)?;
    Ok(())
}
