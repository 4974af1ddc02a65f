use crate::core::gfx::{Context, Driver, Error};
use glow::{HasContext, PixelPackData, PixelUnpackData};
use glutin::{
    config::ConfigTemplateBuilder,
    context::{ContextAttributesBuilder, PossiblyCurrentContext},
    display::{Display, DisplayApiPreference},
    prelude::*,
    surface::{Surface, SurfaceAttributesBuilder, WindowSurface},
};
use log::{info, warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::{cell::Cell, ffi::CStr, num::NonZeroU32, sync::Arc};
use winit::window::Window;

/// [`Driver`] over a current `glow` context.
///
/// Every call is a single unsafe glow call on the thread that owns the
/// context. Context loss is latched from `glGetError`.
pub struct GlowDriver {
    gl: glow::Context,
    lost: Cell<bool>,
}

impl GlowDriver {
    pub fn new(gl: glow::Context) -> Self {
        Self {
            gl,
            lost: Cell::new(false),
        }
    }
}

impl Driver for GlowDriver {
    type Texture = glow::Texture;
    type Framebuffer = glow::Framebuffer;
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Buffer = glow::Buffer;
    type VertexArray = glow::VertexArray;
    type UniformLocation = glow::UniformLocation;

    fn create_texture(&self) -> Result<glow::Texture, String> {
        unsafe { self.gl.create_texture() }
    }
    fn is_texture(&self, texture: glow::Texture) -> bool {
        unsafe { self.gl.is_texture(texture) }
    }
    fn delete_texture(&self, texture: glow::Texture) {
        unsafe { self.gl.delete_texture(texture) }
    }
    fn bind_texture(&self, texture: Option<glow::Texture>) {
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, texture) }
    }
    fn pixel_store_i32(&self, parameter: u32, value: i32) {
        unsafe { self.gl.pixel_store_i32(parameter, value) }
    }
    fn tex_parameter_i32(&self, parameter: u32, value: i32) {
        unsafe { self.gl.tex_parameter_i32(glow::TEXTURE_2D, parameter, value) }
    }
    fn tex_image_2d(&self, width: i32, height: i32, pixels: Option<&[u8]>) {
        unsafe {
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(pixels),
            );
        }
    }
    fn tex_sub_image_2d(&self, x: i32, y: i32, width: i32, height: i32, pixels: &[u8]) {
        unsafe {
            self.gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                x,
                y,
                width,
                height,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(pixels)),
            );
        }
    }

    fn create_framebuffer(&self) -> Result<glow::Framebuffer, String> {
        unsafe { self.gl.create_framebuffer() }
    }
    fn is_framebuffer(&self, framebuffer: glow::Framebuffer) -> bool {
        unsafe { self.gl.is_framebuffer(framebuffer) }
    }
    fn delete_framebuffer(&self, framebuffer: glow::Framebuffer) {
        unsafe { self.gl.delete_framebuffer(framebuffer) }
    }
    fn bind_framebuffer(&self, framebuffer: Option<glow::Framebuffer>) {
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer) }
    }
    fn framebuffer_texture_2d(&self, texture: Option<glow::Texture>) {
        unsafe {
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                texture,
                0,
            );
        }
    }
    fn check_framebuffer_status(&self) -> u32 {
        unsafe { self.gl.check_framebuffer_status(glow::FRAMEBUFFER) }
    }
    fn current_framebuffer(&self) -> Option<glow::Framebuffer> {
        unsafe { self.gl.get_parameter_framebuffer(glow::FRAMEBUFFER_BINDING) }
    }
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }
    fn read_pixels(&self, x: i32, y: i32, width: i32, height: i32, pixels: &mut [u8]) {
        unsafe {
            self.gl.read_pixels(
                x,
                y,
                width,
                height,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelPackData::Slice(Some(pixels)),
            );
        }
    }

    fn enable(&self, capability: u32) {
        unsafe { self.gl.enable(capability) }
    }
    fn blend_func(&self, src: u32, dst: u32) {
        unsafe { self.gl.blend_func(src, dst) }
    }

    fn create_shader(&self, kind: u32) -> Result<glow::Shader, String> {
        unsafe { self.gl.create_shader(kind) }
    }
    fn shader_source(&self, shader: glow::Shader, source: &str) {
        unsafe { self.gl.shader_source(shader, source) }
    }
    fn compile_shader(&self, shader: glow::Shader) {
        unsafe { self.gl.compile_shader(shader) }
    }
    fn shader_compile_status(&self, shader: glow::Shader) -> bool {
        unsafe { self.gl.get_shader_compile_status(shader) }
    }
    fn shader_info_log(&self, shader: glow::Shader) -> String {
        unsafe { self.gl.get_shader_info_log(shader) }
    }
    fn is_shader(&self, shader: glow::Shader) -> bool {
        unsafe { self.gl.is_shader(shader) }
    }
    fn delete_shader(&self, shader: glow::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }
    fn create_program(&self) -> Result<glow::Program, String> {
        unsafe { self.gl.create_program() }
    }
    fn attach_shader(&self, program: glow::Program, shader: glow::Shader) {
        unsafe { self.gl.attach_shader(program, shader) }
    }
    fn link_program(&self, program: glow::Program) {
        unsafe { self.gl.link_program(program) }
    }
    fn program_link_status(&self, program: glow::Program) -> bool {
        unsafe { self.gl.get_program_link_status(program) }
    }
    fn program_info_log(&self, program: glow::Program) -> String {
        unsafe { self.gl.get_program_info_log(program) }
    }
    fn is_program(&self, program: glow::Program) -> bool {
        unsafe { self.gl.is_program(program) }
    }
    fn delete_program(&self, program: glow::Program) {
        unsafe { self.gl.delete_program(program) }
    }
    fn use_program(&self, program: Option<glow::Program>) {
        unsafe { self.gl.use_program(program) }
    }

    fn uniform_location(&self, program: glow::Program, name: &str) -> Option<glow::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }
    fn attrib_location(&self, program: glow::Program, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program, name) }
    }
    fn uniform_1_i32(&self, location: Option<&glow::UniformLocation>, v: i32) {
        unsafe { self.gl.uniform_1_i32(location, v) }
    }
    fn uniform_1_f32(&self, location: Option<&glow::UniformLocation>, v: f32) {
        unsafe { self.gl.uniform_1_f32(location, v) }
    }
    fn uniform_2_f32(&self, location: Option<&glow::UniformLocation>, x: f32, y: f32) {
        unsafe { self.gl.uniform_2_f32(location, x, y) }
    }
    fn uniform_4_f32(
        &self,
        location: Option<&glow::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) {
        unsafe { self.gl.uniform_4_f32(location, x, y, z, w) }
    }
    fn uniform_matrix_4_f32(&self, location: Option<&glow::UniformLocation>, v: &[f32]) {
        unsafe { self.gl.uniform_matrix_4_f32_slice(location, false, v) }
    }
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        stride: i32,
        offset: i32,
    ) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(index, size, data_type, false, stride, offset)
        }
    }
    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) }
    }
    fn disable_vertex_attrib_array(&self, index: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(index) }
    }

    fn create_buffer(&self) -> Result<glow::Buffer, String> {
        unsafe { self.gl.create_buffer() }
    }
    fn is_buffer(&self, buffer: glow::Buffer) -> bool {
        unsafe { self.gl.is_buffer(buffer) }
    }
    fn bind_buffer(&self, target: u32, buffer: Option<glow::Buffer>) {
        unsafe { self.gl.bind_buffer(target, buffer) }
    }
    fn buffer_data_size(&self, target: u32, size: i32, usage: u32) {
        unsafe { self.gl.buffer_data_size(target, size, usage) }
    }
    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]) {
        unsafe { self.gl.buffer_sub_data_u8_slice(target, offset, data) }
    }
    fn delete_buffer(&self, buffer: glow::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) }
    }
    fn create_vertex_array(&self) -> Result<glow::VertexArray, String> {
        unsafe { self.gl.create_vertex_array() }
    }
    fn bind_vertex_array(&self, vertex_array: Option<glow::VertexArray>) {
        unsafe { self.gl.bind_vertex_array(vertex_array) }
    }
    fn delete_vertex_array(&self, vertex_array: glow::VertexArray) {
        unsafe { self.gl.delete_vertex_array(vertex_array) }
    }

    fn draw_elements(&self, mode: u32, count: i32, element_type: u32, offset: i32) {
        unsafe { self.gl.draw_elements(mode, count, element_type, offset) }
    }
    fn get_error(&self) -> u32 {
        let code = unsafe { self.gl.get_error() };
        if code == glow::CONTEXT_LOST {
            warn!("OpenGL context lost.");
            self.lost.set(true);
        }
        code
    }
    fn get_parameter_i32(&self, parameter: u32) -> i32 {
        unsafe { self.gl.get_parameter_i32(parameter) }
    }
    fn flush(&self) {
        unsafe { self.gl.flush() }
    }
    fn is_context_lost(&self) -> bool {
        self.lost.get()
    }
    fn restore_context(&self) {
        // Native contexts come back with the surface; nothing to request.
        info!("Restoring OpenGL context.");
        self.lost.set(false);
    }
}

/// The window surface and the context current on it.
pub struct GlWindow {
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
}

impl GlWindow {
    pub fn swap_buffers(&self) -> Result<(), Error> {
        self.surface
            .swap_buffers(&self.context)
            .map_err(Error::unavailable)
    }

    pub fn resize(&self, width: u32, height: u32) {
        let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) else {
            warn!("Ignoring resize to zero dimensions.");
            return;
        };
        self.surface.resize(&self.context, w, h);
    }
}

/// Creates a GL context on `window` and a reset state cache over it.
pub fn init(
    window: Arc<Window>,
    vsync_enabled: bool,
    gfx_debug_enabled: bool,
) -> Result<(GlWindow, Context<GlowDriver>), Error> {
    info!("Initializing OpenGL backend...");
    if gfx_debug_enabled {
        info!("OpenGL debug context requested.");
    }

    let (surface, context, gl) = create_opengl_context(&window, vsync_enabled, gfx_debug_enabled)?;
    unsafe {
        info!("GL version: {}", gl.get_parameter_string(glow::VERSION));
        info!("GL renderer: {}", gl.get_parameter_string(glow::RENDERER));
    }

    let mut ctx = Context::new(GlowDriver::new(gl));
    ctx.reset();
    info!(
        "OpenGL backend initialized (max texture size {}).",
        ctx.max_texture_size()
    );
    Ok((GlWindow { surface, context }, ctx))
}

fn create_opengl_context(
    window: &Window,
    vsync_enabled: bool,
    gfx_debug_enabled: bool,
) -> Result<(Surface<WindowSurface>, PossiblyCurrentContext, glow::Context), Error> {
    let display_handle = window
        .display_handle()
        .map_err(Error::unavailable)?
        .as_raw();

    #[cfg(target_os = "windows")]
    let preference = {
        info!("Using WGL for OpenGL context.");
        DisplayApiPreference::Wgl(None)
    };
    #[cfg(target_os = "macos")]
    let preference = {
        info!("Using CGL for OpenGL context.");
        DisplayApiPreference::Cgl
    };
    #[cfg(all(unix, not(target_os = "macos")))]
    let preference = {
        info!("Using EGL for OpenGL context.");
        DisplayApiPreference::Egl
    };

    let display =
        unsafe { Display::new(display_handle, preference) }.map_err(Error::unavailable)?;

    let template = ConfigTemplateBuilder::new()
        .with_alpha_size(8)
        .with_transparency(false)
        .build();
    let config = unsafe { display.find_configs(template) }
        .map_err(Error::unavailable)?
        .next()
        .ok_or_else(|| Error::unavailable("no suitable GL config"))?;

    let (width, height): (u32, u32) = window.inner_size().into();
    let (Some(width), Some(height)) = (NonZeroU32::new(width), NonZeroU32::new(height)) else {
        return Err(Error::unavailable("window has zero size"));
    };
    let raw_window_handle = window.window_handle().map_err(Error::unavailable)?.as_raw();
    let surface_attributes =
        SurfaceAttributesBuilder::<WindowSurface>::new().build(raw_window_handle, width, height);
    let surface = unsafe { display.create_window_surface(&config, &surface_attributes) }
        .map_err(Error::unavailable)?;

    let context_attributes = ContextAttributesBuilder::new()
        .with_debug(gfx_debug_enabled)
        .build(Some(raw_window_handle));
    let context = unsafe { display.create_context(&config, &context_attributes) }
        .map_err(Error::unavailable)?
        .make_current(&surface)
        .map_err(Error::unavailable)?;

    set_swap_interval(&display, &surface, &context, vsync_enabled);

    let gl = unsafe { glow::Context::from_loader_function_cstr(|s: &CStr| display.get_proc_address(s)) };
    Ok((surface, context, gl))
}

#[cfg(target_os = "windows")]
fn set_swap_interval(
    display: &Display,
    _surface: &Surface<WindowSurface>,
    _context: &PossiblyCurrentContext,
    vsync_enabled: bool,
) {
    type SwapIntervalFn = extern "system" fn(i32) -> i32;
    let proc = display.get_proc_address(c"wglSwapIntervalEXT");
    if proc.is_null() {
        warn!("wglSwapIntervalEXT function not found. Cannot control VSync.");
        return;
    }
    let f: SwapIntervalFn = unsafe { std::mem::transmute(proc) };
    if f(i32::from(vsync_enabled)) != 0 {
        info!("VSync {}.", if vsync_enabled { "on" } else { "off" });
    } else {
        warn!("wglSwapIntervalEXT call failed. VSync state may not be as requested.");
    }
}

#[cfg(not(target_os = "windows"))]
fn set_swap_interval(
    _display: &Display,
    surface: &Surface<WindowSurface>,
    context: &PossiblyCurrentContext,
    vsync_enabled: bool,
) {
    use glutin::surface::SwapInterval;
    let interval = if vsync_enabled {
        SwapInterval::Wait(NonZeroU32::MIN)
    } else {
        SwapInterval::DontWait
    };
    match surface.set_swap_interval(context, interval) {
        Ok(()) => info!("VSync {}.", if vsync_enabled { "on" } else { "off" }),
        Err(e) => warn!("Failed to set swap interval (VSync): {e:?}"),
    }
}
