use crate::core::gfx::{
    BufferType, CompositeMode, DataType, DrawMode, Driver, Error, LocationCache, ProgramId,
    ShaderType,
};
use image::RgbaImage;
use log::{debug, trace, warn};
use rustc_hash::FxHashMap;

/// What the state cache believes is bound to a binding point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding<T> {
    /// Never bound since the last reset, or the bound object was deleted.
    /// The next bind always reaches the driver.
    Unknown,
    Bound(T),
}

/// Owns the driver for one GL context and mirrors its binding state.
///
/// Every bind/blend request is compared against the mirror and dropped when
/// it would not change anything. The mirror is only written after the
/// driver call has been issued, so it never runs ahead of the driver.
///
/// Not thread-safe: one `Context` per rendering thread.
pub struct Context<D: Driver> {
    driver: D,
    locations: LocationCache<D::UniformLocation>,
    last_texture: Option<D::Texture>,
    last_framebuffer: Binding<Option<D::Framebuffer>>,
    screen_framebuffer: Option<D::Framebuffer>,
    last_viewport: (i32, i32),
    last_composite_mode: Option<CompositeMode>,
    last_program_id: u64,
    program_ids: FxHashMap<D::Program, ProgramId>,
    max_texture_size: Option<i32>,
}

impl<D: Driver> Context<D> {
    /// Wraps `driver`. Call [`Context::reset`] before issuing any draw work.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            locations: LocationCache::new(),
            last_texture: None,
            last_framebuffer: Binding::Unknown,
            screen_framebuffer: None,
            last_viewport: (0, 0),
            last_composite_mode: None,
            last_program_id: 0,
            program_ids: FxHashMap::default(),
            max_texture_size: None,
        }
    }

    #[inline(always)]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    // --- State cache ---

    /// Forgets everything known about the driver and re-establishes the
    /// defaults. Required after init and after a lost context is restored.
    pub fn reset(&mut self) {
        debug!("Resetting GL state cache.");
        self.locations.clear();
        self.program_ids.clear();
        self.max_texture_size = None;
        self.last_texture = None;
        self.last_framebuffer = Binding::Unknown;
        self.last_viewport = (0, 0);
        self.last_composite_mode = None;
        self.driver.enable(glow::BLEND);
        self.blend_func(CompositeMode::SourceOver);
        // The screen is not always framebuffer zero (e.g. iOS), so ask.
        self.screen_framebuffer = self.driver.current_framebuffer();
    }

    pub fn blend_func(&mut self, mode: CompositeMode) {
        if self.last_composite_mode == Some(mode) {
            return;
        }
        let (src, dst) = mode.blend_factors();
        self.driver.blend_func(src, dst);
        self.last_composite_mode = Some(mode);
    }

    pub fn bind_texture(&mut self, texture: D::Texture) {
        if self.last_texture == Some(texture) {
            return;
        }
        self.driver.bind_texture(Some(texture));
        self.last_texture = Some(texture);
    }

    /// Binds `framebuffer`; `None` is the driver's object zero.
    pub fn bind_framebuffer(&mut self, framebuffer: Option<D::Framebuffer>) {
        if self.last_framebuffer == Binding::Bound(framebuffer) {
            return;
        }
        self.driver.bind_framebuffer(framebuffer);
        self.last_framebuffer = Binding::Bound(framebuffer);
    }

    /// Binds `framebuffer` and makes the viewport cover `width` x `height`.
    pub fn set_viewport(&mut self, framebuffer: Option<D::Framebuffer>, width: i32, height: i32) {
        self.bind_framebuffer(framebuffer);
        if self.last_viewport != (width, height) {
            self.driver.viewport(0, 0, width, height);
            self.last_viewport = (width, height);
        }
    }

    #[inline(always)]
    pub fn last_texture(&self) -> Option<D::Texture> {
        self.last_texture
    }

    #[inline(always)]
    pub fn last_framebuffer(&self) -> Binding<Option<D::Framebuffer>> {
        self.last_framebuffer
    }

    #[inline(always)]
    pub fn last_viewport(&self) -> (i32, i32) {
        self.last_viewport
    }

    #[inline(always)]
    pub fn last_composite_mode(&self) -> Option<CompositeMode> {
        self.last_composite_mode
    }

    /// The framebuffer that was bound when the cache was last reset.
    #[inline(always)]
    pub fn screen_framebuffer(&self) -> Option<D::Framebuffer> {
        self.screen_framebuffer
    }

    // --- Textures ---

    /// Allocates an RGBA8 texture with undefined contents, nearest
    /// filtering and clamp-to-edge wrapping. Leaves it bound.
    pub fn new_texture(&mut self, width: i32, height: i32) -> Result<D::Texture, Error> {
        if width <= 0 || height <= 0 {
            return Err(Error::creation(
                "texture",
                format!("invalid size {width}x{height}"),
            ));
        }
        let max = self.max_texture_size();
        if width > max || height > max {
            return Err(Error::creation(
                "texture",
                format!("{width}x{height} exceeds the driver limit of {max}"),
            ));
        }
        let t = self
            .driver
            .create_texture()
            .map_err(|e| Error::creation("texture", e))?;
        self.driver.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
        self.bind_texture(t);

        let gl = &self.driver;
        gl.tex_parameter_i32(glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
        gl.tex_parameter_i32(glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
        gl.tex_parameter_i32(glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        gl.tex_image_2d(width, height, None);
        Ok(t)
    }

    /// Uploads tightly packed RGBA8 `pixels` into a region of `texture`.
    /// Extra trailing bytes are ignored.
    pub fn texture_sub_image(
        &mut self,
        texture: D::Texture,
        pixels: &[u8],
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), Error> {
        let expected = 4 * width.max(0) as usize * height.max(0) as usize;
        if pixels.len() < expected {
            return Err(Error::UploadSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        self.bind_texture(texture);
        self.driver
            .tex_sub_image_2d(x, y, width, height, &pixels[..expected]);
        Ok(())
    }

    pub fn is_texture(&self, texture: D::Texture) -> bool {
        self.driver.is_texture(texture)
    }

    pub fn delete_texture(&mut self, texture: D::Texture) {
        if !self.driver.is_texture(texture) {
            trace!("Ignoring delete of stale texture {texture:?}.");
            return;
        }
        if self.last_texture == Some(texture) {
            self.last_texture = None;
        }
        self.driver.delete_texture(texture);
    }

    // --- Framebuffers ---

    /// Creates a framebuffer rendering into `texture`. Leaves it bound.
    pub fn new_framebuffer(&mut self, texture: D::Texture) -> Result<D::Framebuffer, Error> {
        let f = self
            .driver
            .create_framebuffer()
            .map_err(|e| Error::creation("framebuffer", e))?;
        self.bind_framebuffer(Some(f));
        self.driver.framebuffer_texture_2d(Some(texture));
        let status = self.driver.check_framebuffer_status();
        if status != glow::FRAMEBUFFER_COMPLETE {
            self.delete_framebuffer(f);
            return Err(Error::ResourceCreation {
                resource: "framebuffer",
                reason: format!("incomplete (status 0x{status:04x})"),
                status: Some(status),
            });
        }
        Ok(f)
    }

    pub fn delete_framebuffer(&mut self, framebuffer: D::Framebuffer) {
        if !self.driver.is_framebuffer(framebuffer) {
            trace!("Ignoring delete of stale framebuffer {framebuffer:?}.");
            return;
        }
        // Deleting the bound framebuffer silently rebinds object zero, which
        // is not necessarily the screen.
        if self.last_framebuffer == Binding::Bound(Some(framebuffer)) {
            self.last_framebuffer = Binding::Unknown;
            self.last_viewport = (0, 0);
        }
        self.driver.delete_framebuffer(framebuffer);
    }

    /// Reads back `width` x `height` RGBA8 pixels from `framebuffer`.
    pub fn framebuffer_pixels(
        &mut self,
        framebuffer: Option<D::Framebuffer>,
        width: i32,
        height: i32,
    ) -> Result<Vec<u8>, Error> {
        self.bind_framebuffer(framebuffer);
        let mut pixels = vec![0u8; 4 * width.max(0) as usize * height.max(0) as usize];
        self.driver.read_pixels(0, 0, width, height, &mut pixels);
        let code = self.driver.get_error();
        if code != glow::NO_ERROR {
            return Err(Error::Readback { code });
        }
        Ok(pixels)
    }

    /// [`Context::framebuffer_pixels`] wrapped as an image.
    pub fn framebuffer_image(
        &mut self,
        framebuffer: Option<D::Framebuffer>,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, Error> {
        let w = i32::try_from(width).map_err(|_| Error::Readback { code: glow::INVALID_VALUE })?;
        let h = i32::try_from(height).map_err(|_| Error::Readback { code: glow::INVALID_VALUE })?;
        let pixels = self.framebuffer_pixels(framebuffer, w, h)?;
        RgbaImage::from_raw(width, height, pixels).ok_or(Error::Readback {
            code: glow::INVALID_VALUE,
        })
    }

    // --- Shaders and programs ---

    pub fn new_shader(&mut self, kind: ShaderType, source: &str) -> Result<D::Shader, Error> {
        let gl = &self.driver;
        let s = gl
            .create_shader(kind.gl_enum())
            .map_err(|e| Error::creation("shader", e))?;
        gl.shader_source(s, source);
        gl.compile_shader(s);
        if !gl.shader_compile_status(s) {
            let log = gl.shader_info_log(s);
            gl.delete_shader(s);
            warn!("Compiling {kind} shader failed: {log}");
            return Err(Error::ShaderCompile { kind, log });
        }
        Ok(s)
    }

    pub fn delete_shader(&mut self, shader: D::Shader) {
        if !self.driver.is_shader(shader) {
            trace!("Ignoring delete of stale shader {shader:?}.");
            return;
        }
        self.driver.delete_shader(shader);
    }

    /// Links `shaders` into a program and tags it with a fresh [`ProgramId`].
    pub fn new_program(&mut self, shaders: &[D::Shader]) -> Result<D::Program, Error> {
        let gl = &self.driver;
        let p = gl
            .create_program()
            .map_err(|e| Error::creation("program", e))?;
        for &shader in shaders {
            gl.attach_shader(p, shader);
        }
        gl.link_program(p);
        if !gl.program_link_status(p) {
            let log = gl.program_info_log(p);
            gl.delete_program(p);
            warn!("Linking program failed: {log}");
            return Err(Error::ProgramLink { log });
        }
        let id = ProgramId(self.last_program_id);
        self.last_program_id += 1;
        self.program_ids.insert(p, id);
        Ok(p)
    }

    /// Sequential identity of a program created by this context.
    pub fn program_id(&self, program: D::Program) -> Option<ProgramId> {
        self.program_ids.get(&program).copied()
    }

    pub fn use_program(&mut self, program: D::Program) {
        self.driver.use_program(Some(program));
    }

    pub fn delete_program(&mut self, program: D::Program) {
        if !self.driver.is_program(program) {
            trace!("Ignoring delete of stale program {program:?}.");
            return;
        }
        // The driver may hand this name out again; the identity must not follow.
        if let Some(id) = self.program_ids.remove(&program) {
            self.locations.forget(id);
        }
        self.driver.delete_program(program);
    }

    // --- Uniforms and attributes ---

    fn uniform_location(&mut self, program: D::Program, name: &str) -> Option<D::UniformLocation> {
        let driver = &self.driver;
        match self.program_ids.get(&program) {
            Some(&id) => self
                .locations
                .uniform(id, name, || driver.uniform_location(program, name)),
            None => driver.uniform_location(program, name),
        }
    }

    fn attrib_location(&mut self, program: D::Program, name: &str) -> Option<u32> {
        let driver = &self.driver;
        let location = match self.program_ids.get(&program) {
            Some(&id) => self
                .locations
                .attrib(id, name, || driver.attrib_location(program, name)),
            None => driver.attrib_location(program, name),
        };
        if location.is_none() {
            trace!("Attribute '{name}' is not active in {program:?}.");
        }
        location
    }

    pub fn uniform_int(&mut self, program: D::Program, name: &str, v: i32) {
        let l = self.uniform_location(program, name);
        self.driver.uniform_1_i32(l.as_ref(), v);
    }

    pub fn uniform_float(&mut self, program: D::Program, name: &str, v: f32) {
        let l = self.uniform_location(program, name);
        self.driver.uniform_1_f32(l.as_ref(), v);
    }

    /// Sets a vec2 (2 floats), vec4 (4) or column-major mat4 (16) uniform.
    pub fn uniform_floats(&mut self, program: D::Program, name: &str, v: &[f32]) -> Result<(), Error> {
        if !matches!(v.len(), 2 | 4 | 16) {
            return Err(Error::UnsupportedUniformLength {
                name: name.to_string(),
                len: v.len(),
            });
        }
        let l = self.uniform_location(program, name);
        let gl = &self.driver;
        match v {
            [x, y] => gl.uniform_2_f32(l.as_ref(), *x, *y),
            [x, y, z, w] => gl.uniform_4_f32(l.as_ref(), *x, *y, *z, *w),
            m => gl.uniform_matrix_4_f32(l.as_ref(), m),
        }
        Ok(())
    }

    pub fn vertex_attrib_pointer(
        &mut self,
        program: D::Program,
        name: &str,
        size: i32,
        data_type: DataType,
        stride: i32,
        offset: i32,
    ) {
        if let Some(l) = self.attrib_location(program, name) {
            self.driver
                .vertex_attrib_pointer_f32(l, size, data_type.gl_enum(), stride, offset);
        }
    }

    pub fn enable_vertex_attrib_array(&mut self, program: D::Program, name: &str) {
        if let Some(l) = self.attrib_location(program, name) {
            self.driver.enable_vertex_attrib_array(l);
        }
    }

    pub fn disable_vertex_attrib_array(&mut self, program: D::Program, name: &str) {
        if let Some(l) = self.attrib_location(program, name) {
            self.driver.disable_vertex_attrib_array(l);
        }
    }

    // --- Buffers ---

    pub fn new_array_buffer(&mut self, size: usize) -> Result<D::Buffer, Error> {
        self.new_buffer(BufferType::Array, size)
    }

    pub fn new_element_array_buffer(&mut self, size: usize) -> Result<D::Buffer, Error> {
        self.new_buffer(BufferType::ElementArray, size)
    }

    fn new_buffer(&mut self, kind: BufferType, size: usize) -> Result<D::Buffer, Error> {
        let size = i32::try_from(size)
            .map_err(|_| Error::creation("buffer", format!("{size} bytes is too large")))?;
        let b = self
            .driver
            .create_buffer()
            .map_err(|e| Error::creation("buffer", e))?;
        self.driver.bind_buffer(kind.gl_enum(), Some(b));
        self.driver
            .buffer_data_size(kind.gl_enum(), size, glow::DYNAMIC_DRAW);
        Ok(b)
    }

    pub fn bind_buffer(&mut self, kind: BufferType, buffer: D::Buffer) {
        self.driver.bind_buffer(kind.gl_enum(), Some(buffer));
    }

    /// Writes `data` at the start of the bound array buffer.
    pub fn array_buffer_sub_data(&mut self, data: &[f32]) {
        self.driver
            .buffer_sub_data(glow::ARRAY_BUFFER, 0, bytemuck::cast_slice(data));
    }

    /// Writes `data` at the start of the bound element array buffer.
    pub fn element_array_buffer_sub_data(&mut self, data: &[u16]) {
        self.driver
            .buffer_sub_data(glow::ELEMENT_ARRAY_BUFFER, 0, bytemuck::cast_slice(data));
    }

    pub fn delete_buffer(&mut self, buffer: D::Buffer) {
        if !self.driver.is_buffer(buffer) {
            trace!("Ignoring delete of stale buffer {buffer:?}.");
            return;
        }
        self.driver.delete_buffer(buffer);
    }

    pub fn new_vertex_array(&mut self) -> Result<D::VertexArray, Error> {
        self.driver
            .create_vertex_array()
            .map_err(|e| Error::creation("vertex array", e))
    }

    pub fn bind_vertex_array(&mut self, vertex_array: Option<D::VertexArray>) {
        self.driver.bind_vertex_array(vertex_array);
    }

    pub fn delete_vertex_array(&mut self, vertex_array: D::VertexArray) {
        self.driver.delete_vertex_array(vertex_array);
    }

    // --- Drawing and queries ---

    /// Draws `count` unsigned-short indices starting `offset_in_bytes` into
    /// the bound element array buffer.
    pub fn draw_elements(&mut self, mode: DrawMode, count: i32, offset_in_bytes: i32) {
        self.driver
            .draw_elements(mode.gl_enum(), count, glow::UNSIGNED_SHORT, offset_in_bytes);
    }

    pub fn max_texture_size(&mut self) -> i32 {
        if let Some(size) = self.max_texture_size {
            return size;
        }
        let size = self.driver.get_parameter_i32(glow::MAX_TEXTURE_SIZE);
        self.max_texture_size = Some(size);
        size
    }

    pub fn flush(&self) {
        self.driver.flush();
    }

    pub fn is_context_lost(&self) -> bool {
        self.driver.is_context_lost()
    }

    pub fn restore_context(&self) {
        self.driver.restore_context();
    }
}
