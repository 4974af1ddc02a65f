//! Call-recording driver used by the unit tests.

use crate::core::gfx::Driver;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    BindTexture(Option<u32>),
    BindFramebuffer(Option<u32>),
    Viewport(i32, i32, i32, i32),
    Enable(u32),
    BlendFunc(u32, u32),
    PixelStore(u32, i32),
    TexParameter(u32, i32),
    TexImage(i32, i32, bool),
    TexSubImage(i32, i32, i32, i32),
    AttachTexture(Option<u32>),
    ReadPixels(i32, i32),
    Delete(Kind, u32),
    UniformLocation(u32, String),
    AttribLocation(u32, String),
    Uniform1i(Option<u32>, i32),
    Uniform1f(Option<u32>, f32),
    Uniform2f(Option<u32>, f32, f32),
    Uniform4f(Option<u32>, [f32; 4]),
    UniformMatrix4(Option<u32>, Vec<f32>),
    VertexAttribPointer(u32, i32, u32, i32, i32),
    EnableAttrib(u32),
    DisableAttrib(u32),
    UseProgram(Option<u32>),
    BindBuffer(u32, Option<u32>),
    BufferData(u32, i32, u32),
    BufferSubData(u32, i32, Vec<u8>),
    BindVertexArray(Option<u32>),
    DrawElements(u32, i32, u32, i32),
    GetParameter(u32),
    Flush,
    RestoreContext,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Texture,
    Framebuffer,
    Shader,
    Program,
    Buffer,
    VertexArray,
}

/// Hands out small integer names and recycles deleted ones first, the way
/// real drivers do.
pub(crate) struct StubDriver {
    calls: RefCell<Vec<Call>>,
    next_name: Cell<u32>,
    free_names: RefCell<Vec<u32>>,
    live: RefCell<FxHashMap<u32, Kind>>,
    bound_framebuffer: Cell<Option<u32>>,
    pub framebuffer_status: Cell<u32>,
    pub compile_ok: Cell<bool>,
    pub link_ok: Cell<bool>,
    pub refuse_creation: Cell<bool>,
    /// Creations still allowed before the stub starts refusing; `None` is unlimited.
    pub creation_budget: Cell<Option<usize>>,
    pub error: Cell<u32>,
    pub lost: Cell<bool>,
    pub max_texture_size: i32,
}

impl StubDriver {
    pub fn new() -> Self {
        Self::with_screen_framebuffer(None)
    }

    /// Some platforms render to a non-zero framebuffer; seed it here.
    pub fn with_screen_framebuffer(screen: Option<u32>) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            next_name: Cell::new(1),
            free_names: RefCell::new(Vec::new()),
            live: RefCell::new(FxHashMap::default()),
            bound_framebuffer: Cell::new(screen),
            framebuffer_status: Cell::new(glow::FRAMEBUFFER_COMPLETE),
            compile_ok: Cell::new(true),
            link_ok: Cell::new(true),
            refuse_creation: Cell::new(false),
            creation_budget: Cell::new(None),
            error: Cell::new(glow::NO_ERROR),
            lost: Cell::new(false),
            max_texture_size: 4096,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    /// Objects created and not yet deleted.
    pub fn live_count(&self) -> usize {
        self.live.borrow().len()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn alloc(&self, kind: Kind) -> Result<u32, String> {
        if self.refuse_creation.get() || self.creation_budget.get() == Some(0) {
            return Err(format!("out of {kind:?} names"));
        }
        if let Some(n) = self.creation_budget.get() {
            self.creation_budget.set(Some(n - 1));
        }
        let name = self.free_names.borrow_mut().pop().unwrap_or_else(|| {
            let n = self.next_name.get();
            self.next_name.set(n + 1);
            n
        });
        self.live.borrow_mut().insert(name, kind);
        Ok(name)
    }

    fn is(&self, name: u32, kind: Kind) -> bool {
        self.live.borrow().get(&name) == Some(&kind)
    }

    fn free(&self, name: u32, kind: Kind) {
        self.record(Call::Delete(kind, name));
        if self.live.borrow_mut().remove(&name).is_some() {
            self.free_names.borrow_mut().push(name);
        }
    }
}

impl Driver for StubDriver {
    type Texture = u32;
    type Framebuffer = u32;
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type VertexArray = u32;
    type UniformLocation = u32;

    fn create_texture(&self) -> Result<u32, String> {
        self.alloc(Kind::Texture)
    }
    fn is_texture(&self, texture: u32) -> bool {
        self.is(texture, Kind::Texture)
    }
    fn delete_texture(&self, texture: u32) {
        self.free(texture, Kind::Texture);
    }
    fn bind_texture(&self, texture: Option<u32>) {
        self.record(Call::BindTexture(texture));
    }
    fn pixel_store_i32(&self, parameter: u32, value: i32) {
        self.record(Call::PixelStore(parameter, value));
    }
    fn tex_parameter_i32(&self, parameter: u32, value: i32) {
        self.record(Call::TexParameter(parameter, value));
    }
    fn tex_image_2d(&self, width: i32, height: i32, pixels: Option<&[u8]>) {
        self.record(Call::TexImage(width, height, pixels.is_some()));
    }
    fn tex_sub_image_2d(&self, x: i32, y: i32, width: i32, height: i32, _pixels: &[u8]) {
        self.record(Call::TexSubImage(x, y, width, height));
    }

    fn create_framebuffer(&self) -> Result<u32, String> {
        self.alloc(Kind::Framebuffer)
    }
    fn is_framebuffer(&self, framebuffer: u32) -> bool {
        self.is(framebuffer, Kind::Framebuffer)
    }
    fn delete_framebuffer(&self, framebuffer: u32) {
        if self.bound_framebuffer.get() == Some(framebuffer) {
            self.bound_framebuffer.set(None);
        }
        self.free(framebuffer, Kind::Framebuffer);
    }
    fn bind_framebuffer(&self, framebuffer: Option<u32>) {
        self.bound_framebuffer.set(framebuffer);
        self.record(Call::BindFramebuffer(framebuffer));
    }
    fn framebuffer_texture_2d(&self, texture: Option<u32>) {
        self.record(Call::AttachTexture(texture));
    }
    fn check_framebuffer_status(&self) -> u32 {
        self.framebuffer_status.get()
    }
    fn current_framebuffer(&self) -> Option<u32> {
        self.bound_framebuffer.get()
    }
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(Call::Viewport(x, y, width, height));
    }
    fn read_pixels(&self, _x: i32, _y: i32, width: i32, height: i32, pixels: &mut [u8]) {
        pixels.fill(0xab);
        self.record(Call::ReadPixels(width, height));
    }

    fn enable(&self, capability: u32) {
        self.record(Call::Enable(capability));
    }
    fn blend_func(&self, src: u32, dst: u32) {
        self.record(Call::BlendFunc(src, dst));
    }

    fn create_shader(&self, _kind: u32) -> Result<u32, String> {
        self.alloc(Kind::Shader)
    }
    fn shader_source(&self, _shader: u32, _source: &str) {}
    fn compile_shader(&self, _shader: u32) {}
    fn shader_compile_status(&self, _shader: u32) -> bool {
        self.compile_ok.get()
    }
    fn shader_info_log(&self, _shader: u32) -> String {
        "ERROR: 0:1: 'vec5' : no matching overloaded function found".to_string()
    }
    fn is_shader(&self, shader: u32) -> bool {
        self.is(shader, Kind::Shader)
    }
    fn delete_shader(&self, shader: u32) {
        self.free(shader, Kind::Shader);
    }
    fn create_program(&self) -> Result<u32, String> {
        self.alloc(Kind::Program)
    }
    fn attach_shader(&self, _program: u32, _shader: u32) {}
    fn link_program(&self, _program: u32) {}
    fn program_link_status(&self, _program: u32) -> bool {
        self.link_ok.get()
    }
    fn program_info_log(&self, _program: u32) -> String {
        "error: varying not written".to_string()
    }
    fn is_program(&self, program: u32) -> bool {
        self.is(program, Kind::Program)
    }
    fn delete_program(&self, program: u32) {
        self.free(program, Kind::Program);
    }
    fn use_program(&self, program: Option<u32>) {
        self.record(Call::UseProgram(program));
    }

    /// Names starting with `unused` behave like uniforms the compiler dropped.
    fn uniform_location(&self, program: u32, name: &str) -> Option<u32> {
        self.record(Call::UniformLocation(program, name.to_string()));
        (!name.starts_with("unused")).then(|| name.len() as u32)
    }
    fn attrib_location(&self, program: u32, name: &str) -> Option<u32> {
        self.record(Call::AttribLocation(program, name.to_string()));
        (!name.starts_with("unused")).then(|| name.len() as u32)
    }
    fn uniform_1_i32(&self, location: Option<&u32>, v: i32) {
        self.record(Call::Uniform1i(location.copied(), v));
    }
    fn uniform_1_f32(&self, location: Option<&u32>, v: f32) {
        self.record(Call::Uniform1f(location.copied(), v));
    }
    fn uniform_2_f32(&self, location: Option<&u32>, x: f32, y: f32) {
        self.record(Call::Uniform2f(location.copied(), x, y));
    }
    fn uniform_4_f32(&self, location: Option<&u32>, x: f32, y: f32, z: f32, w: f32) {
        self.record(Call::Uniform4f(location.copied(), [x, y, z, w]));
    }
    fn uniform_matrix_4_f32(&self, location: Option<&u32>, v: &[f32]) {
        self.record(Call::UniformMatrix4(location.copied(), v.to_vec()));
    }
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        stride: i32,
        offset: i32,
    ) {
        self.record(Call::VertexAttribPointer(
            index, size, data_type, stride, offset,
        ));
    }
    fn enable_vertex_attrib_array(&self, index: u32) {
        self.record(Call::EnableAttrib(index));
    }
    fn disable_vertex_attrib_array(&self, index: u32) {
        self.record(Call::DisableAttrib(index));
    }

    fn create_buffer(&self) -> Result<u32, String> {
        self.alloc(Kind::Buffer)
    }
    fn is_buffer(&self, buffer: u32) -> bool {
        self.is(buffer, Kind::Buffer)
    }
    fn bind_buffer(&self, target: u32, buffer: Option<u32>) {
        self.record(Call::BindBuffer(target, buffer));
    }
    fn buffer_data_size(&self, target: u32, size: i32, usage: u32) {
        self.record(Call::BufferData(target, size, usage));
    }
    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]) {
        self.record(Call::BufferSubData(target, offset, data.to_vec()));
    }
    fn delete_buffer(&self, buffer: u32) {
        self.free(buffer, Kind::Buffer);
    }
    fn create_vertex_array(&self) -> Result<u32, String> {
        self.alloc(Kind::VertexArray)
    }
    fn bind_vertex_array(&self, vertex_array: Option<u32>) {
        self.record(Call::BindVertexArray(vertex_array));
    }
    fn delete_vertex_array(&self, vertex_array: u32) {
        self.free(vertex_array, Kind::VertexArray);
    }

    fn draw_elements(&self, mode: u32, count: i32, element_type: u32, offset: i32) {
        self.record(Call::DrawElements(mode, count, element_type, offset));
    }
    fn get_error(&self) -> u32 {
        self.error.replace(glow::NO_ERROR)
    }
    fn get_parameter_i32(&self, parameter: u32) -> i32 {
        self.record(Call::GetParameter(parameter));
        self.max_texture_size
    }
    fn flush(&self) {
        self.record(Call::Flush);
    }
    fn is_context_lost(&self) -> bool {
        self.lost.get()
    }
    fn restore_context(&self) {
        self.lost.set(false);
        self.record(Call::RestoreContext);
    }
}
