use std::{fmt::Debug, hash::Hash};

/// The slice of an immediate-mode GL driver this layer talks to.
///
/// Shaped after `glow::HasContext`: handles are associated types, enum
/// arguments are the raw GL values (`glow::*` constants), and an empty
/// binding is `None`. Implementations perform the call directly; every
/// caching decision lives in [`crate::core::gfx::Context`].
pub trait Driver {
    type Texture: Copy + Eq + Hash + Debug;
    type Framebuffer: Copy + Eq + Hash + Debug;
    type Shader: Copy + Eq + Hash + Debug;
    type Program: Copy + Eq + Hash + Debug;
    type Buffer: Copy + Eq + Hash + Debug;
    type VertexArray: Copy + Eq + Hash + Debug;
    type UniformLocation: Clone + Debug;

    // Textures
    fn create_texture(&self) -> Result<Self::Texture, String>;
    fn is_texture(&self, texture: Self::Texture) -> bool;
    fn delete_texture(&self, texture: Self::Texture);
    fn bind_texture(&self, texture: Option<Self::Texture>);
    fn pixel_store_i32(&self, parameter: u32, value: i32);
    fn tex_parameter_i32(&self, parameter: u32, value: i32);
    fn tex_image_2d(&self, width: i32, height: i32, pixels: Option<&[u8]>);
    fn tex_sub_image_2d(&self, x: i32, y: i32, width: i32, height: i32, pixels: &[u8]);

    // Framebuffers
    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String>;
    fn is_framebuffer(&self, framebuffer: Self::Framebuffer) -> bool;
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);
    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>);
    fn framebuffer_texture_2d(&self, texture: Option<Self::Texture>);
    fn check_framebuffer_status(&self) -> u32;
    /// The framebuffer the driver reports as bound right now.
    fn current_framebuffer(&self) -> Option<Self::Framebuffer>;
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn read_pixels(&self, x: i32, y: i32, width: i32, height: i32, pixels: &mut [u8]);

    // Fixed-function state
    fn enable(&self, capability: u32);
    fn blend_func(&self, src: u32, dst: u32);

    // Shaders and programs
    fn create_shader(&self, kind: u32) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn is_shader(&self, shader: Self::Shader) -> bool;
    fn delete_shader(&self, shader: Self::Shader);
    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn program_link_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn is_program(&self, program: Self::Program) -> bool;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    // Uniforms and attributes
    fn uniform_location(&self, program: Self::Program, name: &str)
    -> Option<Self::UniformLocation>;
    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    fn uniform_1_i32(&self, location: Option<&Self::UniformLocation>, v: i32);
    fn uniform_1_f32(&self, location: Option<&Self::UniformLocation>, v: f32);
    fn uniform_2_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32);
    fn uniform_4_f32(
        &self,
        location: Option<&Self::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    );
    fn uniform_matrix_4_f32(&self, location: Option<&Self::UniformLocation>, v: &[f32]);
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        stride: i32,
        offset: i32,
    );
    fn enable_vertex_attrib_array(&self, index: u32);
    fn disable_vertex_attrib_array(&self, index: u32);

    // Buffers
    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn is_buffer(&self, buffer: Self::Buffer) -> bool;
    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>);
    fn buffer_data_size(&self, target: u32, size: i32, usage: u32);
    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]);
    fn delete_buffer(&self, buffer: Self::Buffer);
    fn create_vertex_array(&self) -> Result<Self::VertexArray, String>;
    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);
    fn delete_vertex_array(&self, vertex_array: Self::VertexArray);

    // Drawing and queries
    fn draw_elements(&self, mode: u32, count: i32, element_type: u32, offset: i32);
    fn get_error(&self) -> u32;
    fn get_parameter_i32(&self, parameter: u32) -> i32;
    fn flush(&self);
    fn is_context_lost(&self) -> bool;
    fn restore_context(&self);
}
