use crate::core::gfx::vertices::{QUAD_CAPACITY, QUAD_FLOATS, VERTEX_SIZE_IN_BYTES};
use crate::core::gfx::{
    BufferType, CompositeMode, Context, DataType, DrawMode, Driver, Error, GeoM, QuadRequest,
    ShaderType, VertexSlab, quad_vertices,
};
use crate::core::space::{ortho_for_offscreen, ortho_for_window, padded_size};
use image::RgbaImage;
use log::info;

const VERTEX_SHADER: &str = include_str!("shaders/sprite.vert");
const FRAGMENT_SHADER: &str = include_str!("shaders/sprite.frag");

/// Quad corners are emitted TL, TR, BL, BR.
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 1, 2, 3];

/// A texture allocated at power-of-two size holding a smaller image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageTexture<T> {
    pub texture: T,
    pub width: i32,
    pub height: i32,
}

impl<T> ImageTexture<T> {
    pub const fn full_request(&self) -> QuadRequest {
        QuadRequest::full(self.width, self.height)
    }
}

/// Where a draw lands.
#[derive(Clone, Copy, Debug)]
pub struct Target<F> {
    /// `None` is the driver's object zero.
    pub framebuffer: Option<F>,
    pub width: u32,
    pub height: u32,
    /// Offscreen targets store rows bottom-up.
    pub offscreen: bool,
}

impl<F> Target<F> {
    pub const fn screen(framebuffer: Option<F>, width: u32, height: u32) -> Self {
        Self {
            framebuffer,
            width,
            height,
            offscreen: false,
        }
    }

    pub const fn offscreen(framebuffer: F, width: u32, height: u32) -> Self {
        Self {
            framebuffer: Some(framebuffer),
            width,
            height,
            offscreen: true,
        }
    }

    fn projection(&self) -> [f32; 16] {
        let m = if self.offscreen {
            ortho_for_offscreen(self.width, self.height)
        } else {
            ortho_for_window(self.width, self.height)
        };
        m.to_cols_array()
    }
}

pub struct SpriteDraw<'a, T> {
    pub image: &'a ImageTexture<T>,
    pub request: QuadRequest,
    pub geom: &'a dyn GeoM,
    pub composite: CompositeMode,
    pub color_scale: [f32; 4],
}

/// Uploads `image` into a texture padded to power-of-two dimensions.
pub fn new_image_texture<D: Driver>(
    ctx: &mut Context<D>,
    image: &RgbaImage,
) -> Result<ImageTexture<D::Texture>, Error> {
    let width = i32::try_from(image.width())
        .map_err(|_| Error::creation("texture", "image too wide"))?;
    let height = i32::try_from(image.height())
        .map_err(|_| Error::creation("texture", "image too tall"))?;
    let (w, h) = padded_size(width, height)
        .ok_or_else(|| Error::creation("texture", format!("{width}x{height} cannot be padded")))?;
    let texture = ctx.new_texture(w, h)?;
    if let Err(e) = ctx.texture_sub_image(texture, image.as_raw(), 0, 0, width, height) {
        ctx.delete_texture(texture);
        return Err(e);
    }
    Ok(ImageTexture {
        texture,
        width,
        height,
    })
}

/// One-quad-per-call sprite pipeline built on [`Context`].
pub struct SpriteRenderer<D: Driver> {
    program: D::Program,
    vertex_array: D::VertexArray,
    vertex_buffer: D::Buffer,
    index_buffer: D::Buffer,
}

impl<D: Driver> SpriteRenderer<D> {
    pub fn new(ctx: &mut Context<D>) -> Result<Self, Error> {
        info!("Building sprite pipeline...");
        let vs = ctx.new_shader(ShaderType::Vertex, VERTEX_SHADER)?;
        let fs = match ctx.new_shader(ShaderType::Fragment, FRAGMENT_SHADER) {
            Ok(fs) => fs,
            Err(e) => {
                ctx.delete_shader(vs);
                return Err(e);
            }
        };
        let program = ctx.new_program(&[vs, fs]);
        ctx.delete_shader(vs);
        ctx.delete_shader(fs);
        let program = program?;

        match Self::new_buffers(ctx, program) {
            Ok((vertex_array, vertex_buffer, index_buffer)) => {
                info!("Sprite pipeline ready.");
                Ok(Self {
                    program,
                    vertex_array,
                    vertex_buffer,
                    index_buffer,
                })
            }
            Err(e) => {
                ctx.delete_program(program);
                Err(e)
            }
        }
    }

    /// Creates the vertex array with its two buffers. Whatever was created
    /// before a failure is released again.
    fn new_buffers(
        ctx: &mut Context<D>,
        program: D::Program,
    ) -> Result<(D::VertexArray, D::Buffer, D::Buffer), Error> {
        let vertex_array = ctx.new_vertex_array()?;
        ctx.bind_vertex_array(Some(vertex_array));

        let vertex_buffer =
            match ctx.new_array_buffer(QUAD_FLOATS * QUAD_CAPACITY * std::mem::size_of::<f32>()) {
                Ok(b) => b,
                Err(e) => {
                    ctx.bind_vertex_array(None);
                    ctx.delete_vertex_array(vertex_array);
                    return Err(e);
                }
            };
        let stride = VERTEX_SIZE_IN_BYTES as i32;
        ctx.enable_vertex_attrib_array(program, "vertex");
        ctx.vertex_attrib_pointer(program, "vertex", 2, DataType::Float, stride, 0);
        ctx.enable_vertex_attrib_array(program, "tex_coord");
        ctx.vertex_attrib_pointer(
            program,
            "tex_coord",
            4,
            DataType::Float,
            stride,
            (2 * DataType::Float.size_in_bytes()) as i32,
        );

        let indices: Vec<u16> = (0..QUAD_CAPACITY as u16)
            .flat_map(|q| QUAD_INDICES.map(|i| q * 4 + i))
            .collect();
        let index_buffer =
            match ctx.new_element_array_buffer(std::mem::size_of_val(indices.as_slice())) {
                Ok(b) => b,
                Err(e) => {
                    ctx.bind_vertex_array(None);
                    ctx.delete_buffer(vertex_buffer);
                    ctx.delete_vertex_array(vertex_array);
                    return Err(e);
                }
            };
        ctx.element_array_buffer_sub_data(&indices);

        ctx.bind_vertex_array(None);
        Ok((vertex_array, vertex_buffer, index_buffer))
    }

    #[inline(always)]
    pub fn program(&self) -> D::Program {
        self.program
    }

    /// Draws one sprite. Returns `Ok(false)` when the source rectangle is
    /// degenerate, or the image too large to pad, and nothing was drawn.
    pub fn draw(
        &mut self,
        ctx: &mut Context<D>,
        slab: &mut VertexSlab,
        target: &Target<D::Framebuffer>,
        sprite: &SpriteDraw<'_, D::Texture>,
    ) -> Result<bool, Error> {
        let Some((w, h)) = padded_size(sprite.request.width, sprite.request.height) else {
            return Ok(false);
        };
        let Some(vs) = quad_vertices(slab, &sprite.request, sprite.geom) else {
            return Ok(false);
        };
        let p = self.program;

        ctx.set_viewport(target.framebuffer, target.width as i32, target.height as i32);
        ctx.blend_func(sprite.composite);
        ctx.use_program(p);
        ctx.bind_vertex_array(Some(self.vertex_array));
        ctx.bind_buffer(BufferType::Array, self.vertex_buffer);
        ctx.array_buffer_sub_data(vs);

        ctx.uniform_floats(p, "projection_matrix", &target.projection())?;
        ctx.uniform_floats(p, "texture_size", &[w as f32, h as f32])?;
        ctx.uniform_floats(p, "color_scale", &sprite.color_scale)?;
        ctx.uniform_int(p, "texture_sampler", 0);
        ctx.bind_texture(sprite.image.texture);

        ctx.draw_elements(DrawMode::Triangles, QUAD_INDICES.len() as i32, 0);
        ctx.bind_vertex_array(None);
        Ok(true)
    }

    pub fn delete(self, ctx: &mut Context<D>) {
        ctx.delete_buffer(self.vertex_buffer);
        ctx.delete_buffer(self.index_buffer);
        ctx.delete_vertex_array(self.vertex_array);
        ctx.delete_program(self.program);
    }
}

#[cfg(test)]
mod tests {
    use super::{SpriteDraw, SpriteRenderer, Target, new_image_texture};
    use crate::core::gfx::testing::{Call, Kind, StubDriver};
    use crate::core::gfx::{CompositeMode, Context, QuadRequest, VertexSlab};
    use glam::Affine2;
    use image::RgbaImage;

    fn setup() -> (Context<StubDriver>, SpriteRenderer<StubDriver>) {
        let mut ctx = Context::new(StubDriver::new());
        ctx.reset();
        let renderer = SpriteRenderer::new(&mut ctx).expect("pipeline should build");
        ctx.driver().clear_calls();
        (ctx, renderer)
    }

    #[test]
    fn pipeline_sets_up_interleaved_attributes() {
        let mut ctx = Context::new(StubDriver::new());
        ctx.reset();
        let _renderer = SpriteRenderer::new(&mut ctx).unwrap();
        let calls = ctx.driver().calls();
        let vertex = "vertex".len() as u32;
        let tex_coord = "tex_coord".len() as u32;
        assert!(calls.contains(&Call::VertexAttribPointer(vertex, 2, glow::FLOAT, 24, 0)));
        assert!(calls.contains(&Call::VertexAttribPointer(tex_coord, 4, glow::FLOAT, 24, 8)));
        assert!(calls.contains(&Call::BufferData(glow::ARRAY_BUFFER, 256 * 96, glow::DYNAMIC_DRAW)));
        assert!(calls.contains(&Call::BufferData(
            glow::ELEMENT_ARRAY_BUFFER,
            256 * 6 * 2,
            glow::DYNAMIC_DRAW
        )));
        assert_eq!(
            ctx.driver().count(|c| matches!(c, Call::Delete(Kind::Shader, _))),
            2,
            "shaders are released once linked"
        );
    }

    #[test]
    fn image_textures_are_padded_to_powers_of_two() {
        let (mut ctx, _renderer) = setup();
        let image = RgbaImage::new(300, 100);
        let tex = new_image_texture(&mut ctx, &image).unwrap();
        assert_eq!((tex.width, tex.height), (300, 100));
        let calls = ctx.driver().calls();
        assert!(calls.contains(&Call::TexImage(512, 128, false)));
        assert_eq!(calls.last(), Some(&Call::TexSubImage(0, 0, 300, 100)));
    }

    #[test]
    fn failed_construction_releases_every_object() {
        // Two shaders, the program, the vertex array, then the two buffers.
        for budget in 0..6 {
            let mut ctx = Context::new(StubDriver::new());
            ctx.reset();
            ctx.driver().creation_budget.set(Some(budget));
            assert!(
                SpriteRenderer::new(&mut ctx).is_err(),
                "creation {budget} was refused"
            );
            assert_eq!(
                ctx.driver().live_count(),
                0,
                "objects leaked when creation {budget} was refused"
            );
        }
        let mut ctx = Context::new(StubDriver::new());
        ctx.reset();
        ctx.driver().creation_budget.set(Some(6));
        assert!(SpriteRenderer::new(&mut ctx).is_ok());
        assert_eq!(ctx.driver().live_count(), 4, "program, vertex array and two buffers");
    }

    #[test]
    fn draw_uploads_one_quad_and_issues_one_draw() {
        let (mut ctx, mut renderer) = setup();
        let image = new_image_texture(&mut ctx, &RgbaImage::new(256, 128)).unwrap();
        let mut slab = VertexSlab::new();
        let target = Target::screen(None, 640, 480);
        let sprite = SpriteDraw {
            image: &image,
            request: QuadRequest::new(256, 128, 0, 0, 100, 50),
            geom: &Affine2::IDENTITY,
            composite: CompositeMode::SourceOver,
            color_scale: [1.0; 4],
        };
        ctx.driver().clear_calls();

        assert!(renderer.draw(&mut ctx, &mut slab, &target, &sprite).unwrap());
        assert!(renderer.draw(&mut ctx, &mut slab, &target, &sprite).unwrap());

        let d = ctx.driver();
        assert_eq!(
            d.count(|c| *c == Call::DrawElements(glow::TRIANGLES, 6, glow::UNSIGNED_SHORT, 0)),
            2
        );
        assert_eq!(d.count(|c| matches!(c, Call::Viewport(..))), 1);
        assert_eq!(d.count(|c| matches!(c, Call::BindFramebuffer(_))), 1);
        assert_eq!(d.count(|c| matches!(c, Call::BlendFunc(..))), 0);
        assert_eq!(d.count(|c| matches!(c, Call::BindTexture(_))), 0, "still bound from upload");
        assert_eq!(d.count(|c| matches!(c, Call::UniformLocation(..))), 4);
        assert!(d.calls().iter().any(|c| matches!(
            c,
            Call::BufferSubData(t, 0, bytes) if *t == glow::ARRAY_BUFFER && bytes.len() == 96
        )));
        assert!(d.calls().contains(&Call::Uniform2f(
            Some("texture_size".len() as u32),
            256.0,
            128.0
        )));
        assert_eq!(slab.generation(), 1);
    }

    #[test]
    fn degenerate_sprites_draw_nothing() {
        let (mut ctx, mut renderer) = setup();
        let image = new_image_texture(&mut ctx, &RgbaImage::new(8, 8)).unwrap();
        let mut slab = VertexSlab::new();
        let sprite = SpriteDraw {
            image: &image,
            request: QuadRequest::new(8, 8, 4, 4, 4, 8),
            geom: &Affine2::IDENTITY,
            composite: CompositeMode::Lighter,
            color_scale: [1.0; 4],
        };
        ctx.driver().clear_calls();
        let drawn = renderer
            .draw(&mut ctx, &mut slab, &Target::screen(None, 8, 8), &sprite)
            .unwrap();
        assert!(!drawn);
        assert!(ctx.driver().calls().is_empty());
    }

    #[test]
    fn unpaddable_requests_draw_nothing() {
        let (mut ctx, mut renderer) = setup();
        let image = new_image_texture(&mut ctx, &RgbaImage::new(8, 8)).unwrap();
        let mut slab = VertexSlab::new();
        let sprite = SpriteDraw {
            image: &image,
            request: QuadRequest::new(i32::MAX, 16, 0, 0, 8, 8),
            geom: &Affine2::IDENTITY,
            composite: CompositeMode::SourceOver,
            color_scale: [1.0; 4],
        };
        ctx.driver().clear_calls();
        let drawn = renderer
            .draw(&mut ctx, &mut slab, &Target::screen(None, 8, 8), &sprite)
            .unwrap();
        assert!(!drawn);
        assert!(ctx.driver().calls().is_empty());
        assert_eq!(slab.generation(), 0);
    }

    #[test]
    fn delete_releases_everything() {
        let (mut ctx, renderer) = setup();
        let program = renderer.program();
        renderer.delete(&mut ctx);
        let d = ctx.driver();
        assert_eq!(d.count(|c| matches!(c, Call::Delete(Kind::Buffer, _))), 2);
        assert_eq!(d.count(|c| matches!(c, Call::Delete(Kind::VertexArray, _))), 1);
        assert!(d.calls().contains(&Call::Delete(Kind::Program, program)));
        assert_eq!(ctx.program_id(program), None);
    }
}
