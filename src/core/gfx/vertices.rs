use crate::core::space::padded_size;
use glam::{Affine2, Mat3, Vec2};
use log::debug;

/// Quads per slab.
pub const QUAD_CAPACITY: usize = 256;
/// x, y, u, v, opposite u, opposite v.
pub const VERTEX_FLOATS: usize = 6;
pub const VERTEX_SIZE_IN_BYTES: usize = VERTEX_FLOATS * std::mem::size_of::<f32>();
pub const QUAD_FLOATS: usize = 4 * VERTEX_FLOATS;

/// A 2D affine map applied to quad corners.
pub trait GeoM {
    fn apply(&self, x: f32, y: f32) -> (f32, f32);
}

impl GeoM for Affine2 {
    #[inline(always)]
    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        self.transform_point2(Vec2::new(x, y)).into()
    }
}

impl GeoM for Mat3 {
    #[inline(always)]
    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        self.transform_point2(Vec2::new(x, y)).into()
    }
}

/// Scratch storage for quad vertices, handed out one quad at a time.
///
/// Slots come from a single backing slab in order; once the slab has no
/// room for another quad the next request starts a fresh slab. A slot is
/// borrowed from the allocator, so it cannot be held across the next
/// allocation. Single-threaded by construction (`&mut self`).
#[derive(Default)]
pub struct VertexSlab {
    backing: Option<Box<[f32]>>,
    head: usize,
    generation: u64,
}

impl VertexSlab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next [`QUAD_FLOATS`]-sized window. Contents are stale;
    /// the caller writes every float.
    pub fn allocate_quad_slot(&mut self) -> &mut [f32] {
        if self
            .backing
            .as_ref()
            .is_some_and(|b| self.head + QUAD_FLOATS > b.len())
        {
            self.backing = None;
        }
        if self.backing.is_none() {
            self.head = 0;
            self.generation += 1;
            debug!("Allocating vertex slab #{}.", self.generation);
        }
        let start = self.head;
        self.head += QUAD_FLOATS;
        let backing = self
            .backing
            .get_or_insert_with(|| vec![0.0; QUAD_FLOATS * QUAD_CAPACITY].into_boxed_slice());
        &mut backing[start..start + QUAD_FLOATS]
    }

    /// Offset, in floats, of the next slot within the current slab.
    #[inline(always)]
    pub fn head(&self) -> usize {
        self.head
    }

    /// Number of slabs allocated so far.
    #[inline(always)]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One sprite draw: the logical size of the whole source image and the
/// sub-rectangle (in unpadded texels) to show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuadRequest {
    pub width: i32,
    pub height: i32,
    pub sx0: i32,
    pub sy0: i32,
    pub sx1: i32,
    pub sy1: i32,
}

impl QuadRequest {
    pub const fn new(width: i32, height: i32, sx0: i32, sy0: i32, sx1: i32, sy1: i32) -> Self {
        Self {
            width,
            height,
            sx0,
            sy0,
            sx1,
            sy1,
        }
    }

    /// Whole-image request.
    pub const fn full(width: i32, height: i32) -> Self {
        Self::new(width, height, 0, 0, width, height)
    }

    pub const fn is_degenerate(&self) -> bool {
        self.sx0 >= self.sx1 || self.sy0 >= self.sy1 || self.sx1 <= 0 || self.sy1 <= 0
    }
}

/// Writes the four vertices of `req` into a fresh slot of `slab`.
///
/// Vertex order is top-left, top-right, bottom-left, bottom-right. Each
/// vertex carries its position after `geom`, its own texture coordinate,
/// and the texture coordinate of the diagonally opposite corner so the
/// fragment shader can recover the source rectangle. Degenerate requests,
/// and images too large to pad, yield `None` and consume no slot.
pub fn quad_vertices<'a, G: GeoM + ?Sized>(
    slab: &'a mut VertexSlab,
    req: &QuadRequest,
    geom: &G,
) -> Option<&'a [f32]> {
    if req.is_degenerate() {
        return None;
    }
    let (w, h) = padded_size(req.width, req.height)?;
    let (wf, hf) = (w as f32, h as f32);
    let u0 = req.sx0 as f32 / wf;
    let v0 = req.sy0 as f32 / hf;
    let u1 = req.sx1 as f32 / wf;
    let v1 = req.sy1 as f32 / hf;
    let x1 = (req.sx1 - req.sx0) as f32;
    let y1 = (req.sy1 - req.sy0) as f32;

    // (local x, local y, u, v); the opposite corner is index 3 - i.
    let corners = [
        (0.0, 0.0, u0, v0),
        (x1, 0.0, u1, v0),
        (0.0, y1, u0, v1),
        (x1, y1, u1, v1),
    ];

    let vs = slab.allocate_quad_slot();
    for (i, (out, &(x, y, u, v))) in vs
        .chunks_exact_mut(VERTEX_FLOATS)
        .zip(corners.iter())
        .enumerate()
    {
        let (px, py) = geom.apply(x, y);
        let (_, _, ou, ov) = corners[3 - i];
        out.copy_from_slice(&[px, py, u, v, ou, ov]);
    }
    Some(&*vs)
}
