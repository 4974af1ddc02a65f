use rustc_hash::FxHashMap;

/// Process-unique identity of a linked program.
///
/// Drivers recycle raw program names after deletion, so anything keyed on a
/// program outlives the raw handle by using this instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub(crate) u64);

/// Memoized uniform/attribute lookups per (program, name).
///
/// Misses are stored too (`None`), so a name the shader optimized away is
/// queried once and then served from here.
pub struct LocationCache<U> {
    uniforms: FxHashMap<ProgramId, FxHashMap<String, Option<U>>>,
    attribs: FxHashMap<ProgramId, FxHashMap<String, Option<u32>>>,
}

impl<U: Clone> LocationCache<U> {
    pub fn new() -> Self {
        Self {
            uniforms: FxHashMap::default(),
            attribs: FxHashMap::default(),
        }
    }

    pub fn uniform(
        &mut self,
        program: ProgramId,
        name: &str,
        query: impl FnOnce() -> Option<U>,
    ) -> Option<U> {
        lookup(self.uniforms.entry(program).or_default(), name, query)
    }

    pub fn attrib(
        &mut self,
        program: ProgramId,
        name: &str,
        query: impl FnOnce() -> Option<u32>,
    ) -> Option<u32> {
        lookup(self.attribs.entry(program).or_default(), name, query)
    }

    /// Drops every entry recorded for `program`.
    pub fn forget(&mut self, program: ProgramId) {
        self.uniforms.remove(&program);
        self.attribs.remove(&program);
    }

    pub fn clear(&mut self) {
        self.uniforms.clear();
        self.attribs.clear();
    }

    pub fn len(&self) -> usize {
        self.uniforms.values().map(FxHashMap::len).sum::<usize>()
            + self.attribs.values().map(FxHashMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<U: Clone> Default for LocationCache<U> {
    fn default() -> Self {
        Self::new()
    }
}

#[inline(always)]
fn lookup<T: Clone>(
    names: &mut FxHashMap<String, Option<T>>,
    name: &str,
    query: impl FnOnce() -> Option<T>,
) -> Option<T> {
    if let Some(hit) = names.get(name) {
        return hit.clone();
    }
    let found = query();
    names.insert(name.to_owned(), found.clone());
    found
}
