use std::sync::{PoisonError, RwLock};

/// One active touch point in window pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Touch {
    pub id: u64,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Default)]
struct Inner {
    touches: Vec<Touch>,
    cursor: (f32, f32),
}

/// Pointer state handed from the event thread to the render thread.
///
/// Writers replace whole snapshots; readers get clones, so no lock is held
/// past a single call.
#[derive(Debug, Default)]
pub struct TouchState {
    inner: RwLock<Inner>,
}

impl TouchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_touches(&self, touches: Vec<Touch>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .touches = touches;
    }

    pub fn touches(&self) -> Vec<Touch> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .touches
            .clone()
    }

    pub fn set_cursor(&self, x: f32, y: f32) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .cursor = (x, y);
    }

    pub fn cursor(&self) -> (f32, f32) {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).cursor
    }

    /// Inserts or moves the touch with `touch.id`.
    pub fn upsert_touch(&self, touch: Touch) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.touches.iter_mut().find(|t| t.id == touch.id) {
            Some(t) => *t = touch,
            None => inner.touches.push(touch),
        }
    }

    pub fn remove_touch(&self, id: u64) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .touches
            .retain(|t| t.id != id);
    }
}
