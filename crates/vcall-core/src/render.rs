use std::collections::HashMap;

/// Opaque handle of a platform render surface.
///
/// The host maps each id to a real view (TextureView, CALayer, ...) and the
/// engine renders into whatever that id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u64);

/// Keeps one render view per user for the camera stream and one for the
/// screen stream, so tiles rebinding the same user reuse the same surface.
#[derive(Debug, Default)]
pub struct RenderViews {
    camera: HashMap<String, ViewId>,
    screen: HashMap<String, ViewId>,
    next_id: u64,
}

impl RenderViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_view(&mut self, user_id: &str) -> Option<ViewId> {
        Self::get_or_create(&mut self.camera, &mut self.next_id, user_id)
    }

    pub fn screen_render_view(&mut self, user_id: &str) -> Option<ViewId> {
        Self::get_or_create(&mut self.screen, &mut self.next_id, user_id)
    }

    pub fn clear(&mut self) {
        self.camera.clear();
        self.screen.clear();
    }

    fn get_or_create(
        views: &mut HashMap<String, ViewId>,
        next_id: &mut u64,
        user_id: &str,
    ) -> Option<ViewId> {
        if user_id.is_empty() {
            return None;
        }
        let view = views.entry(user_id.to_string()).or_insert_with(|| {
            *next_id += 1;
            ViewId(*next_id)
        });
        Some(*view)
    }
}
