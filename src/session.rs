//! A long-lived rendering session: one manager, one normal table, the
//! current parameters and gradient, and redraw coalescing.
//!
//! Every change (attribute, gradient, surface size) only marks the session
//! dirty. [`PlasmaSession::frame`] is called once per display refresh and
//! renders at most once, however many changes arrived since the last call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::PlasmaError;
use crate::fractal::{FractalParameters, GradientImage, PlasmaRenderer, RgbaImage};
use crate::gpu::backend::Backend;
use crate::gpu::draw::RenderError;
use crate::gpu::manager::{ResourceManager, SurfaceSize};
use crate::gpu::resource::{Resource, ResourceError, Texture};
use crate::normal_table::{NormalTableBuilder, TablePath};
use crate::options::PlasmaOptions;

/// Owns every resource needed to produce frames.
pub struct PlasmaSession<B: Backend> {
    manager: ResourceManager<B>,
    table: Texture<B>,
    table_path: TablePath,
    renderer: PlasmaRenderer<B>,
    params: FractalParameters,
    dirty: Arc<AtomicBool>,
    last_frame: Option<RgbaImage>,
    frames_rendered: u64,
}

impl<B: Backend> PlasmaSession<B> {
    /// Detect capabilities, build the normal table once, compile the plasma
    /// program and size the surface from `options`.
    ///
    /// # Errors
    ///
    /// Returns the first setup failure. Resources created before it are
    /// released.
    pub fn new(
        backend: B,
        options: &PlasmaOptions,
        gradient: &GradientImage,
    ) -> Result<Self, PlasmaError> {
        let mut manager = ResourceManager::new(backend, &options.quirks)?;
        let built = NormalTableBuilder::new(options.table.parallel).build(&mut manager)?;
        let renderer = match PlasmaRenderer::new(&mut manager, gradient) {
            Ok(renderer) => renderer,
            Err(e) => {
                manager.destroy([Resource::from(built.texture)]);
                return Err(e.into());
            }
        };

        let dirty = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&dirty);
        manager.set_resize_handler(move |_| flag.store(true, Ordering::Release));
        manager.resize(options.output.width, options.output.height);

        Ok(Self {
            manager,
            table: built.texture,
            table_path: built.path,
            renderer,
            params: options.fractal.to_parameters(),
            dirty,
            last_frame: None,
            frames_rendered: 0,
        })
    }

    /// The resource manager, for callers that render alongside the session.
    pub fn manager(&mut self) -> &mut ResourceManager<B> {
        &mut self.manager
    }

    /// How the normal table was built.
    #[must_use]
    pub fn table_path(&self) -> TablePath {
        self.table_path
    }

    /// Current fractal parameters.
    #[must_use]
    pub fn parameters(&self) -> &FractalParameters {
        &self.params
    }

    /// Replace all fractal parameters. Non-finite values fall back to
    /// their defaults.
    pub fn set_parameters(&mut self, params: FractalParameters) {
        let params = params.sanitized();
        if params != self.params {
            self.params = params;
            self.request_redraw();
        }
    }

    /// Apply a textual attribute (see
    /// [`FractalParameters::apply_attribute`]). Returns whether the name is
    /// known; known names always schedule a redraw.
    pub fn apply_configuration(&mut self, name: &str, value: &str) -> bool {
        let known = self.params.apply_attribute(name, value);
        if known {
            self.request_redraw();
        }
        known
    }

    /// Swap the gradient.
    ///
    /// # Errors
    ///
    /// Returns the upload error; the previous gradient stays in use.
    pub fn set_gradient(&mut self, gradient: &GradientImage) -> Result<(), ResourceError> {
        self.renderer.set_gradient(&mut self.manager, gradient)?;
        self.request_redraw();
        Ok(())
    }

    /// Resize the output surface.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.manager.resize(width, height);
    }

    /// Mark the next [`frame`](Self::frame) as needing a render.
    pub fn request_redraw(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Render if anything changed since the last frame.
    ///
    /// Returns the new raster, or `None` if nothing was pending.
    ///
    /// # Errors
    ///
    /// Returns the [`RenderError`] of the render.
    pub fn frame(&mut self) -> Result<Option<&RgbaImage>, RenderError> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(None);
        }
        let SurfaceSize { width, height } = self.manager.surface_size();
        let image = self
            .renderer
            .render(&mut self.manager, &self.params, &self.table, width, height)?;
        self.frames_rendered += 1;
        log::debug!("Rendered frame {} ({width}x{height})", self.frames_rendered);
        Ok(Some(self.last_frame.insert(image)))
    }

    /// Most recent raster, if any frame was rendered.
    #[must_use]
    pub fn last_frame(&self) -> Option<&RgbaImage> {
        self.last_frame.as_ref()
    }

    /// Number of renders performed.
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Release every resource and return the manager.
    pub fn close(self) -> ResourceManager<B> {
        let Self {
            mut manager,
            table,
            renderer,
            ..
        } = self;
        renderer.release(&mut manager);
        manager.destroy([Resource::from(table)]);
        let _ = manager.clear_resize_handler();
        manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::software::SoftwareBackend;
    use crate::options::{FractalOptions, OutputOptions};

    fn session() -> PlasmaSession<SoftwareBackend> {
        let options = PlasmaOptions {
            fractal: FractalOptions {
                seed: Some(3),
                ..FractalOptions::default()
            },
            output: OutputOptions {
                width: 16,
                height: 8,
            },
            ..PlasmaOptions::default()
        };
        PlasmaSession::new(
            SoftwareBackend::new(),
            &options,
            &GradientImage::white_to_black(32),
        )
        .unwrap()
    }

    #[test]
    fn redraw_requests_coalesce() {
        let mut session = session();
        assert!(session.frame().unwrap().is_some());
        assert!(session.frame().unwrap().is_none());

        session.request_redraw();
        assert!(session.apply_configuration("seed", "11"));
        assert!(session.apply_configuration("attenuation", "0.3"));
        session.resize(20, 10);
        let frame = session.frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (20, 10));
        assert!(session.frame().unwrap().is_none());
        assert_eq!(session.frames_rendered(), 2);
        assert_eq!(session.parameters().seed, 11);

        let manager = session.close();
        assert_eq!(manager.live_resources(), 0);
    }

    #[test]
    fn unknown_attributes_do_not_redraw() {
        let mut session = session();
        let _ = session.frame().unwrap();
        assert!(!session.apply_configuration("palette", "x"));
        assert!(session.frame().unwrap().is_none());
        let manager = session.close();
        assert_eq!(manager.live_resources(), 0);
    }

    #[test]
    fn unchanged_parameters_do_not_redraw() {
        let mut session = session();
        let _ = session.frame().unwrap();
        let params = *session.parameters();
        session.set_parameters(params);
        assert!(session.frame().unwrap().is_none());
        assert_eq!(session.last_frame().map(RgbaImage::width), Some(16));
        let manager = session.close();
        assert_eq!(manager.live_resources(), 0);
    }
}
