use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, NagaModuleDescriptor, ShaderLanguage, ShaderType,
};

/// Wraps `naga_oil::compose::Composer` to provide shader composition with `#import` support.
///
/// Pre-loads the shared WGSL modules at construction time. Consuming shaders use
/// `#import fractal::module_name` to pull in shared code. The composer produces
/// validated `naga::Module` IR that every backend consumes directly.
pub struct ShaderComposer {
    composer: Composer,
}

/// Shared module definition: (source, file_path)
struct ModuleDef {
    source: &'static str,
    file_path: &'static str,
}

/// Shared modules in dependency order.
const MODULES: &[ModuleDef] = &[ModuleDef {
    source: include_str!("../../assets/shaders/modules/fullscreen.wgsl"),
    file_path: "modules/fullscreen.wgsl",
}];

/// Vertex stage drawing a full-target quad from a `corner` attribute.
pub const QUAD_VERTEX: &str = include_str!("../../assets/shaders/quad.wgsl");
/// Fragment stage filling the normal lookup table.
pub const NORMAL_TABLE_FRAGMENT: &str = include_str!("../../assets/shaders/normal_table.wgsl");
/// Fragment stage evaluating and shading the plasma fractal.
pub const PLASMA_FRAGMENT: &str = include_str!("../../assets/shaders/plasma.wgsl");

impl ShaderComposer {
    /// Create a composer with the crate's shared modules registered.
    ///
    /// # Errors
    ///
    /// Returns the composer diagnostic if a shared module fails to register.
    pub fn new() -> Result<Self, String> {
        let mut composer = Composer::default();

        for m in MODULES {
            let registered = composer
                .add_composable_module(ComposableModuleDescriptor {
                    source: m.source,
                    file_path: m.file_path,
                    language: ShaderLanguage::Wgsl,
                    ..Default::default()
                })
                .map(|_| ());
            if let Err(e) = registered {
                return Err(format!(
                    "failed to register shader module '{}': {}",
                    m.file_path,
                    e.emit_to_string(&composer)
                ));
            }
        }

        Ok(Self { composer })
    }

    /// Compose a shader source (which may contain `#import` directives) into
    /// validated `naga::Module` IR.
    ///
    /// # Errors
    ///
    /// Returns the full composer/validator diagnostic on failure.
    pub fn compose(&mut self, source: &str, file_path: &str) -> Result<naga::Module, String> {
        self.composer
            .make_naga_module(NagaModuleDescriptor {
                source,
                file_path,
                shader_type: ShaderType::Wgsl,
                ..Default::default()
            })
            .map_err(|e| e.emit_to_string(&self.composer))
    }
}
