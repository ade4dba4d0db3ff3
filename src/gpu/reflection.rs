//! Name→location reflection over naga IR.
//!
//! Shaders are reflected once when compiled; programs merge the interfaces of
//! their two stages at link time and keep the result as their cached
//! attribute/uniform/texture lookup tables.

use naga::{
    Binding, Handle, ImageClass, ImageDimension, Module, Scalar, ScalarKind, Type,
    TypeInner, VectorSize,
};
use rustc_hash::FxHashMap;

use super::backend::ShaderStage;

/// Scalar/vector types a uniform member may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    /// `f32`
    F32,
    /// `i32`
    I32,
    /// `u32`
    U32,
    /// `vec2<f32>`
    Vec2F32,
}

impl UniformType {
    fn of(module: &Module, ty: Handle<Type>) -> Option<Self> {
        match module.types[ty].inner {
            TypeInner::Scalar(Scalar { kind, width: 4 }) => match kind {
                ScalarKind::Float => Some(Self::F32),
                ScalarKind::Sint => Some(Self::I32),
                ScalarKind::Uint => Some(Self::U32),
                _ => None,
            },
            TypeInner::Vector {
                size: VectorSize::Bi,
                scalar:
                    Scalar {
                        kind: ScalarKind::Float,
                        width: 4,
                    },
            } => Some(Self::Vec2F32),
            _ => None,
        }
    }
}

/// A settable member of the uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformMember {
    /// Byte offset inside the block.
    pub offset: u32,
    /// Member type.
    pub ty: UniformType,
}

/// The single uniform buffer a program may declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    /// Binding slot in group 0.
    pub binding: u32,
    /// Block size in bytes.
    pub size: u32,
    members: FxHashMap<String, UniformMember>,
}

impl UniformBlock {
    /// Look up a member by name.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<UniformMember> {
        self.members.get(name).copied()
    }

    fn merge(&mut self, other: &Self) -> Result<(), String> {
        if self.binding != other.binding || self.size != other.size {
            return Err(format!(
                "uniform block declared differently by the two stages \
                 (binding {} / {} bytes vs binding {} / {} bytes)",
                self.binding, self.size, other.binding, other.size
            ));
        }
        for (name, member) in &other.members {
            let _ = self.members.entry(name.clone()).or_insert(*member);
        }
        Ok(())
    }
}

/// A vertex attribute consumed by the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// `@location` index.
    pub location: u32,
    /// Number of `f32` components (1..=4).
    pub components: u32,
}

/// Reflected interface of a single shader module.
#[derive(Debug, Clone)]
pub struct ShaderInterface {
    /// Stage this module provides.
    pub stage: ShaderStage,
    /// Name of the module's entry point for that stage.
    pub entry_point: String,
    attributes: Vec<(String, VertexAttribute)>,
    uniforms: Option<UniformBlock>,
    textures: Vec<(String, u32)>,
}

impl ShaderInterface {
    /// Reflect `module`, which must contain exactly one entry point for
    /// `stage`.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic if the module uses bindings outside group 0,
    /// samplers, more than one uniform block, or an unsupported attribute.
    pub fn reflect(module: &Module, stage: ShaderStage) -> Result<Self, String> {
        let naga_stage = match stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        };
        let mut entries = module.entry_points.iter().filter(|ep| ep.stage == naga_stage);
        let entry = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            (None, _) => return Err(format!("no {stage:?} entry point in module")),
            (Some(_), Some(_)) => {
                return Err(format!("more than one {stage:?} entry point in module"))
            }
        };

        let mut attributes = Vec::new();
        if stage == ShaderStage::Vertex {
            for arg in &entry.function.arguments {
                collect_attribute(module, arg.name.as_deref(), arg.ty, arg.binding.as_ref(), &mut attributes)?;
            }
        }

        let mut uniforms = None;
        let mut textures = Vec::new();
        for (_, var) in module.global_variables.iter() {
            let Some(binding) = &var.binding else {
                continue;
            };
            let name = var.name.clone().unwrap_or_default();
            if binding.group != 0 {
                return Err(format!(
                    "'{name}' is bound in group {}; only group 0 is supported",
                    binding.group
                ));
            }
            match (&var.space, &module.types[var.ty].inner) {
                (naga::AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                    if uniforms.is_some() {
                        return Err("at most one uniform block may be declared".to_owned());
                    }
                    let members = members
                        .iter()
                        .filter_map(|m| {
                            let ty = UniformType::of(module, m.ty)?;
                            Some((m.name.clone()?, UniformMember { offset: m.offset, ty }))
                        })
                        .collect();
                    uniforms = Some(UniformBlock {
                        binding: binding.binding,
                        size: *span,
                        members,
                    });
                }
                (
                    naga::AddressSpace::Handle,
                    TypeInner::Image {
                        dim: ImageDimension::D2,
                        arrayed: false,
                        class:
                            ImageClass::Sampled {
                                kind: ScalarKind::Float,
                                multi: false,
                            },
                    },
                ) => textures.push((name, binding.binding)),
                (naga::AddressSpace::Handle, TypeInner::Sampler { .. }) => {
                    return Err(format!(
                        "sampler '{name}' is not supported; read textures with textureLoad"
                    ));
                }
                _ => return Err(format!("unsupported resource binding '{name}'")),
            }
        }

        Ok(Self {
            stage,
            entry_point: entry.name.clone(),
            attributes,
            uniforms,
            textures,
        })
    }
}

fn collect_attribute(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<(String, VertexAttribute)>,
) -> Result<(), String> {
    match (binding, &module.types[ty].inner) {
        (Some(Binding::BuiltIn(_)), _) => Ok(()),
        (Some(Binding::Location { location, .. }), inner) => {
            let components = match inner {
                TypeInner::Scalar(Scalar {
                    kind: ScalarKind::Float,
                    width: 4,
                }) => 1,
                TypeInner::Vector {
                    size,
                    scalar:
                        Scalar {
                            kind: ScalarKind::Float,
                            width: 4,
                        },
                } => match size {
                    VectorSize::Bi => 2,
                    VectorSize::Tri => 3,
                    VectorSize::Quad => 4,
                },
                _ => {
                    return Err(format!(
                        "vertex attribute at location {location} must be f32 or vecN<f32>"
                    ))
                }
            };
            out.push((
                name.unwrap_or_default().to_owned(),
                VertexAttribute {
                    location: *location,
                    components,
                },
            ));
            Ok(())
        }
        (None, TypeInner::Struct { members, .. }) => {
            for member in members {
                collect_attribute(module, member.name.as_deref(), member.ty, member.binding.as_ref(), out)?;
            }
            Ok(())
        }
        (None, _) => Err("vertex input without a binding".to_owned()),
    }
}

/// Merged interface of a linked program, cached on the program resource.
#[derive(Debug, Clone)]
pub struct ProgramInterface {
    /// Vertex entry point name.
    pub vertex_entry: String,
    /// Fragment entry point name.
    pub fragment_entry: String,
    attributes: FxHashMap<String, VertexAttribute>,
    uniforms: Option<UniformBlock>,
    textures: FxHashMap<String, u32>,
}

impl ProgramInterface {
    /// Merge the interfaces of a vertex and a fragment stage.
    ///
    /// # Errors
    ///
    /// Returns a link diagnostic if the stages are swapped or declare
    /// conflicting bindings.
    pub fn link(vertex: &ShaderInterface, fragment: &ShaderInterface) -> Result<Self, String> {
        if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
            return Err("program needs one vertex and one fragment shader".to_owned());
        }

        let uniforms = match (&vertex.uniforms, &fragment.uniforms) {
            (Some(v), Some(f)) => {
                let mut merged = v.clone();
                merged.merge(f)?;
                Some(merged)
            }
            (v, f) => v.clone().or_else(|| f.clone()),
        };

        let mut textures = FxHashMap::default();
        for (name, binding) in vertex.textures.iter().chain(&fragment.textures) {
            if let Some(previous) = textures.insert(name.clone(), *binding) {
                if previous != *binding {
                    return Err(format!(
                        "texture '{name}' bound at {previous} and {binding}"
                    ));
                }
            }
        }
        if let Some(block) = &uniforms {
            if textures.values().any(|b| *b == block.binding) {
                return Err(format!(
                    "binding {} used by both a texture and the uniform block",
                    block.binding
                ));
            }
        }

        Ok(Self {
            vertex_entry: vertex.entry_point.clone(),
            fragment_entry: fragment.entry_point.clone(),
            attributes: vertex.attributes.iter().cloned().collect(),
            uniforms,
            textures,
        })
    }

    /// Location of a vertex attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<VertexAttribute> {
        self.attributes.get(name).copied()
    }

    /// All vertex attributes, ordered by location.
    #[must_use]
    pub fn attributes(&self) -> Vec<(&str, VertexAttribute)> {
        let mut list: Vec<_> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.as_str(), *attr))
            .collect();
        list.sort_by_key(|(_, attr)| attr.location);
        list
    }

    /// The uniform block, if the program declares one.
    #[must_use]
    pub fn uniform_block(&self) -> Option<&UniformBlock> {
        self.uniforms.as_ref()
    }

    /// A uniform member by name.
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformMember> {
        self.uniforms.as_ref().and_then(|block| block.member(name))
    }

    /// Binding slot of a texture by name.
    #[must_use]
    pub fn texture_binding(&self, name: &str) -> Option<u32> {
        self.textures.get(name).copied()
    }

    /// All textures, ordered by binding.
    #[must_use]
    pub fn textures(&self) -> Vec<(&str, u32)> {
        let mut list: Vec<_> = self
            .textures
            .iter()
            .map(|(name, binding)| (name.as_str(), *binding))
            .collect();
        list.sort_by_key(|(_, binding)| *binding);
        list
    }

    /// Read an `f32` uniform from a packed block.
    #[must_use]
    pub fn read_f32(&self, block: &[u8], name: &str) -> Option<f32> {
        self.read_word(block, name, UniformType::F32).map(f32::from_bits)
    }

    /// Read an `i32` uniform from a packed block.
    #[must_use]
    pub fn read_i32(&self, block: &[u8], name: &str) -> Option<i32> {
        self.read_word(block, name, UniformType::I32)
            .map(|bits| bits as i32)
    }

    /// Read a `u32` uniform from a packed block.
    #[must_use]
    pub fn read_u32(&self, block: &[u8], name: &str) -> Option<u32> {
        self.read_word(block, name, UniformType::U32)
    }

    /// Read a `vec2<f32>` uniform from a packed block.
    #[must_use]
    pub fn read_vec2(&self, block: &[u8], name: &str) -> Option<[f32; 2]> {
        let member = self.uniform(name).filter(|m| m.ty == UniformType::Vec2F32)?;
        let x = word_at(block, member.offset)?;
        let y = word_at(block, member.offset + 4)?;
        Some([f32::from_bits(x), f32::from_bits(y)])
    }

    fn read_word(&self, block: &[u8], name: &str, ty: UniformType) -> Option<u32> {
        let member = self.uniform(name).filter(|m| m.ty == ty)?;
        word_at(block, member.offset)
    }
}

fn word_at(block: &[u8], offset: u32) -> Option<u32> {
    let start = offset as usize;
    let bytes = block.get(start..start + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"
        struct Out { @builtin(position) position: vec4<f32>, @location(0) uv: vec2<f32> }
        @vertex
        fn vs_main(@location(0) corner: vec2<f32>, @location(1) weight: f32) -> Out {
            return Out(vec4<f32>(corner * weight, 0.0, 1.0), corner);
        }
    ";

    const FRAGMENT: &str = r"
        struct Params { scale: f32, seed: i32, size: vec2<f32> }
        @group(0) @binding(0) var<uniform> params: Params;
        @group(0) @binding(1) var ramp: texture_2d<f32>;
        @fragment
        fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
            let t = textureLoad(ramp, vec2<i32>(0, 0), 0);
            return t * params.scale + vec4<f32>(f32(params.seed), params.size, 0.0);
        }
    ";

    fn parse(source: &str) -> Module {
        naga::front::wgsl::parse_str(source).unwrap()
    }

    #[test]
    fn reflects_attributes_uniforms_and_textures() {
        let vs = ShaderInterface::reflect(&parse(VERTEX), ShaderStage::Vertex).unwrap();
        let fs = ShaderInterface::reflect(&parse(FRAGMENT), ShaderStage::Fragment).unwrap();
        let program = ProgramInterface::link(&vs, &fs).unwrap();

        assert_eq!(program.vertex_entry, "vs_main");
        assert_eq!(program.fragment_entry, "fs_main");
        assert_eq!(
            program.attribute("corner"),
            Some(VertexAttribute { location: 0, components: 2 })
        );
        assert_eq!(program.attributes()[1].0, "weight");
        assert_eq!(
            program.uniform("seed"),
            Some(UniformMember { offset: 4, ty: UniformType::I32 })
        );
        assert_eq!(program.uniform("size").map(|m| m.offset), Some(8));
        assert_eq!(program.uniform_block().map(|b| b.size), Some(16));
        assert_eq!(program.texture_binding("ramp"), Some(1));
        assert_eq!(program.texture_binding("missing"), None);
    }

    #[test]
    fn reads_packed_uniform_values() {
        let vs = ShaderInterface::reflect(&parse(VERTEX), ShaderStage::Vertex).unwrap();
        let fs = ShaderInterface::reflect(&parse(FRAGMENT), ShaderStage::Fragment).unwrap();
        let program = ProgramInterface::link(&vs, &fs).unwrap();

        let mut block = vec![0u8; 16];
        block[0..4].copy_from_slice(&2.5f32.to_le_bytes());
        block[4..8].copy_from_slice(&(-7i32).to_le_bytes());
        block[8..12].copy_from_slice(&3.0f32.to_le_bytes());
        block[12..16].copy_from_slice(&4.0f32.to_le_bytes());

        assert_eq!(program.read_f32(&block, "scale"), Some(2.5));
        assert_eq!(program.read_i32(&block, "seed"), Some(-7));
        assert_eq!(program.read_vec2(&block, "size"), Some([3.0, 4.0]));
        // Wrong type is not reinterpreted.
        assert_eq!(program.read_u32(&block, "seed"), None);
    }

    #[test]
    fn swapped_stages_fail_to_link() {
        let vs = ShaderInterface::reflect(&parse(VERTEX), ShaderStage::Vertex).unwrap();
        let fs = ShaderInterface::reflect(&parse(FRAGMENT), ShaderStage::Fragment).unwrap();
        assert!(ProgramInterface::link(&fs, &vs).is_err());
    }

    #[test]
    fn samplers_are_rejected() {
        let source = r"
            @group(0) @binding(0) var tex: texture_2d<f32>;
            @group(0) @binding(1) var samp: sampler;
            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return textureSample(tex, samp, vec2<f32>(0.5));
            }
        ";
        let err = ShaderInterface::reflect(&parse(source), ShaderStage::Fragment).unwrap_err();
        assert!(err.contains("samp"));
    }
}
