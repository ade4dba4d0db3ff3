//! Runs the shipped WGSL programs on a real device. Every test returns early
//! when no adapter can be created.

use plasma_fractal::fractal::{render_reference, FractalParameters, GradientImage, PlasmaRenderer};
use plasma_fractal::gpu::backend::ShaderStage;
use plasma_fractal::gpu::capabilities::DeviceQuirks;
use plasma_fractal::gpu::manager::ResourceManager;
use plasma_fractal::gpu::render_context::RenderContext;
use plasma_fractal::gpu::resource::{Resource, ResourceError, ShaderDescriptor, Texture};
use plasma_fractal::gpu::wgpu_backend::WgpuBackend;
use plasma_fractal::normal_table::{NormalTable, NormalTableBuilder, TABLE_SIZE};

fn device_manager() -> Option<ResourceManager<WgpuBackend>> {
    let context = pollster::block_on(RenderContext::new()).ok()?;
    ResourceManager::new(WgpuBackend::new(context), &DeviceQuirks::default()).ok()
}

fn device_table(
    manager: &mut ResourceManager<WgpuBackend>,
) -> (Texture<WgpuBackend>, NormalTable) {
    let built = NormalTableBuilder::default().build(manager).unwrap();
    let image = manager.read_texture(&built.texture).unwrap();
    let table = NormalTable::from_texels(image.width, image.height, &image.data).unwrap();
    (built.texture, table)
}

#[test]
fn device_table_matches_the_host_table() {
    let Some(mut manager) = device_manager() else {
        return;
    };
    let (texture, table) = device_table(&mut manager);
    assert_eq!(table.size(), TABLE_SIZE);

    let host = NormalTable::build_sequential();
    let worst = table
        .values()
        .iter()
        .zip(host.values())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f32, f32::max);
    // Half-float tables round to 11 significant bits.
    assert!(worst < 0.01, "largest difference {worst}");

    manager.destroy([Resource::from(texture)]);
    assert_eq!(manager.live_resources(), 0);
}

#[test]
fn device_render_matches_the_reference() {
    let Some(mut manager) = device_manager() else {
        return;
    };
    let (table_texture, table) = device_table(&mut manager);
    let gradient = GradientImage::white_to_black(256);
    let renderer = PlasmaRenderer::new(&mut manager, &gradient).unwrap();

    let cases = [
        (
            FractalParameters {
                seed: 1,
                ..FractalParameters::default()
            },
            64,
            64,
        ),
        (
            FractalParameters {
                seed: 1,
                depth: 12,
                ..FractalParameters::default()
            },
            97,
            53,
        ),
        (
            FractalParameters {
                seed: 1,
                ..FractalParameters::default()
            },
            40,
            90,
        ),
    ];
    for (params, width, height) in cases {
        let rendered = renderer
            .render(&mut manager, &params, &table_texture, width, height)
            .unwrap();
        let reference = render_reference(&params, &gradient, &table, width, height);
        assert_eq!(rendered, reference, "depth {} at {width}x{height}", params.depth);
    }

    renderer.release(&mut manager);
    manager.destroy([Resource::from(table_texture)]);
    assert_eq!(manager.live_resources(), 0);
}

#[test]
fn device_rejects_invalid_shaders_without_leaking() {
    let Some(mut manager) = device_manager() else {
        return;
    };
    let result = manager.create_shader(&ShaderDescriptor {
        label: "Broken",
        stage: ShaderStage::Fragment,
        source: "@fragment fn fs_main() -> @location(0) vec4<f32> { return missing_value; }",
        file_path: "broken.wgsl",
        host: None,
    });
    match result {
        Err(ResourceError::ShaderCompile { label, log }) => {
            assert_eq!(label, "Broken");
            assert!(log.contains("missing_value"), "{log}");
        }
        other => panic!("expected a compile error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(manager.live_resources(), 0);
}
