fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=shaders/triangle.vert");
    println!("cargo:rerun-if-changed=shaders/triangle.frag");

    // Without the feature the renderer falls back to precompiled vert.spv/frag.spv
    // in ./shaders relative to the working directory.
    #[cfg(feature = "compile-shaders")]
    compile_shaders();
}

#[cfg(feature = "compile-shaders")]
fn compile_shaders() {
    use std::{env, fs, path::PathBuf};

    let out = PathBuf::from(env::var("OUT_DIR").unwrap());
    let src_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap()).join("shaders");

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    for (src, kind, spv) in [
        ("triangle.vert", shaderc::ShaderKind::Vertex, "vert.spv"),
        ("triangle.frag", shaderc::ShaderKind::Fragment, "frag.spv"),
    ] {
        let text = fs::read_to_string(src_dir.join(src)).unwrap();
        let artifact = comp
            .compile_into_spirv(&text, kind, src, "main", Some(&opts))
            .unwrap();
        fs::write(out.join(spv), artifact.as_binary_u8()).unwrap();
    }

    println!("cargo:rustc-env=TRINE_SHADER_DIR={}", out.display());
}
