// Build script to compile GLSL shaders to SPIR-V

use std::path::Path;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=shaders/");

    // Compile shaders using glslc (part of Vulkan SDK)
    compile_shader("shaders/simple_shader.vert", "shaders/simple_shader.vert.spv");
    compile_shader("shaders/simple_shader.frag", "shaders/simple_shader.frag.spv");
}

fn compile_shader(input: &str, output: &str) {
    let input_path = Path::new(input);
    let output_path = Path::new(output);

    if !input_path.exists() {
        println!("cargo:warning=Shader source {} not found, skipping", input);
        return;
    }

    // Check if glslc is available
    let result = Command::new("glslc")
        .arg(input_path)
        .arg("-o")
        .arg(output_path)
        .status();

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => {
            println!(
                "cargo:warning=Failed to compile {}: exit code {:?}",
                input,
                status.code()
            );
        }
        Err(e) => {
            println!("cargo:warning=glslc not found ({}), shaders were not compiled", e);
            println!("cargo:warning=  glslc {} -o {}", input, output);
        }
    }
}
