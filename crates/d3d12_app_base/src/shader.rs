//! Loads HLSL source from disk and hands it to the platform shader compiler.

use std::ffi::CStr;
use std::path::Path;
use std::path::PathBuf;

use eyre::bail;
use eyre::WrapErr;
use tracing::debug;

#[cfg(windows)]
use windows::core::s;
#[cfg(windows)]
use windows::core::PCSTR;
#[cfg(windows)]
use windows::Win32::Graphics::Direct3D::Fxc::*;
#[cfg(windows)]
use windows::Win32::Graphics::Direct3D::ID3DBlob;
#[cfg(windows)]
use windows::Win32::Graphics::Direct3D12::D3D12_SHADER_BYTECODE;

pub const SHADER_ENTRY_POINT: &CStr = c"main";

/// Directory searched next to the executable, and inside each sample crate.
pub const SHADER_DIR: &str = "shaders";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    pub fn profile(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_5_0",
            ShaderStage::Pixel => "ps_5_0",
        }
    }

    #[cfg(windows)]
    fn target(self) -> PCSTR {
        match self {
            ShaderStage::Vertex => s!("vs_5_0"),
            ShaderStage::Pixel => s!("ps_5_0"),
        }
    }
}

fn candidate_paths(file_name: &str, exe_dir: Option<&Path>, fallback_dir: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(2);
    if let Some(exe_dir) = exe_dir {
        candidates.push(exe_dir.join(SHADER_DIR).join(file_name));
    }
    candidates.push(fallback_dir.join(SHADER_DIR).join(file_name));
    candidates
}

/// Finds `file_name` under `shaders/` next to the executable, falling back to
/// `fallback_dir/shaders/` (a sample passes its `CARGO_MANIFEST_DIR`).
pub fn find_shader(file_name: &str, fallback_dir: &Path) -> eyre::Result<PathBuf> {
    let exe_path = std::env::current_exe().wrap_err("locating the running executable")?;
    find_shader_from(file_name, exe_path.parent(), fallback_dir)
}

fn find_shader_from(
    file_name: &str,
    exe_dir: Option<&Path>,
    fallback_dir: &Path,
) -> eyre::Result<PathBuf> {
    let candidates = candidate_paths(file_name, exe_dir, fallback_dir);
    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        debug!("Found shader {}", found.display());
        return Ok(found.clone());
    }
    let searched: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
    bail!("shader {file_name} not found, searched: {}", searched.join(", "))
}

pub fn read_shader_source(path: &Path) -> eyre::Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("reading shader {}", path.display()))
}

/// Compiles a shader file with the [`SHADER_ENTRY_POINT`] function for `stage`.
#[cfg(windows)]
pub fn compile_shader(path: &Path, stage: ShaderStage) -> eyre::Result<ID3DBlob> {
    let source = read_shader_source(path)?;

    let flags = if cfg!(debug_assertions) {
        D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION
    } else {
        D3DCOMPILE_OPTIMIZATION_LEVEL3
    };

    let mut shader_blob = None;
    let mut error_blob = None;
    let result = unsafe {
        D3DCompile(
            source.as_ptr() as _,
            source.len(),
            None,
            None,
            None,
            PCSTR(SHADER_ENTRY_POINT.as_ptr().cast()),
            stage.target(),
            flags,
            0,
            &mut shader_blob,
            Some(&mut error_blob),
        )
    };

    if let Err(e) = result {
        let message = error_blob
            .map(|blob| blob_to_string(&blob))
            .unwrap_or_default();
        return Err(e).wrap_err_with(|| {
            format!(
                "compiling {} ({}): {}",
                path.display(),
                stage.profile(),
                message.trim()
            )
        });
    }

    match shader_blob {
        Some(blob) => {
            debug!("Compiled {} as {}", path.display(), stage.profile());
            Ok(blob)
        }
        None => bail!("compiler returned no bytecode for {}", path.display()),
    }
}

/// Finds and compiles a shader in one step.
#[cfg(windows)]
pub fn load_shader(
    file_name: &str,
    fallback_dir: &Path,
    stage: ShaderStage,
) -> eyre::Result<ID3DBlob> {
    let path = find_shader(file_name, fallback_dir)?;
    compile_shader(&path, stage)
}

#[cfg(windows)]
pub fn bytecode(blob: &ID3DBlob) -> D3D12_SHADER_BYTECODE {
    D3D12_SHADER_BYTECODE {
        pShaderBytecode: unsafe { blob.GetBufferPointer() },
        BytecodeLength: unsafe { blob.GetBufferSize() },
    }
}

#[cfg(windows)]
pub(crate) fn blob_to_string(blob: &ID3DBlob) -> String {
    unsafe {
        String::from_utf8_lossy(std::slice::from_raw_parts(
            blob.GetBufferPointer() as *const u8,
            blob.GetBufferSize(),
        ))
        .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "d3d12_app_base_shader_{}_{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(dir.join(SHADER_DIR)).unwrap();
        dir
    }

    #[test]
    fn profiles_match_stage() {
        assert_eq!(ShaderStage::Vertex.profile(), "vs_5_0");
        assert_eq!(ShaderStage::Pixel.profile(), "ps_5_0");
    }

    #[test]
    fn executable_directory_is_searched_first() {
        let exe_dir = scratch_dir("exe");
        let crate_dir = scratch_dir("crate");
        std::fs::write(exe_dir.join(SHADER_DIR).join("A.hlsl"), "// exe").unwrap();
        std::fs::write(crate_dir.join(SHADER_DIR).join("A.hlsl"), "// crate").unwrap();

        let found = find_shader_from("A.hlsl", Some(&exe_dir), &crate_dir).unwrap();
        assert_eq!(found, exe_dir.join(SHADER_DIR).join("A.hlsl"));
        assert_eq!(read_shader_source(&found).unwrap(), "// exe");

        std::fs::remove_dir_all(exe_dir).unwrap();
        std::fs::remove_dir_all(crate_dir).unwrap();
    }

    #[test]
    fn crate_directory_is_the_fallback() {
        let exe_dir = scratch_dir("exe_empty");
        let crate_dir = scratch_dir("crate_fallback");
        std::fs::write(crate_dir.join(SHADER_DIR).join("B.hlsl"), "// crate").unwrap();

        let found = find_shader_from("B.hlsl", Some(&exe_dir), &crate_dir).unwrap();
        assert_eq!(found, crate_dir.join(SHADER_DIR).join("B.hlsl"));

        std::fs::remove_dir_all(exe_dir).unwrap();
        std::fs::remove_dir_all(crate_dir).unwrap();
    }

    #[test]
    fn missing_shader_names_every_searched_path() {
        let crate_dir = scratch_dir("crate_missing");
        let error = find_shader_from("Missing.hlsl", None, &crate_dir).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("Missing.hlsl"));
        assert!(message.contains(&crate_dir.join(SHADER_DIR).display().to_string()));
        std::fs::remove_dir_all(crate_dir).unwrap();
    }

    #[test]
    fn sample_shaders_ship_with_the_samples() {
        let workspace = Path::new(env!("CARGO_MANIFEST_DIR")).join("..");
        for sample in ["hello_triangle", "textured_cube"] {
            for file in ["VertexShader.hlsl", "PixelShader.hlsl"] {
                let found = find_shader_from(file, None, &workspace.join(sample)).unwrap();
                let entry_point = SHADER_ENTRY_POINT.to_str().unwrap();
                let source = read_shader_source(&found).unwrap();
                assert!(source.contains(&format!(" {entry_point}(")), "{file} has no {entry_point}");
            }
        }
    }
}
