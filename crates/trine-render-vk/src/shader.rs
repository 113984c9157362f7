// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::Cursor;
use std::path::Path;

use ash::util::read_spv;
use ash::vk;

use crate::error::SetupError;

/// Reads a SPIR-V blob from disk as 32-bit words. A missing file, or one whose
/// length is not a multiple of four, is reported with its path.
pub fn load_spirv(path: &Path) -> Result<Vec<u32>, SetupError> {
    let wrap = |source| SetupError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };
    let bytes = fs::read(path).map_err(wrap)?;
    read_spv(&mut Cursor::new(&bytes[..])).map_err(wrap)
}

/// Caller destroys the module once the pipeline that uses it exists.
pub(crate) unsafe fn create_module(
    device: &ash::Device,
    code: &[u32],
) -> Result<vk::ShaderModule, vk::Result> {
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: code.as_ptr(),
        code_size: std::mem::size_of_val(code),
        ..Default::default()
    };
    device.create_shader_module(&ci, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("trine-shader-{}-{name}", std::process::id()))
    }

    #[test]
    fn missing_file_reports_path() {
        let path = scratch("does-not-exist.spv");
        let err = load_spirv(&path).unwrap_err();
        match &err {
            SetupError::ShaderLoad { path: p, .. } => assert_eq!(p, &path),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("does-not-exist.spv"));
    }

    #[test]
    fn reads_words() {
        let path = scratch("words.spv");
        let words = [SPIRV_MAGIC, 0x0001_0000, 7];
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        fs::write(&path, &bytes).unwrap();

        let code = load_spirv(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(code, words);
    }

    #[test]
    fn rejects_truncated_blob() {
        let path = scratch("short.spv");
        fs::write(&path, [0x03, 0x02, 0x23, 0x07, 0x00]).unwrap();

        let res = load_spirv(&path);
        fs::remove_file(&path).ok();

        assert!(matches!(res, Err(SetupError::ShaderLoad { .. })));
    }
}
