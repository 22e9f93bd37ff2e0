//! Platform naming conventions and generator selection.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX, EXE_SUFFIX};

/// Architecture passed to Visual Studio generators.
pub const DEFAULT_VS_ARCH: &str = "x64";

/// File name of an executable built from `root` on this platform.
pub fn executable_name(root: &str) -> String {
    format!("{}{}", root, EXE_SUFFIX)
}

/// File name of a shared library built from `root` on this platform.
pub fn shared_lib_name(root: &str) -> String {
    format!("{}{}{}", DLL_PREFIX, root, DLL_SUFFIX)
}

/// Recover the library root from a shared library file name.
pub fn shared_lib_root(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(DLL_PREFIX)
        .and_then(|s| s.strip_suffix(DLL_SUFFIX))
        .filter(|s| !s.is_empty())
}

/// Pick the default generator out of `cmake --help` output.
///
/// CMake marks its default generator with a leading `*`, e.g.
/// `* Visual Studio 16 2019 [arch] = Generates Visual Studio 2019 project files.`
/// The `[arch]` placeholder is removed.
pub fn default_generator(help_output: &str) -> Option<String> {
    help_output
        .lines()
        .find(|line| line.starts_with('*'))
        .and_then(|line| {
            let end = line.find('=')?;
            let generator = line[1..end].replace("[arch]", "");
            let generator = generator.trim();
            (!generator.is_empty()).then(|| generator.to_string())
        })
}
