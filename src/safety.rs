//! Safety checks run before anything is written.
//!
//! The playlist and log files are overwritten on every run, so the output
//! path must look like a playlist and must never be one of the input files.

use anyhow::{bail, Result};
use std::path::Path;

use crate::tracks::{extension_of, resolved};

/// Extensions accepted for the playlist output.
pub const PLAYLIST_EXTENSIONS: &[&str] = &["m3u8", "m3u"];

/// Validates that a playlist path is safe to overwrite.
///
/// Checks:
/// - Output must end in `.m3u8` or `.m3u`
/// - Output cannot be the same file as any of the inputs (list, HTML, exceptions)
pub fn validate_output_path(output: &Path, inputs: &[&Path]) -> Result<()> {
    let ext = extension_of(output).unwrap_or_default();
    if !PLAYLIST_EXTENSIONS.contains(&ext.as_str()) {
        bail!(
            "Safety check failed: output file '{}' must have a .m3u8 or .m3u extension",
            output.display()
        );
    }

    let output_resolved = resolved(output);
    for input in inputs {
        if output == *input || output_resolved == resolved(input) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as input '{}'",
                output.display(),
                input.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_playlist_output() {
        let output = PathBuf::from("/tmp/prog.m3u8");
        let list = PathBuf::from("/tmp/prog.txt");
        assert!(validate_output_path(&output, &[&list]).is_ok());
        assert!(validate_output_path(&PathBuf::from("/tmp/prog.M3U"), &[]).is_ok());
    }

    #[test]
    fn test_wrong_extension() {
        let output = PathBuf::from("/tmp/prog.txt");
        let result = validate_output_path(&output, &[]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("must have a .m3u8"));
    }

    #[test]
    fn test_output_equals_input() {
        let path = PathBuf::from("/data/prog.m3u8");
        let result = validate_output_path(&path, &[&path]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as input"));
    }
}
