//! Platform detection utilities

use log::debug;
use std::path::{Path, PathBuf};

/// Locate an external program
///
/// Names containing a path separator are checked directly; bare names are
/// looked up on PATH. Returns None when nothing executable is found.
pub fn find_program(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    let candidate = Path::new(name);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return if candidate.is_file() {
            Some(candidate.to_path_buf())
        } else {
            debug!("Program not found at {:?}", candidate);
            None
        };
    }

    match which::which(name) {
        Ok(path) => Some(path),
        Err(e) => {
            debug!("{} not found on PATH: {}", name, e);
            None
        }
    }
}

/// Default size of the synthesis worker pool
///
/// Each engine call is its own process, so one worker per CPU.
pub fn default_workers() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_missing_program() {
        assert!(find_program("docvox-no-such-program-xyz").is_none());
        assert!(find_program("").is_none());
        assert!(find_program("/nonexistent/dir/piper").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_find_sh() {
        // /bin/sh exists on every unix we run on
        assert!(find_program("/bin/sh").is_some());
        assert!(find_program("sh").is_some());
    }

    #[test]
    fn test_default_workers() {
        assert!(default_workers() >= 1);
    }
}
