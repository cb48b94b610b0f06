use nix::sys::statvfs::statvfs;
use std::path::Path;

const MIB: u64 = 1024 * 1024;

/// Megabytes available on the filesystem containing `path`, or `-1` if it cannot be queried.
pub fn free_space_mb(path: &Path) -> i64 {
    match statvfs(path) {
        Ok(stat) => {
            let bytes = stat.block_size() as u64 * stat.blocks_available() as u64;
            (bytes / MIB) as i64
        }
        Err(why) => {
            error!("failed to query free space of {}: {}", path.display(), why);
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(free_space_mb(dir.path()) >= 0);
    }

    #[test]
    fn missing_directory_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(free_space_mb(&dir.path().join("does/not/exist")), -1);
    }
}
