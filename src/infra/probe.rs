use std::path::{Path, PathBuf};
use sysinfo::{Disks, System};
use tracing::error;

/// 实时资源探测，执行器只通过这个接口获取内存和磁盘余量
pub trait ResourceProbe {
    fn available_memory_bytes(&self) -> u64;

    /// 无法确定目录所在磁盘时返回 None
    fn free_disk_space_bytes(&self, dir: &Path) -> Option<u64>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ResourceProbe for SystemProbe {
    fn available_memory_bytes(&self) -> u64 {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.available_memory()
    }

    fn free_disk_space_bytes(&self, dir: &Path) -> Option<u64> {
        let target = nearest_existing(dir);
        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<(PathBuf, u64)> = disks
            .list()
            .iter()
            .map(|d| (d.mount_point().to_path_buf(), d.available_space()))
            .collect();

        let free = pick_mount(&mounts, &target);
        if free.is_none() {
            error!("无法确定目录 {:?} 所在磁盘 (共 {} 个挂载点)", target, mounts.len());
        }
        free
    }
}

/// 输出目录可能还不存在，向上找到第一个已存在的祖先再规范化
fn nearest_existing(dir: &Path) -> PathBuf {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir().map(|cwd| cwd.join(dir)).unwrap_or_else(|_| dir.to_path_buf())
    };
    absolute
        .ancestors()
        .find_map(|p| p.canonicalize().ok())
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// 选挂载点为最长前缀的磁盘，找不到时退回根分区
fn pick_mount(mounts: &[(PathBuf, u64)], target: &Path) -> Option<u64> {
    mounts
        .iter()
        .filter(|(mount, _)| target.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .or_else(|| mounts.iter().find(|(mount, _)| mount == Path::new("/")))
        .map(|(_, free)| *free)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_mount_prefix_wins() {
        let mounts = vec![
            (PathBuf::from("/"), 10),
            (PathBuf::from("/data"), 20),
            (PathBuf::from("/data/scratch"), 30),
        ];
        assert_eq!(pick_mount(&mounts, Path::new("/data/scratch/out")), Some(30));
        assert_eq!(pick_mount(&mounts, Path::new("/data/other")), Some(20));
        assert_eq!(pick_mount(&mounts, Path::new("/home/me")), Some(10));
    }

    #[test]
    fn no_mounts_means_unknown() {
        assert_eq!(pick_mount(&[], Path::new("/tmp")), None);
    }

    #[test]
    fn missing_directory_resolves_to_existing_ancestor() {
        let tmp = tempfile::tempdir().unwrap();
        let resolved = nearest_existing(&tmp.path().join("a/b/c"));
        assert_eq!(resolved, tmp.path().canonicalize().unwrap());
    }
}
