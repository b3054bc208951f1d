use std::path::{Path, PathBuf};

pub const CONFIG_DIR_NAME: &str = "configs";
pub const OUTPUT_DIR_NAME: &str = "output";

/// 專案目錄配置，由呼叫端注入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub root_dir: PathBuf,
    pub config_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl AppPaths {
    /// `<root>/configs` 與 `<root>/output`
    pub fn from_root<P: AsRef<Path>>(root: P) -> Self {
        let root_dir = root.as_ref().to_path_buf();
        Self {
            config_dir: root_dir.join(CONFIG_DIR_NAME),
            output_dir: root_dir.join(OUTPUT_DIR_NAME),
            root_dir,
        }
    }

    /// 相對路徑以 root 為基準
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir.join(path)
        }
    }

    pub fn config_file(&self, file_name: &str) -> PathBuf {
        self.config_dir.join(file_name)
    }

    pub fn output_file(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_root() {
        let paths = AppPaths::from_root("/srv/export");
        assert_eq!(paths.config_dir, PathBuf::from("/srv/export/configs"));
        assert_eq!(
            paths.output_file("a.parquet"),
            PathBuf::from("/srv/export/output/a.parquet")
        );
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let paths = AppPaths::from_root("/srv/export");
        assert_eq!(
            paths.resolve("output/b.parquet"),
            PathBuf::from("/srv/export/output/b.parquet")
        );
        assert_eq!(paths.resolve("/tmp/c.parquet"), PathBuf::from("/tmp/c.parquet"));
    }
}
