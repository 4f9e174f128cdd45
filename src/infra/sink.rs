use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::ValidationError;
use crate::infra::backend::RowBatch;

pub const CHUNK_PREFIX: &str = "chunk_";
pub const CHUNK_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenChunk {
    pub path: PathBuf,
    pub bytes: u64,
}

/// 磁盘流式执行时接收每一批结果的落盘目标
pub trait ChunkSink {
    fn location(&self) -> &Path;

    /// 创建目录并清理上一次执行留下的分块文件
    fn prepare(&mut self) -> io::Result<()>;

    fn write_chunk(&mut self, index: usize, batch: &RowBatch) -> io::Result<WrittenChunk>;
}

pub fn chunk_file_name(index: usize) -> String {
    format!("{}{:05}.{}", CHUNK_PREFIX, index, CHUNK_EXTENSION)
}

/// 调用方只能指定配置输出目录下的相对子目录，绝对路径和 `..` 一律拒绝
pub fn resolve_output_dir(base: &Path, requested: Option<&Path>) -> Result<PathBuf, ValidationError> {
    let Some(requested) = requested else {
        return Ok(base.to_path_buf());
    };
    let escapes = requested
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ValidationError::InvalidOutputDir(requested.display().to_string()));
    }
    Ok(base.join(requested))
}

/// 每批写成一个 JSON Lines 文件，一行一个对象
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    dir: PathBuf,
}

impl JsonLinesSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ChunkSink for JsonLinesSink {
    fn location(&self) -> &Path {
        &self.dir
    }

    fn prepare(&mut self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut removed = 0usize;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_chunk = path.is_file()
                && path.extension().is_some_and(|ext| ext == CHUNK_EXTENSION)
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(CHUNK_PREFIX));
            if is_chunk {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("清理旧分块文件 {} 个: {:?}", removed, self.dir);
        }
        Ok(())
    }

    fn write_chunk(&mut self, index: usize, batch: &RowBatch) -> io::Result<WrittenChunk> {
        let path = self.dir.join(chunk_file_name(index));
        let mut writer = BufWriter::new(File::create(&path)?);
        for row in &batch.rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        drop(writer);

        let bytes = fs::metadata(&path)?.len();
        Ok(WrittenChunk { path, bytes })
    }
}
