use serde::Serialize;

use crate::infra::config::{DEFAULT_MEMORY_SAFETY_MARGIN, DEFAULT_TARGET_CHUNK_COUNT};

/// 每个值的估算字节数（粗略启发值，不是精确统计）
pub const BYTES_PER_VALUE: u64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    InMemory,
    DiskStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkPlan {
    pub total_rows: u64,
    pub chunk_size: u64,
    pub strategy: Strategy,
}

impl ChunkPlan {
    pub fn chunk_count(&self) -> u64 {
        self.total_rows.div_ceil(self.chunk_size)
    }
}

pub fn row_byte_estimate(column_count: usize) -> u64 {
    column_count as u64 * BYTES_PER_VALUE
}

/// 根据总行数和实时内存余量决定分块大小与执行策略，不做任何 I/O
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlanner {
    pub target_chunk_count: u64,
    pub memory_safety_margin: f64,
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self {
            target_chunk_count: DEFAULT_TARGET_CHUNK_COUNT,
            memory_safety_margin: DEFAULT_MEMORY_SAFETY_MARGIN,
        }
    }
}

impl ChunkPlanner {
    pub fn new(target_chunk_count: u64, memory_safety_margin: f64) -> Self {
        Self {
            target_chunk_count,
            memory_safety_margin,
        }
    }

    pub fn plan(&self, total_rows: u64, available_memory_bytes: u64, row_byte_estimate: u64) -> ChunkPlan {
        let target = self.target_chunk_count.max(1);
        let chunk_size = if total_rows <= target {
            total_rows
        } else {
            total_rows / target
        }
        .max(1);

        let estimated_chunk_bytes = chunk_size.saturating_mul(row_byte_estimate);
        let strategy =
            if estimated_chunk_bytes as f64 > self.memory_safety_margin * available_memory_bytes as f64 {
                Strategy::DiskStream
            } else {
                Strategy::InMemory
            };

        ChunkPlan {
            total_rows,
            chunk_size,
            strategy,
        }
    }
}
