use crate::config::{ARG_LOG_TO, ARG_PAGE_FINISH, ARG_PAGE_START, ARG_PARENT_ID, LOG_FILE_EXTENSION};
use crate::range::WorkRange;
use std::path::PathBuf;

/// One launched child's slice of the work. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessAssignment {
    /// 0-based slot among the launched children
    pub index: usize,
    pub range: WorkRange,
    pub log_path: PathBuf,
    pub parent_id: u32,
}

impl ProcessAssignment {
    pub fn new(index: usize, range: WorkRange, log_prefix: &str, parent_id: u32) -> Self {
        Self {
            index,
            range,
            log_path: log_path_for(log_prefix, index),
            parent_id,
        }
    }

    /// Named arguments handed to the child, in launch order.
    pub fn arguments(&self) -> [(&'static str, String); 4] {
        [
            (ARG_PARENT_ID, self.parent_id.to_string()),
            (ARG_PAGE_START, self.range.start.to_string()),
            (ARG_PAGE_FINISH, self.range.end.to_string()),
            (ARG_LOG_TO, self.log_path.to_string_lossy().into_owned()),
        ]
    }
}

/// `<prefix><index>.log`; unique per index within one dispatch.
pub fn log_path_for(log_prefix: &str, index: usize) -> PathBuf {
    PathBuf::from(format!("{log_prefix}{index}{LOG_FILE_EXTENSION}"))
}
