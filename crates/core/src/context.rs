//! 분석 컨텍스트 — 한 번의 분석 실행이 공유하는 읽기 전용 핸들
//!
//! 실행 ID, 임시 디렉토리 카운터, 후보 인덱스/취약점 데이터베이스/억제 규칙 핸들을 담습니다.
//! 엔진은 컨텍스트를 `Arc`로 감싸 모든 컴포넌트 태스크에 공유합니다.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::pipeline::{CandidateIndex, Suppressor, VulnerabilityDatabase};

/// 분석 실행 컨텍스트
pub struct AnalysisContext {
    run_id: Uuid,
    temp_root: PathBuf,
    temp_counter: AtomicU64,
    index: Option<Arc<dyn CandidateIndex>>,
    database: Option<Arc<dyn VulnerabilityDatabase>>,
    suppressor: Option<Arc<dyn Suppressor>>,
}

impl AnalysisContext {
    /// 시스템 임시 디렉토리를 사용하는 빈 컨텍스트를 생성합니다.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            temp_root: std::env::temp_dir(),
            temp_counter: AtomicU64::new(0),
            index: None,
            database: None,
            suppressor: None,
        }
    }

    /// 임시 디렉토리 루트를 지정합니다. 빈 경로는 무시합니다.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if !root.as_os_str().is_empty() {
            self.temp_root = root;
        }
        self
    }

    /// 후보 인덱스를 설정합니다.
    pub fn with_index(mut self, index: Arc<dyn CandidateIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// 취약점 데이터베이스를 설정합니다.
    pub fn with_database(mut self, database: Arc<dyn VulnerabilityDatabase>) -> Self {
        self.database = Some(database);
        self
    }

    /// 억제 규칙 적용기를 설정합니다.
    pub fn with_suppressor(mut self, suppressor: Arc<dyn Suppressor>) -> Self {
        self.suppressor = Some(suppressor);
        self
    }

    /// 실행 ID
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// 후보 인덱스
    pub fn index(&self) -> Option<&Arc<dyn CandidateIndex>> {
        self.index.as_ref()
    }

    /// 취약점 데이터베이스
    pub fn database(&self) -> Option<&Arc<dyn VulnerabilityDatabase>> {
        self.database.as_ref()
    }

    /// 억제 규칙 적용기
    pub fn suppressor(&self) -> Option<&Arc<dyn Suppressor>> {
        self.suppressor.as_ref()
    }

    /// 이번 실행 전용 임시 디렉토리 (`<root>/ironcheck-<run_id>`)
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_root.join(format!("ironcheck-{}", self.run_id))
    }

    /// 실행 내에서 유일한 임시 경로를 발급합니다.
    pub fn next_temp_path(&self, prefix: &str) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.temp_dir().join(format!("{prefix}{n}"))
    }
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("run_id", &self.run_id)
            .field("temp_root", &self.temp_root)
            .field("has_index", &self.index.is_some())
            .field("has_database", &self.database.is_some())
            .field("has_suppressor", &self.suppressor.is_some())
            .finish()
    }
}
