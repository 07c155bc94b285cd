//! 리졸버 설정
//!
//! [`ResolverConfig`]는 core의 [`IroncheckConfig`](ironcheck_core::config::IroncheckConfig)에서
//! 검색/분석기 섹션을 가져오고, 리졸버 고유 설정(규칙 파일 크기 제한, 최대 규칙 수)을 추가합니다.
//!
//! # 사용 예시
//!
//! ```
//! use ironcheck_resolver::{ResolverConfig, ResolverConfigBuilder};
//!
//! let config = ResolverConfig::default();
//! config.validate().unwrap();
//!
//! let config = ResolverConfigBuilder::new()
//!     .max_query_results(50)
//!     .min_search_score(0.1)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};

use ironcheck_core::config::{AnalyzersConfig, IroncheckConfig};
use ironcheck_core::types::Ecosystem;

use crate::error::ResolverError;

/// 설정 상한값 상수
const MAX_QUERY_RESULTS_LIMIT: usize = 1000;
const MAX_WORKERS: usize = 256;
const MAX_RULE_FILE_SIZE_LIMIT: u64 = 100 * 1024 * 1024; // 100 MB
const MAX_RULES_LIMIT: usize = 100_000;

/// 리졸버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// 질의당 최대 후보 수
    pub max_query_results: usize,
    /// 최소 검색 점수
    pub min_search_score: f32,
    /// 가중치 토큰 부스트 배수
    pub weighting_boost: f32,
    /// CPE 식별을 건너뛸 생태계
    pub skip_ecosystems: Vec<Ecosystem>,
    /// 컴포넌트 분석 동시 실행 수
    pub workers: usize,
    /// 분석기 활성화 여부
    pub analyzers: AnalyzersConfig,

    // --- 모듈 고유 확장 ---
    /// 규칙 파일 최대 크기 (바이트)
    pub max_rule_file_size: u64,
    /// 파일/디렉토리당 최대 규칙 수
    pub max_rules: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_query_results: 25,
            min_search_score: 0.08,
            weighting_boost: 5.0,
            skip_ecosystems: Vec::new(),
            workers: 4,
            analyzers: AnalyzersConfig::default(),
            max_rule_file_size: 10 * 1024 * 1024, // 10 MB
            max_rules: 10_000,
        }
    }
}

impl ResolverConfig {
    /// core 설정에서 리졸버 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값을 사용합니다.
    /// 알 수 없는 생태계 이름은 무시됩니다.
    pub fn from_core(core: &IroncheckConfig) -> Self {
        Self {
            max_query_results: core.search.max_results,
            min_search_score: core.search.min_score as f32,
            weighting_boost: core.search.weighting_boost as f32,
            skip_ecosystems: core.search.skipped_ecosystems(),
            workers: core.general.workers,
            analyzers: core.analyzers.clone(),
            ..Self::default()
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `max_query_results`: 1-1000
    /// - `min_search_score`: 0.0-1.0
    /// - `weighting_boost`: 양수
    /// - `workers`: 1-256
    /// - `max_rule_file_size`: 1-104857600 (100MB)
    /// - `max_rules`: 1-100000
    pub fn validate(&self) -> Result<(), ResolverError> {
        if self.max_query_results == 0 || self.max_query_results > MAX_QUERY_RESULTS_LIMIT {
            return Err(ResolverError::Config {
                field: "max_query_results".to_owned(),
                reason: format!("must be 1-{MAX_QUERY_RESULTS_LIMIT}"),
            });
        }

        if !(0.0..=1.0).contains(&self.min_search_score) {
            return Err(ResolverError::Config {
                field: "min_search_score".to_owned(),
                reason: "must be 0.0-1.0".to_owned(),
            });
        }

        if !self.weighting_boost.is_finite() || self.weighting_boost <= 0.0 {
            return Err(ResolverError::Config {
                field: "weighting_boost".to_owned(),
                reason: "must be a positive number".to_owned(),
            });
        }

        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ResolverError::Config {
                field: "workers".to_owned(),
                reason: format!("must be 1-{MAX_WORKERS}"),
            });
        }

        if self.max_rule_file_size == 0 || self.max_rule_file_size > MAX_RULE_FILE_SIZE_LIMIT {
            return Err(ResolverError::Config {
                field: "max_rule_file_size".to_owned(),
                reason: format!("must be 1-{MAX_RULE_FILE_SIZE_LIMIT}"),
            });
        }

        if self.max_rules == 0 || self.max_rules > MAX_RULES_LIMIT {
            return Err(ResolverError::Config {
                field: "max_rules".to_owned(),
                reason: format!("must be 1-{MAX_RULES_LIMIT}"),
            });
        }

        Ok(())
    }
}

/// [`ResolverConfig`] 빌더
///
/// 빌드 시 유효성 검증을 수행합니다.
#[derive(Default)]
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 질의당 최대 후보 수를 설정합니다.
    pub fn max_query_results(mut self, max: usize) -> Self {
        self.config.max_query_results = max;
        self
    }

    /// 최소 검색 점수를 설정합니다.
    pub fn min_search_score(mut self, score: f32) -> Self {
        self.config.min_search_score = score;
        self
    }

    /// 가중치 부스트 배수를 설정합니다.
    pub fn weighting_boost(mut self, boost: f32) -> Self {
        self.config.weighting_boost = boost;
        self
    }

    /// CPE 식별을 건너뛸 생태계를 설정합니다.
    pub fn skip_ecosystems(mut self, ecosystems: Vec<Ecosystem>) -> Self {
        self.config.skip_ecosystems = ecosystems;
        self
    }

    /// 동시 실행 수를 설정합니다.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// 분석기 활성화 설정을 지정합니다.
    pub fn analyzers(mut self, analyzers: AnalyzersConfig) -> Self {
        self.config.analyzers = analyzers;
        self
    }

    /// 규칙 파일 최대 크기를 설정합니다.
    pub fn max_rule_file_size(mut self, size: u64) -> Self {
        self.config.max_rule_file_size = size;
        self
    }

    /// 최대 규칙 수를 설정합니다.
    pub fn max_rules(mut self, max: usize) -> Self {
        self.config.max_rules = max;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ResolverError::Config` 반환
    pub fn build(self) -> Result<ResolverConfig, ResolverError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ResolverConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let mut core = IroncheckConfig::default();
        core.search.max_results = 40;
        core.search.min_score = 0.2;
        core.search.skip_ecosystems = vec!["npm".to_owned(), "unknown".to_owned()];
        core.general.workers = 2;
        core.analyzers.bundling = false;

        let config = ResolverConfig::from_core(&core);
        assert_eq!(config.max_query_results, 40);
        assert!((config.min_search_score - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.skip_ecosystems, vec![Ecosystem::Npm]);
        assert_eq!(config.workers, 2);
        assert!(!config.analyzers.bundling);
        // extended fields use defaults
        assert_eq!(config.max_rules, 10_000);
    }

    #[test]
    fn validate_rejects_zero_results() {
        let config = ResolverConfig {
            max_query_results: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_score() {
        let config = ResolverConfig {
            min_search_score: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_nan_boost() {
        let config = ResolverConfig {
            weighting_boost: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_too_large_rule_file() {
        let config = ResolverConfig {
            max_rule_file_size: 200 * 1024 * 1024,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_validates() {
        let err = ResolverConfigBuilder::new().workers(0).build().unwrap_err();
        assert!(err.to_string().contains("workers"));

        let config = ResolverConfigBuilder::new()
            .max_query_results(10)
            .weighting_boost(3.0)
            .skip_ecosystems(vec![Ecosystem::Golang])
            .max_rules(5)
            .build()
            .unwrap();
        assert_eq!(config.max_query_results, 10);
        assert_eq!(config.max_rules, 5);
    }
}
