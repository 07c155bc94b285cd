//! 설정 관리 — ironcheck.toml 파싱 및 런타임 설정
//!
//! [`IroncheckConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`IRONCHECK_SEARCH_MIN_SCORE=0.1` 형식)
//! 3. 설정 파일 (`ironcheck.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), ironcheck_core::error::IroncheckError> {
//! use ironcheck_core::config::IroncheckConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = IroncheckConfig::load("ironcheck.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = IroncheckConfig::parse("[search]\nmin_score = 0.1")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, IroncheckError};
use crate::types::Ecosystem;

/// 검색 결과 최대 개수 상한
const MAX_QUERY_RESULTS_LIMIT: usize = 1000;

/// 워커 수 상한
const MAX_WORKERS: usize = 256;

/// Ironcheck 통합 설정
///
/// `ironcheck.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IroncheckConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 후보 검색 설정
    #[serde(default)]
    pub search: SearchConfig,
    /// 분석기 활성화 설정
    #[serde(default)]
    pub analyzers: AnalyzersConfig,
    /// 억제/힌트 규칙 설정
    #[serde(default)]
    pub rules: RulesConfig,
    /// 데이터 소스 설정
    #[serde(default)]
    pub data: DataConfig,
}

impl IroncheckConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IroncheckError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, IroncheckError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IroncheckError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                IroncheckError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, IroncheckError> {
        toml::from_str(toml_str).map_err(|e| {
            IroncheckError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `IRONCHECK_{SECTION}_{FIELD}`
    /// 예: `IRONCHECK_SEARCH_MAX_RESULTS=50`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "IRONCHECK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "IRONCHECK_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.temp_dir, "IRONCHECK_GENERAL_TEMP_DIR");
        override_usize(&mut self.general.workers, "IRONCHECK_GENERAL_WORKERS");

        // Search
        override_usize(&mut self.search.max_results, "IRONCHECK_SEARCH_MAX_RESULTS");
        override_f64(&mut self.search.min_score, "IRONCHECK_SEARCH_MIN_SCORE");
        override_f64(
            &mut self.search.weighting_boost,
            "IRONCHECK_SEARCH_WEIGHTING_BOOST",
        );
        override_csv(
            &mut self.search.skip_ecosystems,
            "IRONCHECK_SEARCH_SKIP_ECOSYSTEMS",
        );

        // Analyzers
        override_bool(&mut self.analyzers.cpe, "IRONCHECK_ANALYZERS_CPE");
        override_bool(&mut self.analyzers.hints, "IRONCHECK_ANALYZERS_HINTS");
        override_bool(
            &mut self.analyzers.version_filter,
            "IRONCHECK_ANALYZERS_VERSION_FILTER",
        );
        override_bool(
            &mut self.analyzers.false_positive,
            "IRONCHECK_ANALYZERS_FALSE_POSITIVE",
        );
        override_bool(
            &mut self.analyzers.vulnerability_lookup,
            "IRONCHECK_ANALYZERS_VULNERABILITY_LOOKUP",
        );
        override_bool(
            &mut self.analyzers.suppression,
            "IRONCHECK_ANALYZERS_SUPPRESSION",
        );
        override_bool(&mut self.analyzers.merging, "IRONCHECK_ANALYZERS_MERGING");
        override_bool(&mut self.analyzers.bundling, "IRONCHECK_ANALYZERS_BUNDLING");

        // Rules
        override_csv(
            &mut self.rules.suppression_paths,
            "IRONCHECK_RULES_SUPPRESSION_PATHS",
        );
        override_csv(&mut self.rules.hint_paths, "IRONCHECK_RULES_HINT_PATHS");

        // Data
        override_string(&mut self.data.database_path, "IRONCHECK_DATA_DATABASE_PATH");
        override_string(&mut self.data.index_path, "IRONCHECK_DATA_INDEX_PATH");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IroncheckError> {
        self.general.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 임시 디렉토리 (빈 문자열이면 시스템 기본값)
    pub temp_dir: String,
    /// 컴포넌트 분석 동시 실행 수
    pub workers: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            temp_dir: String::new(),
            workers: 4,
        }
    }
}

impl GeneralConfig {
    /// 일반 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidValue {
                field: "general.workers".to_owned(),
                reason: format!("must be between 1 and {MAX_WORKERS}"),
            });
        }

        Ok(())
    }
}

/// 후보 검색 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 질의당 최대 결과 수
    pub max_results: usize,
    /// 최소 검색 점수 (미만은 폐기)
    pub min_score: f64,
    /// 가중치 토큰 일치 시 빈도에 곱하는 배수
    pub weighting_boost: f64,
    /// CPE 식별을 건너뛸 생태계 목록
    pub skip_ecosystems: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 25,
            min_score: 0.08,
            weighting_boost: 5.0,
            skip_ecosystems: Vec::new(),
        }
    }
}

impl SearchConfig {
    /// 검색 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_results == 0 || self.max_results > MAX_QUERY_RESULTS_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "search.max_results".to_owned(),
                reason: format!("must be between 1 and {MAX_QUERY_RESULTS_LIMIT}"),
            });
        }

        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ConfigError::InvalidValue {
                field: "search.min_score".to_owned(),
                reason: "must be between 0.0 and 1.0".to_owned(),
            });
        }

        if !self.weighting_boost.is_finite() || self.weighting_boost <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "search.weighting_boost".to_owned(),
                reason: "must be a positive number".to_owned(),
            });
        }

        for name in &self.skip_ecosystems {
            if Ecosystem::from_str_loose(name).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "search.skip_ecosystems".to_owned(),
                    reason: format!("unknown ecosystem '{name}'"),
                });
            }
        }

        Ok(())
    }

    /// 건너뛸 생태계를 파싱된 값으로 반환합니다.
    pub fn skipped_ecosystems(&self) -> Vec<Ecosystem> {
        self.skip_ecosystems
            .iter()
            .filter_map(|s| Ecosystem::from_str_loose(s))
            .collect()
    }
}

/// 분석기 활성화 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzersConfig {
    /// CPE 식별
    pub cpe: bool,
    /// 힌트 규칙
    pub hints: bool,
    /// 버전 증거 필터
    pub version_filter: bool,
    /// 오탐 필터
    pub false_positive: bool,
    /// 취약점 조회
    pub vulnerability_lookup: bool,
    /// 억제 규칙
    pub suppression: bool,
    /// 생태계별 병합
    pub merging: bool,
    /// 중복 번들링
    pub bundling: bool,
}

impl Default for AnalyzersConfig {
    fn default() -> Self {
        Self {
            cpe: true,
            hints: true,
            version_filter: true,
            false_positive: true,
            vulnerability_lookup: true,
            suppression: true,
            merging: true,
            bundling: true,
        }
    }
}

/// 억제/힌트 규칙 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// 추가 억제 규칙 파일/디렉토리 경로
    pub suppression_paths: Vec<String>,
    /// 힌트 규칙 파일/디렉토리 경로
    pub hint_paths: Vec<String>,
}

/// 데이터 소스 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// 취약점 데이터베이스 JSON 경로
    pub database_path: String,
    /// 후보 인덱스 JSON 경로
    pub index_path: String,
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_f64(target: &mut f64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<f64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse f64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
