//! 리졸버 에러 타입
//!
//! [`ResolverError`]는 리졸버 모듈 내에서 발생할 수 있는 모든 에러를 나타냅니다.
//! `From<ResolverError> for IroncheckError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 자연스럽게 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **규칙**: `RuleLoad`, `RuleParse`, `Pattern`
//! - **데이터 소스**: `IndexLoad`, `DatabaseLoad`
//! - **설정**: `Config`
//! - **실행**: `Task`
//! - **파일 I/O**: `Io`, `FileTooBig`

use ironcheck_core::error::{
    AnalysisError, ConfigError, DatabaseError, IndexError, IroncheckError, RuleError,
};

/// 리졸버 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 규칙 내용 파싱 실패
    #[error("rule parse error: {source_name}: {reason}")]
    RuleParse {
        /// 규칙 출처 (파일 경로 또는 "builtin")
        source_name: String,
        /// 실패 사유
        reason: String,
    },

    /// 정규식 컴파일 실패
    #[error("invalid pattern '{pattern}': {reason}")]
    Pattern {
        /// 원본 패턴
        pattern: String,
        /// 실패 사유
        reason: String,
    },

    /// 후보 인덱스 로딩 실패
    #[error("index load error: {path}: {reason}")]
    IndexLoad {
        /// 인덱스 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 취약점 데이터베이스 로딩 실패
    #[error("database load error: {path}: {reason}")]
    DatabaseLoad {
        /// 데이터베이스 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 워커 태스크 실패
    #[error("task error: {0}")]
    Task(String),

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 파일 크기 초과
    #[error("file too large: {path}: {size} bytes (max: {max})")]
    FileTooBig {
        /// 파일 경로
        path: String,
        /// 실제 파일 크기 (바이트)
        size: u64,
        /// 최대 허용 크기 (바이트)
        max: u64,
    },
}

impl From<ResolverError> for IroncheckError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::RuleLoad { path, reason } => {
                IroncheckError::Rule(RuleError::Load { path, reason })
            }
            ResolverError::RuleParse {
                source_name,
                reason,
            } => IroncheckError::Rule(RuleError::Load {
                path: source_name,
                reason,
            }),
            ResolverError::Pattern { pattern, reason } => IroncheckError::Rule(
                RuleError::Invalid(format!("invalid pattern '{pattern}': {reason}")),
            ),
            ResolverError::IndexLoad { path, reason } => IroncheckError::Index(
                IndexError::Unavailable(format!("{path}: {reason}")),
            ),
            ResolverError::DatabaseLoad { path, reason } => IroncheckError::Database(
                DatabaseError::Connection(format!("{path}: {reason}")),
            ),
            ResolverError::Config { field, reason } => {
                IroncheckError::Config(ConfigError::InvalidValue { field, reason })
            }
            ResolverError::Task(msg) => IroncheckError::Analysis(AnalysisError::Task(msg)),
            ResolverError::Io { path, source } => IroncheckError::Io(std::io::Error::new(
                source.kind(),
                format!("{path}: {source}"),
            )),
            ResolverError::FileTooBig { path, size, max } => IroncheckError::Rule(RuleError::Load {
                path,
                reason: format!("file size {size} bytes exceeds maximum {max} bytes"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_load_converts_to_rule_error() {
        let err: IroncheckError = ResolverError::RuleLoad {
            path: "/etc/ironcheck/suppress.yaml".to_owned(),
            reason: "permission denied".to_owned(),
        }
        .into();
        assert!(matches!(err, IroncheckError::Rule(RuleError::Load { .. })));
        assert!(err.to_string().contains("suppress.yaml"));
    }

    #[test]
    fn database_load_converts_to_database_error() {
        let err: IroncheckError = ResolverError::DatabaseLoad {
            path: "db.json".to_owned(),
            reason: "bad json".to_owned(),
        }
        .into();
        assert!(matches!(err, IroncheckError::Database(_)));
    }

    #[test]
    fn config_converts_to_invalid_value() {
        let err: IroncheckError = ResolverError::Config {
            field: "min_search_score".to_owned(),
            reason: "out of range".to_owned(),
        }
        .into();
        assert!(matches!(
            err,
            IroncheckError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn io_keeps_kind() {
        let err: IroncheckError = ResolverError::Io {
            path: "/missing".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        }
        .into();
        match err {
            IroncheckError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn file_too_big_display() {
        let err = ResolverError::FileTooBig {
            path: "rules.yaml".to_owned(),
            size: 20,
            max: 10,
        };
        assert!(err.to_string().contains("20 bytes"));
    }
}
