//! 에러 타입 — 도메인별 에러 정의

/// ironcheck 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum IroncheckError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 후보 검색 인덱스 에러
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// 취약점 데이터베이스 에러
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// 억제/힌트 규칙 에러
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    /// 분석 단계 에러
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 후보 검색 인덱스 에러
///
/// 인덱스 오류는 해당 컴포넌트의 CPE 식별만 중단시키며 파이프라인은 계속 진행됩니다.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// 인덱스를 열 수 없음
    #[error("index unavailable: {0}")]
    Unavailable(String),

    /// 인덱스 데이터 손상
    #[error("index corrupt: {0}")]
    Corrupt(String),

    /// 검색 질의 생성/실행 실패
    #[error("query failed: {0}")]
    Query(String),
}

/// 취약점 데이터베이스 에러
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// 연결/로딩 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 조회 실패
    #[error("query failed: {0}")]
    Query(String),
}

/// 억제/힌트 규칙 에러
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// 규칙 파일 로딩 실패
    #[error("failed to load rules from {path}: {reason}")]
    Load { path: String, reason: String },

    /// 규칙 내용이 유효하지 않음
    #[error("invalid rule: {0}")]
    Invalid(String),
}

/// 분석 단계 에러
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// 분석기 준비 실패
    #[error("analyzer '{analyzer}' failed to prepare: {reason}")]
    Prepare { analyzer: String, reason: String },

    /// 컴포넌트 처리 실패
    #[error("analyzer '{analyzer}' failed on {component}: {reason}")]
    Process {
        analyzer: String,
        component: String,
        reason: String,
    },

    /// 워커 태스크 실패
    #[error("worker task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: IroncheckError = ConfigError::InvalidValue {
            field: "search.min_score".to_owned(),
            reason: "must be between 0 and 1".to_owned(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.starts_with("config error"));
        assert!(msg.contains("search.min_score"));
    }

    #[test]
    fn process_error_display_names_component() {
        let err = AnalysisError::Process {
            analyzer: "cpe".to_owned(),
            component: "struts2-core-2.3.20.jar".to_owned(),
            reason: "index closed".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cpe"));
        assert!(msg.contains("struts2-core-2.3.20.jar"));
        assert!(msg.contains("index closed"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: IroncheckError = io.into();
        assert!(matches!(err, IroncheckError::Io(_)));
    }
}
