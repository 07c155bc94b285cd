#![doc = include_str!("../README.md")]

pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod evidence;
pub mod identifier;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    AnalysisError, ConfigError, DatabaseError, IndexError, IroncheckError, RuleError,
};

// 설정
pub use config::IroncheckConfig;

// 컴포넌트와 증거
pub use component::Component;
pub use evidence::{Evidence, EvidenceCollection};
pub use identifier::{Cpe, Identifier, IdentifierKind, PackageUrl};

// 파이프라인 trait
pub use context::AnalysisContext;
pub use pipeline::{
    AnalysisPhase, Analyzer, CandidateIndex, FileTypeFilter, GlobalAnalyzer, Suppressor, Toggle,
    VulnerabilityDatabase,
};

// 도메인 타입
pub use types::{
    CandidateEntry, CandidateQuery, Confidence, Ecosystem, EvidenceType, QueryTerm, Severity,
    Vulnerability, VulnerableSoftwareRecord,
};
