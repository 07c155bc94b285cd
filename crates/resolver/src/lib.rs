#![doc = include_str!("../README.md")]
//!
//! # 모듈 구조
//!
//! - [`engine`]: 단계별 오케스트레이터 (`Engine`, `EngineBuilder`)
//! - [`config`]: 리졸버 설정 (`ResolverConfig`, 빌더)
//! - [`error`]: 도메인 에러 (`ResolverError`)
//! - [`version`]: 버전 문자열 파서 (`StructuredVersion`)
//! - [`search`], [`verify`], [`identifier`], [`cpe`]: CPE 후보 검색, 검증, 식별자 결정
//! - [`index`], [`db`]: JSON 기반 후보 인덱스와 취약점 데이터베이스
//! - [`false_positive`]: 오탐 필터와 아카이브 내부 중복 제거
//! - [`hints`], [`version_filter`]: 증거 보강과 버전 증거 정리
//! - [`suppression`]: YAML 억제 규칙
//! - [`vulnerability`]: 취약점 조회
//! - [`merging`], [`bundling`]: 생태계별 병합과 중복 번들링
//!
//! # 아키텍처
//!
//! ```text
//! Vec<Component>
//!      │
//!      ▼
//! version_filter ─▶ merging ─▶ hints ─▶ cpe ─▶ false_positive ─▶ archive_duplicate
//!                                        │                              │
//!                              CandidateIndex + VulnerabilityDatabase   │
//!                                                                       ▼
//!                        bundling ◀─ suppression ◀─ vulnerability_lookup
//!                           │
//!                           ▼
//!                    Vec<Component>
//! ```

pub mod bundling;
pub mod config;
pub mod cpe;
pub mod db;
pub mod engine;
pub mod error;
pub mod false_positive;
pub mod hints;
pub mod identifier;
pub mod index;
pub mod merging;
pub mod pairwise;
pub(crate) mod patterns;
pub mod search;
pub mod suppression;
pub mod verify;
pub mod version;
pub mod version_filter;
pub mod vulnerability;

// --- Public API Re-exports ---

// Engine
pub use engine::{Engine, EngineBuilder};

// Configuration
pub use config::{ResolverConfig, ResolverConfigBuilder};

// Error
pub use error::ResolverError;

// Data sources
pub use db::MemoryVulnerabilityDb;
pub use index::MemoryCandidateIndex;

// Analyzers
pub use bundling::DependencyBundler;
pub use cpe::CpeAnalyzer;
pub use false_positive::{ArchiveDuplicateFilter, FalsePositiveFilter};
pub use hints::{HintAnalyzer, HintRuleSet};
pub use merging::DependencyMerger;
pub use suppression::{SuppressionAnalyzer, SuppressionRule, SuppressionRuleSet};
pub use version_filter::VersionFilter;
pub use vulnerability::VulnerabilityLookup;

// Version
pub use version::StructuredVersion;
