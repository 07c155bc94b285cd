//! 파이프라인 trait — 분석 단계와 외부 협력자 확장 포인트 정의
//!
//! # 분석 흐름
//! ```text
//! Vec<Component> ──▶ [Phase 1] ──▶ [Phase 2] ──▶ ... ──▶ [Final] ──▶ Vec<Component>
//!                       │
//!                       ├─ Analyzer (컴포넌트별, 동시 실행)
//!                       └─ GlobalAnalyzer (장벽 이후, 단일 스레드)
//! ```
//!
//! 외부 협력자(후보 인덱스, 취약점 데이터베이스, 억제 규칙)는
//! [`CandidateIndex`], [`VulnerabilityDatabase`], [`Suppressor`] trait으로 주입됩니다.

use std::collections::BTreeSet;
use std::fmt;

use crate::component::Component;
use crate::context::AnalysisContext;
use crate::error::{DatabaseError, IndexError, IroncheckError};
use crate::identifier::Cpe;
use crate::types::{CandidateEntry, CandidateQuery, Vulnerability, VulnerableSoftwareRecord};

/// 분석 단계
///
/// 엔진은 선언 순서대로 단계를 실행합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnalysisPhase {
    /// 초기 단계
    Initial,
    /// 정보 수집 전
    PreInformationCollection,
    /// 정보 수집 (증거 추출)
    InformationCollection,
    /// 정보 수집 후 (버전 필터, 생태계 병합)
    PostInformationCollection,
    /// 식별자 분석 전 (힌트)
    PreIdentifierAnalysis,
    /// 식별자 분석 (CPE)
    IdentifierAnalysis,
    /// 식별자 분석 후 (오탐 필터)
    PostIdentifierAnalysis,
    /// 취약점 조회 전
    PreFindingAnalysis,
    /// 취약점 조회
    FindingAnalysis,
    /// 취약점 조회 후 (억제)
    PostFindingAnalysis,
    /// 최종 단계 (번들링)
    Final,
}

impl AnalysisPhase {
    /// 실행 순서대로 나열한 전체 단계
    pub const ALL: [AnalysisPhase; 11] = [
        AnalysisPhase::Initial,
        AnalysisPhase::PreInformationCollection,
        AnalysisPhase::InformationCollection,
        AnalysisPhase::PostInformationCollection,
        AnalysisPhase::PreIdentifierAnalysis,
        AnalysisPhase::IdentifierAnalysis,
        AnalysisPhase::PostIdentifierAnalysis,
        AnalysisPhase::PreFindingAnalysis,
        AnalysisPhase::FindingAnalysis,
        AnalysisPhase::PostFindingAnalysis,
        AnalysisPhase::Final,
    ];
}

impl fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::PreInformationCollection => "pre_information_collection",
            Self::InformationCollection => "information_collection",
            Self::PostInformationCollection => "post_information_collection",
            Self::PreIdentifierAnalysis => "pre_identifier_analysis",
            Self::IdentifierAnalysis => "identifier_analysis",
            Self::PostIdentifierAnalysis => "post_identifier_analysis",
            Self::PreFindingAnalysis => "pre_finding_analysis",
            Self::FindingAnalysis => "finding_analysis",
            Self::PostFindingAnalysis => "post_finding_analysis",
            Self::Final => "final",
        };
        write!(f, "{name}")
    }
}

// ─── 분석기 ─────────────────────────────────────────────────────────

/// 컴포넌트 단위 분석기
///
/// 엔진은 각 컴포넌트를 blocking 태스크로 옮겨 `process`를 호출합니다.
/// 분석기는 공유되므로 내부 상태는 읽기 전용이거나 동기화되어야 합니다.
pub trait Analyzer: Send + Sync {
    /// 분석기 이름
    fn name(&self) -> &str;

    /// 실행 단계
    fn phase(&self) -> AnalysisPhase;

    /// 이 컴포넌트를 처리할지 여부
    fn accepts(&self, _component: &Component) -> bool {
        true
    }

    /// 실행 전 준비
    fn prepare(&self, _ctx: &AnalysisContext) -> Result<(), IroncheckError> {
        Ok(())
    }

    /// 컴포넌트 하나를 분석합니다.
    fn process(&self, component: &mut Component, ctx: &AnalysisContext)
    -> Result<(), IroncheckError>;

    /// 실행 후 정리
    fn close(&self, _ctx: &AnalysisContext) -> Result<(), IroncheckError> {
        Ok(())
    }
}

/// 전체 컴포넌트 집합을 다루는 분석기
///
/// 단계 내 모든 컴포넌트 단위 분석이 끝난 뒤 단일 스레드로 실행됩니다.
pub trait GlobalAnalyzer: Send + Sync {
    /// 분석기 이름
    fn name(&self) -> &str;

    /// 실행 단계
    fn phase(&self) -> AnalysisPhase;

    /// 실행 전 준비
    fn prepare(&self, _ctx: &AnalysisContext) -> Result<(), IroncheckError> {
        Ok(())
    }

    /// 컴포넌트 목록 전체를 분석합니다. 항목을 제거하거나 추가할 수 있습니다.
    fn process_all(
        &self,
        components: &mut Vec<Component>,
        ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError>;

    /// 실행 후 정리
    fn close(&self, _ctx: &AnalysisContext) -> Result<(), IroncheckError> {
        Ok(())
    }
}

// ─── 데코레이터 ─────────────────────────────────────────────────────

/// 파일 확장자로 처리 대상을 제한하는 데코레이터
pub struct FileTypeFilter<A> {
    inner: A,
    extensions: BTreeSet<String>,
}

impl<A: Analyzer> FileTypeFilter<A> {
    /// 확장자 목록(점 제외, 대소문자 무시)으로 필터를 생성합니다.
    pub fn new<I, S>(inner: A, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            inner,
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }
}

impl<A: Analyzer> Analyzer for FileTypeFilter<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn phase(&self) -> AnalysisPhase {
        self.inner.phase()
    }

    fn accepts(&self, component: &Component) -> bool {
        component
            .extension()
            .is_some_and(|ext| self.extensions.contains(&ext))
            && self.inner.accepts(component)
    }

    fn prepare(&self, ctx: &AnalysisContext) -> Result<(), IroncheckError> {
        self.inner.prepare(ctx)
    }

    fn process(
        &self,
        component: &mut Component,
        ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        self.inner.process(component, ctx)
    }

    fn close(&self, ctx: &AnalysisContext) -> Result<(), IroncheckError> {
        self.inner.close(ctx)
    }
}

/// 설정으로 분석기를 켜고 끄는 데코레이터
pub struct Toggle<A> {
    inner: A,
    enabled: bool,
}

impl<A> Toggle<A> {
    /// 토글 데코레이터를 생성합니다.
    pub fn new(inner: A, enabled: bool) -> Self {
        Self { inner, enabled }
    }

    /// 활성화 여부
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<A: Analyzer> Analyzer for Toggle<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn phase(&self) -> AnalysisPhase {
        self.inner.phase()
    }

    fn accepts(&self, component: &Component) -> bool {
        self.enabled && self.inner.accepts(component)
    }

    fn prepare(&self, ctx: &AnalysisContext) -> Result<(), IroncheckError> {
        if self.enabled {
            self.inner.prepare(ctx)
        } else {
            Ok(())
        }
    }

    fn process(
        &self,
        component: &mut Component,
        ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        if self.enabled {
            self.inner.process(component, ctx)
        } else {
            Ok(())
        }
    }

    fn close(&self, ctx: &AnalysisContext) -> Result<(), IroncheckError> {
        if self.enabled {
            self.inner.close(ctx)
        } else {
            Ok(())
        }
    }
}

impl<A: GlobalAnalyzer> GlobalAnalyzer for Toggle<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn phase(&self) -> AnalysisPhase {
        self.inner.phase()
    }

    fn prepare(&self, ctx: &AnalysisContext) -> Result<(), IroncheckError> {
        if self.enabled {
            self.inner.prepare(ctx)
        } else {
            Ok(())
        }
    }

    fn process_all(
        &self,
        components: &mut Vec<Component>,
        ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        if self.enabled {
            self.inner.process_all(components, ctx)
        } else {
            Ok(())
        }
    }

    fn close(&self, ctx: &AnalysisContext) -> Result<(), IroncheckError> {
        if self.enabled {
            self.inner.close(ctx)
        } else {
            Ok(())
        }
    }
}

// ─── 외부 협력자 ────────────────────────────────────────────────────

/// vendor/product 이름 전문 검색 인덱스
pub trait CandidateIndex: Send + Sync {
    /// 가중치 질의를 실행하여 점수 내림차순으로 최대 `limit`개 결과를 반환합니다.
    fn search(&self, query: &CandidateQuery, limit: usize)
    -> Result<Vec<CandidateEntry>, IndexError>;
}

/// 취약점 데이터베이스
pub trait VulnerabilityDatabase: Send + Sync {
    /// (vendor, product)에 해당하는 취약 소프트웨어 레코드를 조회합니다.
    fn records_for(
        &self,
        vendor: &str,
        product: &str,
    ) -> Result<Vec<VulnerableSoftwareRecord>, DatabaseError>;

    /// CPE에 해당하는 취약점을 조회합니다.
    fn vulnerabilities_for(&self, cpe: &Cpe) -> Result<Vec<Vulnerability>, DatabaseError>;
}

/// 억제 규칙 적용기
pub trait Suppressor: Send + Sync {
    /// 컴포넌트에 규칙을 적용하고 억제된 항목 수를 반환합니다.
    fn apply(&self, component: &mut Component) -> usize;
}
