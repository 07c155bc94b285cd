//! 억제 규칙 -- 알려진 오탐 식별자와 취약점을 YAML 규칙으로 제거합니다.
//!
//! # 규칙 형식
//! ```yaml
//! suppressions:
//!   - notes: "struts-tags is not struts core"
//!     file_path:
//!       value: ".*/struts-tags-[\\d.]+\\.jar"
//!       regex: true
//!     cpe:
//!       - "cpe:/a:apache:struts"
//!     until: 2027-01-01
//! ```
//!
//! # 아키텍처
//! - [`SuppressionRuleSet`]: 컴파일된 규칙 집합, [`Suppressor`] 구현
//! - [`SuppressionAnalyzer`]: 취약점 조회 이후 규칙을 다시 적용하는 분석기
//! - [`loader`]: YAML 파일 로딩 및 유효성 검증
//! - [`types`]: 규칙 데이터 구조 정의
//!
//! 내장 규칙(`base`)은 바이너리에 포함되어 항상 로드되며, 사용자 규칙 파일
//! 로딩 실패는 경고만 남깁니다.

pub mod loader;
pub mod types;

pub use loader::{RuleDocument, RuleLimits, RuleLoader};
pub use types::{PropertyType, SuppressionFile, SuppressionRule};

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use metrics::counter;
use regex::Regex;

use ironcheck_core::component::Component;
use ironcheck_core::context::AnalysisContext;
use ironcheck_core::error::IroncheckError;
use ironcheck_core::identifier::{Identifier, IdentifierKind};
use ironcheck_core::metrics as m;
use ironcheck_core::pipeline::{AnalysisPhase, Analyzer, Suppressor};
use ironcheck_core::types::Vulnerability;

use crate::error::ResolverError;

/// 내장 억제 규칙
const BASE_SUPPRESSIONS: &str = include_str!("../../rules/base-suppressions.yaml");

impl RuleDocument for SuppressionFile {
    type Rule = SuppressionRule;

    fn into_rules(self) -> Vec<SuppressionRule> {
        self.suppressions
    }

    fn validate_rule(rule: &SuppressionRule) -> Result<(), ResolverError> {
        rule.validate()?;
        // 정규식 유효성은 컴파일로 확인한다
        CompiledRule::compile(rule.clone()).map(|_| ())
    }
}

// ─── 컴파일된 조건 ─────────────────────────────────────────────────

/// 정규식을 미리 컴파일한 문자열 조건
#[derive(Debug)]
pub(crate) struct PropertyMatcher {
    property: PropertyType,
    regex: Option<Regex>,
}

impl PropertyMatcher {
    pub(crate) fn new(property: PropertyType) -> Result<Self, ResolverError> {
        let regex = property.compile()?;
        Ok(Self { property, regex })
    }

    /// 정규식이면 전체 일치, 아니면 완전 일치
    pub(crate) fn matches(&self, text: &str) -> bool {
        match &self.regex {
            Some(rx) => rx.is_match(text),
            None if self.property.case_sensitive => self.property.value == text,
            None => self.property.value.eq_ignore_ascii_case(text),
        }
    }

    /// CPE 식별자는 정규식이 아니면 접두 일치로 비교합니다.
    fn matches_cpe(&self, uri: &str) -> bool {
        match &self.regex {
            Some(rx) => rx.is_match(uri),
            None if self.property.case_sensitive => uri.starts_with(&self.property.value),
            None => uri
                .to_lowercase()
                .starts_with(&self.property.value.to_lowercase()),
        }
    }

    /// 식별자 종류에 맞는 값으로 비교합니다.
    ///
    /// 패키지 URL은 GAV 형태로, CPE는 2.2 URI 접두로 비교합니다.
    fn matches_identifier(&self, identifier: &Identifier) -> bool {
        match identifier.kind {
            IdentifierKind::Purl => identifier
                .as_purl()
                .is_some_and(|p| self.matches(&p.to_gav())),
            IdentifierKind::Cpe => identifier
                .as_cpe()
                .is_some_and(|cpe| self.matches_cpe(&cpe.to_uri())),
            IdentifierKind::Generic => self.matches(&identifier.value),
        }
    }
}

/// 컴파일된 억제 규칙
#[derive(Debug)]
struct CompiledRule {
    rule: SuppressionRule,
    file_path: Option<PropertyMatcher>,
    gav: Option<PropertyMatcher>,
    package_url: Option<PropertyMatcher>,
    cpe: Vec<PropertyMatcher>,
    vulnerability_name: Vec<PropertyMatcher>,
    matched: AtomicBool,
}

impl CompiledRule {
    fn compile(rule: SuppressionRule) -> Result<Self, ResolverError> {
        let single = |p: &Option<PropertyType>| p.clone().map(PropertyMatcher::new).transpose();
        let many = |ps: &[PropertyType]| -> Result<Vec<PropertyMatcher>, ResolverError> {
            ps.iter().cloned().map(PropertyMatcher::new).collect()
        };
        Ok(Self {
            file_path: single(&rule.file_path)?,
            gav: single(&rule.gav)?,
            package_url: single(&rule.package_url)?,
            cpe: many(&rule.cpe)?,
            vulnerability_name: many(&rule.vulnerability_name)?,
            rule,
            matched: AtomicBool::new(false),
        })
    }

    /// 선택 조건(경로, 해시, GAV, 패키지 URL)을 모두 통과하는지 확인합니다.
    fn selects(&self, component: &Component) -> bool {
        if let Some(fp) = &self.file_path {
            if !fp.matches(&component.file_path) {
                return false;
            }
        }
        if let Some(sha1) = &self.rule.sha1 {
            if !component
                .sha1
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(sha1))
            {
                return false;
            }
        }
        if let Some(gav) = &self.gav {
            if !component
                .software_identifiers
                .iter()
                .any(|i| gav.matches_identifier(i))
            {
                return false;
            }
        }
        if let Some(purl) = &self.package_url {
            if !component
                .software_identifiers
                .iter()
                .filter(|i| i.kind == IdentifierKind::Purl)
                .any(|i| purl.matches(&i.value))
            {
                return false;
            }
        }
        true
    }

    fn suppresses_vulnerability(&self, v: &Vulnerability) -> bool {
        if self.rule.cve.iter().any(|c| c.eq_ignore_ascii_case(&v.name)) {
            return true;
        }
        if self.rule.cwe.iter().any(|entry| {
            let prefix = format!("CWE-{entry}");
            v.cwes.iter().any(|c| c.starts_with(&prefix))
        }) {
            return true;
        }
        if self.vulnerability_name.iter().any(|p| p.matches(&v.name)) {
            return true;
        }
        v.cvss_score
            .is_some_and(|score| self.rule.cvss_below.iter().any(|below| score < *below))
    }

    fn mark(&self, item: &str, component: &Component) {
        if !self.rule.base && !self.matched.swap(true, Ordering::Relaxed) {
            tracing::debug!(rule = %self.rule, component = %component, item, "suppression rule matched");
        }
    }

    /// 규칙을 적용하고 억제된 항목 수를 반환합니다.
    fn process(&self, component: &mut Component) -> usize {
        if !self.selects(component) {
            return 0;
        }
        let mut suppressed = 0;

        if !self.cpe.is_empty() {
            let matched: Vec<Identifier> = component
                .vulnerable_software_identifiers
                .iter()
                .filter(|i| self.cpe.iter().any(|c| c.matches_identifier(i)))
                .cloned()
                .collect();
            for mut identifier in matched {
                component.remove_vulnerable_software_identifier(&identifier);
                self.mark(&identifier.value, component);
                if !self.rule.base {
                    if let Some(notes) = &self.rule.notes {
                        identifier.notes = Some(notes.clone());
                    }
                    component.suppressed_identifiers.insert(identifier);
                }
                suppressed += 1;
            }
        }

        if self.rule.has_vulnerability_targets() {
            let matched: Vec<Vulnerability> = component
                .vulnerabilities
                .iter()
                .filter(|v| self.suppresses_vulnerability(v))
                .cloned()
                .collect();
            for mut vulnerability in matched {
                component.vulnerabilities.remove(&vulnerability);
                self.mark(&vulnerability.name, component);
                if !self.rule.base {
                    if let Some(notes) = &self.rule.notes {
                        vulnerability.notes = Some(notes.clone());
                    }
                    component.suppressed_vulnerabilities.insert(vulnerability);
                }
                suppressed += 1;
            }
        }
        suppressed
    }
}

// ─── 규칙 집합 ─────────────────────────────────────────────────────

/// 컴파일된 억제 규칙 집합
///
/// 분석 실행 동안 `Arc`로 공유됩니다. 규칙별 일치 여부는 원자적으로 기록되어
/// 실행이 끝난 뒤 미사용 규칙을 보고하는 데 쓰입니다.
#[derive(Debug, Default)]
pub struct SuppressionRuleSet {
    rules: Vec<CompiledRule>,
}

impl SuppressionRuleSet {
    /// 빈 규칙 집합
    pub fn new() -> Self {
        Self::default()
    }

    /// 내장 규칙만 담은 집합을 생성합니다.
    ///
    /// # Errors
    ///
    /// 내장 규칙 파일이 손상된 경우 `ResolverError::RuleParse`
    pub fn with_base_rules() -> Result<Self, ResolverError> {
        let mut set = Self::new();
        set.add_base_rules()?;
        Ok(set)
    }

    /// 내장 규칙을 추가합니다.
    pub fn add_base_rules(&mut self) -> Result<usize, ResolverError> {
        let mut rules = RuleLoader::parse_yaml::<SuppressionFile>(BASE_SUPPRESSIONS, "<base>")?;
        for rule in &mut rules {
            rule.base = true;
        }
        self.add_rules(rules, today())
    }

    /// 규칙을 컴파일하여 추가합니다. `today` 기준으로 만료된 규칙은 건너뜁니다.
    ///
    /// 추가된 규칙 수를 반환합니다.
    pub fn add_rules(
        &mut self,
        rules: Vec<SuppressionRule>,
        today: NaiveDate,
    ) -> Result<usize, ResolverError> {
        let mut added = 0;
        for rule in rules {
            if rule.is_expired(today) {
                tracing::info!(rule = %rule, "suppression rule expired, skipping");
                continue;
            }
            self.rules.push(CompiledRule::compile(rule)?);
            added += 1;
        }
        Ok(added)
    }

    /// 사용자 규칙 파일 또는 디렉토리를 추가로 로드합니다.
    ///
    /// 실패는 호출자에게 반환되며, 엔진은 이를 경고로만 기록합니다.
    pub async fn load_overlay(
        &mut self,
        path: impl AsRef<Path>,
        limits: RuleLimits,
    ) -> Result<usize, ResolverError> {
        let path = path.as_ref();
        let rules = RuleLoader::load_path::<SuppressionFile>(path, limits).await?;
        let added = self.add_rules(rules, today())?;
        tracing::info!(path = %path.display(), count = added, "loaded suppression rules");
        Ok(added)
    }

    /// 규칙 수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 한 번도 일치하지 않은 사용자 규칙
    pub fn unused_rules(&self) -> Vec<&SuppressionRule> {
        self.rules
            .iter()
            .filter(|r| !r.rule.base && !r.matched.load(Ordering::Relaxed))
            .map(|r| &r.rule)
            .collect()
    }

    /// 미사용 사용자 규칙을 경고로 보고하고 그 수를 반환합니다.
    pub fn report_unused(&self) -> usize {
        let unused = self.unused_rules();
        for rule in &unused {
            tracing::warn!(rule = %rule, "suppression rule had no matches");
        }
        unused.len()
    }
}

impl Suppressor for SuppressionRuleSet {
    fn apply(&self, component: &mut Component) -> usize {
        let suppressed: usize = self.rules.iter().map(|r| r.process(component)).sum();
        if suppressed > 0 {
            counter!(m::IDENTIFIERS_SUPPRESSED_TOTAL, m::LABEL_ANALYZER => "suppression")
                .increment(suppressed as u64);
        }
        suppressed
    }
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

// ─── 분석기 ───────────────────────────────────────────────────────

/// 취약점 조회 이후 억제 규칙을 적용하는 분석기
///
/// 식별자는 부착 직후에도 억제되므로 이 단계는 주로 취약점 억제를 담당합니다.
pub struct SuppressionAnalyzer;

impl Analyzer for SuppressionAnalyzer {
    fn name(&self) -> &str {
        "suppression"
    }

    fn phase(&self) -> AnalysisPhase {
        AnalysisPhase::PostFindingAnalysis
    }

    fn accepts(&self, component: &Component) -> bool {
        !component.vulnerable_software_identifiers.is_empty() || !component.vulnerabilities.is_empty()
    }

    fn process(
        &self,
        component: &mut Component,
        ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        if let Some(suppressor) = ctx.suppressor() {
            suppressor.apply(component);
        }
        Ok(())
    }
}
