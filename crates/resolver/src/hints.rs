//! 힌트 규칙 -- 식별 이전에 증거를 추가하거나 제거합니다.
//!
//! 힌트는 주어진 증거(`given_*`) 또는 파일 이름(`file_name`)이 일치하면
//! 증거를 추가(`add_*`)하거나 제거(`remove_*`)합니다. 벤더 복제 힌트는
//! 특정 벤더 값을 가진 증거를 다른 값으로 한 벌 더 만듭니다.
//!
//! ```yaml
//! hints:
//!   - given_vendor:
//!       - source: Manifest
//!         name: Bundle-Vendor
//!         value: SpringSource
//!     add_vendor:
//!       - value: vmware
//! vendor_duplicating:
//!   - value: sun
//!     duplicate: oracle
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use ironcheck_core::component::Component;
use ironcheck_core::context::AnalysisContext;
use ironcheck_core::error::IroncheckError;
use ironcheck_core::evidence::Evidence;
use ironcheck_core::pipeline::{AnalysisPhase, Analyzer};
use ironcheck_core::types::{Confidence, EvidenceType};

use crate::error::ResolverError;
use crate::suppression::{PropertyMatcher, PropertyType, RuleDocument, RuleLimits, RuleLoader};

/// 내장 힌트 규칙
const BASE_HINTS: &str = include_str!("../rules/base-hints.yaml");

/// 힌트가 추가한 증거의 기본 출처
const HINT_SOURCE: &str = "hint analyzer";

const EVIDENCE_TYPES: [EvidenceType; 3] = [
    EvidenceType::Vendor,
    EvidenceType::Product,
    EvidenceType::Version,
];

// ─── 규칙 타입 ─────────────────────────────────────────────────────

/// 증거 조건
///
/// 출처와 이름은 대소문자를 무시하고 비교하며, 생략하면 모든 값과 일치합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceMatcher {
    /// 증거 출처
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 증거 이름
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 값 조건
    pub value: PropertyType,
    /// 신뢰도 조건
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

/// 추가할 증거
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceTemplate {
    /// 출처
    #[serde(default = "default_source")]
    pub source: String,
    /// 이름
    #[serde(default = "default_name")]
    pub name: String,
    /// 값
    pub value: String,
    /// 신뢰도
    #[serde(default = "default_confidence")]
    pub confidence: Confidence,
}

fn default_source() -> String {
    HINT_SOURCE.to_owned()
}

fn default_name() -> String {
    "hint".to_owned()
}

fn default_confidence() -> Confidence {
    Confidence::High
}

impl EvidenceTemplate {
    fn to_evidence(&self) -> Evidence {
        Evidence::new(&self.source, &self.name, &self.value, self.confidence)
    }
}

/// 힌트 규칙
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HintRule {
    /// 벤더 증거 조건
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub given_vendor: Vec<EvidenceMatcher>,
    /// 제품 증거 조건
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub given_product: Vec<EvidenceMatcher>,
    /// 버전 증거 조건
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub given_version: Vec<EvidenceMatcher>,
    /// 파일 이름 조건
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_name: Vec<PropertyType>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_vendor: Vec<EvidenceTemplate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_product: Vec<EvidenceTemplate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_version: Vec<EvidenceTemplate>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_vendor: Vec<EvidenceMatcher>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_product: Vec<EvidenceMatcher>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_version: Vec<EvidenceMatcher>,
}

impl HintRule {
    fn has_conditions(&self) -> bool {
        !self.given_vendor.is_empty()
            || !self.given_product.is_empty()
            || !self.given_version.is_empty()
            || !self.file_name.is_empty()
    }

    fn has_actions(&self) -> bool {
        !self.add_vendor.is_empty()
            || !self.add_product.is_empty()
            || !self.add_version.is_empty()
            || !self.remove_vendor.is_empty()
            || !self.remove_product.is_empty()
            || !self.remove_version.is_empty()
    }
}

/// 벤더 복제 힌트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorDuplicatingHint {
    /// 일치시킬 벤더 값 (대소문자 무시)
    pub value: String,
    /// 복제본의 값
    pub duplicate: String,
}

/// 힌트 파일
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HintFile {
    /// 힌트 규칙
    pub hints: Vec<HintRule>,
    /// 벤더 복제 힌트
    pub vendor_duplicating: Vec<VendorDuplicatingHint>,
}

/// 힌트 파일의 항목
#[derive(Debug, Clone)]
pub enum HintEntry {
    /// 증거 추가/제거 규칙
    Rule(HintRule),
    /// 벤더 복제
    VendorDuplicating(VendorDuplicatingHint),
}

impl RuleDocument for HintFile {
    type Rule = HintEntry;

    fn into_rules(self) -> Vec<HintEntry> {
        self.hints
            .into_iter()
            .map(HintEntry::Rule)
            .chain(
                self.vendor_duplicating
                    .into_iter()
                    .map(HintEntry::VendorDuplicating),
            )
            .collect()
    }

    fn validate_rule(entry: &HintEntry) -> Result<(), ResolverError> {
        match entry {
            HintEntry::Rule(rule) => {
                if !rule.has_conditions() {
                    return Err(ResolverError::RuleParse {
                        source_name: "hint".to_owned(),
                        reason: "hint must have a given_* or file_name condition".to_owned(),
                    });
                }
                if !rule.has_actions() {
                    return Err(ResolverError::RuleParse {
                        source_name: "hint".to_owned(),
                        reason: "hint must add or remove evidence".to_owned(),
                    });
                }
                CompiledHint::compile(rule.clone()).map(|_| ())
            }
            HintEntry::VendorDuplicating(dup) => {
                if dup.value.trim().is_empty() || dup.duplicate.trim().is_empty() {
                    return Err(ResolverError::RuleParse {
                        source_name: "vendor_duplicating".to_owned(),
                        reason: "value and duplicate must not be empty".to_owned(),
                    });
                }
                Ok(())
            }
        }
    }
}

// ─── 컴파일된 규칙 ─────────────────────────────────────────────────

#[derive(Debug)]
struct CompiledMatcher {
    source: Option<String>,
    name: Option<String>,
    value: PropertyMatcher,
    confidence: Option<Confidence>,
}

impl CompiledMatcher {
    fn compile(m: EvidenceMatcher) -> Result<Self, ResolverError> {
        Ok(Self {
            value: PropertyMatcher::new(m.value)?,
            source: m.source,
            name: m.name,
            confidence: m.confidence,
        })
    }

    fn matches(&self, e: &Evidence) -> bool {
        self.source
            .as_ref()
            .is_none_or(|s| s.eq_ignore_ascii_case(&e.source))
            && self
                .name
                .as_ref()
                .is_none_or(|n| n.eq_ignore_ascii_case(&e.name))
            && self.confidence.is_none_or(|c| c == e.confidence)
            && self.value.matches(&e.value)
    }
}

/// 유형별 배열: vendor, product, version 순
#[derive(Debug)]
struct CompiledHint {
    given: [Vec<CompiledMatcher>; 3],
    file_name: Vec<PropertyMatcher>,
    add: [Vec<EvidenceTemplate>; 3],
    remove: [Vec<CompiledMatcher>; 3],
}

impl CompiledHint {
    fn compile(rule: HintRule) -> Result<Self, ResolverError> {
        let matchers = |ms: Vec<EvidenceMatcher>| -> Result<Vec<CompiledMatcher>, ResolverError> {
            ms.into_iter().map(CompiledMatcher::compile).collect()
        };
        Ok(Self {
            given: [
                matchers(rule.given_vendor)?,
                matchers(rule.given_product)?,
                matchers(rule.given_version)?,
            ],
            file_name: rule
                .file_name
                .into_iter()
                .map(PropertyMatcher::new)
                .collect::<Result<_, _>>()?,
            add: [rule.add_vendor, rule.add_product, rule.add_version],
            remove: [
                matchers(rule.remove_vendor)?,
                matchers(rule.remove_product)?,
                matchers(rule.remove_version)?,
            ],
        })
    }

    fn triggered_by(&self, component: &Component) -> bool {
        let evidence_hit = EVIDENCE_TYPES.iter().zip(&self.given).any(|(kind, ms)| {
            component
                .evidence
                .evidence(*kind)
                .any(|e| ms.iter().any(|m| m.matches(e)))
        });
        evidence_hit || self.file_name.iter().any(|f| f.matches(&component.file_name))
    }

    fn apply(&self, component: &mut Component) {
        for (kind, templates) in EVIDENCE_TYPES.iter().zip(&self.add) {
            for template in templates {
                component.evidence.add(*kind, template.to_evidence());
                let weightings = match kind {
                    EvidenceType::Vendor => &mut component.vendor_weightings,
                    EvidenceType::Product => &mut component.product_weightings,
                    EvidenceType::Version => continue,
                };
                weightings.extend(
                    template
                        .value
                        .split_whitespace()
                        .map(str::to_lowercase),
                );
            }
        }
        for (kind, ms) in EVIDENCE_TYPES.iter().zip(&self.remove) {
            if !ms.is_empty() {
                component
                    .evidence
                    .remove_where(*kind, |e| ms.iter().any(|m| m.matches(e)));
            }
        }
    }
}

// ─── 규칙 집합 ─────────────────────────────────────────────────────

/// 컴파일된 힌트 규칙 집합
#[derive(Debug, Default)]
pub struct HintRuleSet {
    hints: Vec<CompiledHint>,
    vendor_duplicating: Vec<VendorDuplicatingHint>,
}

impl HintRuleSet {
    /// 빈 규칙 집합
    pub fn new() -> Self {
        Self::default()
    }

    /// 내장 힌트만 담은 집합을 생성합니다.
    pub fn with_base_rules() -> Result<Self, ResolverError> {
        let mut set = Self::new();
        set.add_entries(RuleLoader::parse_yaml::<HintFile>(BASE_HINTS, "<base>")?)?;
        Ok(set)
    }

    /// 항목을 컴파일하여 추가합니다.
    pub fn add_entries(&mut self, entries: Vec<HintEntry>) -> Result<usize, ResolverError> {
        let count = entries.len();
        for entry in entries {
            match entry {
                HintEntry::Rule(rule) => self.hints.push(CompiledHint::compile(rule)?),
                HintEntry::VendorDuplicating(dup) => self.vendor_duplicating.push(dup),
            }
        }
        Ok(count)
    }

    /// 사용자 힌트 파일 또는 디렉토리를 추가로 로드합니다.
    pub async fn load_overlay(
        &mut self,
        path: impl AsRef<Path>,
        limits: RuleLimits,
    ) -> Result<usize, ResolverError> {
        let path = path.as_ref();
        let entries = RuleLoader::load_path::<HintFile>(path, limits).await?;
        let added = self.add_entries(entries)?;
        tracing::info!(path = %path.display(), count = added, "loaded hint rules");
        Ok(added)
    }

    /// 규칙 수
    pub fn len(&self) -> usize {
        self.hints.len() + self.vendor_duplicating.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 컴포넌트에 모든 힌트를 적용합니다.
    pub fn apply(&self, component: &mut Component) {
        for hint in &self.hints {
            if hint.triggered_by(component) {
                tracing::trace!(component = %component, "hint matched");
                hint.apply(component);
            }
        }

        if self.vendor_duplicating.is_empty() {
            return;
        }
        // 복제본이 다시 복제되지 않도록 원본 스냅샷에서만 만든다
        let duplicates: Vec<Evidence> = component
            .evidence
            .evidence(EvidenceType::Vendor)
            .flat_map(|e| {
                self.vendor_duplicating
                    .iter()
                    .filter(|d| d.value.eq_ignore_ascii_case(&e.value))
                    .map(|d| {
                        Evidence::new(
                            format!("{} (hint)", e.source),
                            &e.name,
                            &d.duplicate,
                            e.confidence,
                        )
                    })
            })
            .collect();
        for evidence in duplicates {
            component.evidence.add(EvidenceType::Vendor, evidence);
        }
    }
}

/// 힌트 분석기
pub struct HintAnalyzer {
    rules: HintRuleSet,
}

impl HintAnalyzer {
    /// 규칙 집합으로 분석기를 생성합니다.
    pub fn new(rules: HintRuleSet) -> Self {
        Self { rules }
    }
}

impl Analyzer for HintAnalyzer {
    fn name(&self) -> &str {
        "hints"
    }

    fn phase(&self) -> AnalysisPhase {
        AnalysisPhase::PreIdentifierAnalysis
    }

    fn process(
        &self,
        component: &mut Component,
        _ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        self.rules.apply(component);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(yaml: &str) -> HintRuleSet {
        let mut set = HintRuleSet::new();
        set.add_entries(RuleLoader::parse_yaml::<HintFile>(yaml, "hints.yml").unwrap())
            .unwrap();
        set
    }

    #[test]
    fn base_hints_load() {
        let set = HintRuleSet::with_base_rules().unwrap();
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn spring_manifest_adds_vendor_and_weightings() {
        let set = HintRuleSet::with_base_rules().unwrap();
        let mut c = Component::new("/lib/spring-core-4.3.0.jar");
        c.evidence.add_evidence(
            EvidenceType::Product,
            "Manifest",
            "Implementation-Title",
            "Spring Framework",
            Confidence::High,
        );
        set.apply(&mut c);

        assert!(c.evidence.contains_value(EvidenceType::Vendor, "vmware"));
        assert!(c.evidence.contains_value(EvidenceType::Vendor, "springsource"));
        assert!(
            c.evidence
                .contains_value(EvidenceType::Product, "springsource_spring_framework")
        );
        assert!(c.vendor_weightings.contains("vmware"));
        assert!(
            c.product_weightings
                .contains("springsource_spring_framework")
        );
    }

    #[test]
    fn confidence_condition_must_match() {
        let set = HintRuleSet::with_base_rules().unwrap();
        let mut c = Component::new("/lib/spring-core.jar");
        c.evidence.add_evidence(
            EvidenceType::Product,
            "Manifest",
            "Implementation-Title",
            "Spring Framework",
            Confidence::Low,
        );
        set.apply(&mut c);
        assert!(!c.evidence.contains_value(EvidenceType::Vendor, "vmware"));
    }

    #[test]
    fn vendor_duplicating_does_not_cascade() {
        let set = HintRuleSet::with_base_rules().unwrap();
        let mut c = Component::new("/lib/rt.jar");
        c.evidence
            .add_evidence(EvidenceType::Vendor, "Manifest", "vendor", "Sun", Confidence::Medium);
        set.apply(&mut c);

        let vendors: Vec<_> = c.evidence.evidence(EvidenceType::Vendor).collect();
        assert_eq!(vendors.len(), 2);
        let copy = vendors
            .iter()
            .find(|e| e.value == "oracle")
            .expect("duplicate");
        assert_eq!(copy.source, "Manifest (hint)");
        assert_eq!(copy.confidence, Confidence::Medium);
    }

    #[test]
    fn file_name_regex_triggers() {
        let set = HintRuleSet::with_base_rules().unwrap();
        let mut c = Component::new("/web/js/jquery.min.js");
        set.apply(&mut c);
        assert!(c.evidence.contains_value(EvidenceType::Product, "jquery"));
    }

    #[test]
    fn remove_evidence_by_matcher() {
        let set = set(
            r#"
hints:
  - file_name: ["commons-lang-2.6.jar"]
    remove_vendor:
      - value:
          value: "apache.*"
          regex: true
"#,
        );
        let mut c = Component::new("/lib/commons-lang-2.6.jar");
        c.evidence
            .add_evidence(EvidenceType::Vendor, "pom", "groupid", "apache-commons", Confidence::High);
        c.evidence
            .add_evidence(EvidenceType::Vendor, "file", "name", "commons", Confidence::High);
        set.apply(&mut c);
        assert_eq!(c.evidence.len_of(EvidenceType::Vendor), 1);
    }

    #[test]
    fn hint_without_action_is_rejected() {
        let result =
            RuleLoader::parse_yaml::<HintFile>("hints:\n  - file_name: [\"a.jar\"]\n", "bad.yml");
        assert!(matches!(result, Err(ResolverError::RuleParse { .. })));
    }

    #[test]
    fn analyzer_runs_before_identification() {
        let analyzer = HintAnalyzer::new(HintRuleSet::new());
        assert_eq!(analyzer.phase(), AnalysisPhase::PreIdentifierAnalysis);
        let mut c = Component::new("/a.jar");
        analyzer.process(&mut c, &AnalysisContext::new()).unwrap();
    }
}
