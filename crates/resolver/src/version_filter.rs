//! 버전 필터 -- 서로 모순되는 버전 증거를 정리합니다.
//!
//! 선언된 버전이 있으면 그와 다른 버전 증거를 버립니다. 선언된 버전이 없으면
//! 파일 이름, POM, 매니페스트 중 두 출처가 같은 버전을 말할 때 그 버전과 다른
//! 증거를 버립니다. 남은 증거가 모두 한 버전으로 수렴하면 그 버전을 선언된
//! 버전으로 채웁니다.

use ironcheck_core::component::Component;
use ironcheck_core::context::AnalysisContext;
use ironcheck_core::error::IroncheckError;
use ironcheck_core::evidence::Evidence;
use ironcheck_core::pipeline::{AnalysisPhase, Analyzer};
use ironcheck_core::types::EvidenceType;

use crate::version::{self, StructuredVersion};

/// 버전 증거의 권위 있는 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Authority {
    File,
    Pom,
    Manifest,
}

fn authority_of(e: &Evidence) -> Option<Authority> {
    let source = e.source.to_ascii_lowercase();
    let name = e.name.to_ascii_lowercase();
    match (source.as_str(), name.as_str()) {
        ("file", "version") => Some(Authority::File),
        ("pom" | "nexus" | "central", "version") => Some(Authority::Pom),
        ("manifest", "implementation-version" | "bundle-version") => Some(Authority::Manifest),
        _ => None,
    }
}

/// 두 출처 이상이 동의하는 버전을 찾습니다.
fn agreed_version(component: &Component) -> Option<StructuredVersion> {
    let authoritative: Vec<(Authority, StructuredVersion)> = component
        .evidence
        .evidence(EvidenceType::Version)
        .filter_map(|e| Some((authority_of(e)?, version::parse(&e.value)?)))
        .collect();

    for (i, (a, va)) in authoritative.iter().enumerate() {
        for (b, vb) in &authoritative[i + 1..] {
            if a != b && va == vb {
                return Some(va.clone());
            }
        }
    }
    None
}

/// 기준 버전과 다른 증거를 제거하고 제거 수를 반환합니다.
///
/// 버전으로 파싱되지 않는 증거도 제거합니다.
fn retain_matching(component: &mut Component, target: &StructuredVersion) -> usize {
    component
        .evidence
        .remove_where(EvidenceType::Version, |e| {
            version::parse(&e.value).is_none_or(|v| v != *target)
        })
}

/// 남은 증거가 모두 같은 버전이면 그 버전을 반환합니다.
fn unanimous_version(component: &Component) -> Option<StructuredVersion> {
    let mut found: Option<StructuredVersion> = None;
    for e in component.evidence.evidence(EvidenceType::Version) {
        let v = version::parse(&e.value)?;
        match &found {
            Some(existing) if *existing != v => return None,
            Some(_) => {}
            None => found = Some(v),
        }
    }
    found
}

/// 버전 증거 필터 분석기
pub struct VersionFilter;

impl VersionFilter {
    /// 컴포넌트의 버전 증거를 정리합니다.
    pub fn apply(component: &mut Component) {
        let declared = component
            .version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .and_then(version::parse);

        let removed = match declared {
            Some(declared) => retain_matching(component, &declared),
            None => match agreed_version(component) {
                Some(agreed) => retain_matching(component, &agreed),
                None => 0,
            },
        };
        if removed > 0 {
            tracing::debug!(component = %component, removed, "filtered version evidence");
        }

        if component.version.is_none() {
            if let Some(v) = unanimous_version(component) {
                tracing::debug!(component = %component, version = %v, "version set from evidence");
                component.version = Some(v.to_string());
            }
        }
    }
}

impl Analyzer for VersionFilter {
    fn name(&self) -> &str {
        "version_filter"
    }

    fn phase(&self) -> AnalysisPhase {
        AnalysisPhase::PostInformationCollection
    }

    fn accepts(&self, component: &Component) -> bool {
        component.evidence.len_of(EvidenceType::Version) > 0
    }

    fn process(
        &self,
        component: &mut Component,
        _ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        Self::apply(component);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironcheck_core::types::Confidence;

    fn add(c: &mut Component, source: &str, name: &str, value: &str) {
        c.evidence
            .add_evidence(EvidenceType::Version, source, name, value, Confidence::High);
    }

    fn values(c: &Component) -> Vec<String> {
        c.evidence
            .evidence(EvidenceType::Version)
            .map(|e| e.value.clone())
            .collect()
    }

    #[test]
    fn declared_version_drops_disagreeing_evidence() {
        let mut c = Component::new("/lib/guava-31.1.jar");
        c.version = Some("31.1".to_owned());
        add(&mut c, "file", "version", "31.1");
        add(&mut c, "Manifest", "Bundle-Version", "31.1.0");
        add(&mut c, "pom", "parent-version", "26.0");

        VersionFilter::apply(&mut c);
        assert_eq!(values(&c).len(), 2);
        assert!(!values(&c).contains(&"26.0".to_owned()));
        assert_eq!(c.version.as_deref(), Some("31.1"));
    }

    #[test]
    fn file_and_pom_agreement_filters_others() {
        let mut c = Component::new("/lib/commons-io-2.11.0.jar");
        add(&mut c, "file", "version", "2.11.0");
        add(&mut c, "pom", "version", "2.11.0");
        add(&mut c, "pom", "parent-version", "52");
        add(&mut c, "Manifest", "Specification-Version", "2.11");

        VersionFilter::apply(&mut c);
        // 2.11은 뒤쪽 0 규칙으로 2.11.0과 같다
        assert_eq!(values(&c).len(), 3);
        assert_eq!(c.version.as_deref(), Some("2.11.0"));
    }

    #[test]
    fn no_agreement_leaves_evidence() {
        let mut c = Component::new("/lib/x.jar");
        add(&mut c, "file", "version", "1.0");
        add(&mut c, "pom", "version", "2.0");

        VersionFilter::apply(&mut c);
        assert_eq!(values(&c).len(), 2);
        assert!(c.version.is_none());
    }

    #[test]
    fn same_authority_does_not_agree_with_itself() {
        let mut c = Component::new("/lib/x.jar");
        add(&mut c, "pom", "version", "1.0");
        add(&mut c, "central", "version", "1.0");
        add(&mut c, "Manifest", "Implementation-Title", "3.0");

        VersionFilter::apply(&mut c);
        assert_eq!(values(&c).len(), 3);
    }

    #[test]
    fn analyzer_skips_components_without_version_evidence() {
        let c = Component::new("/lib/x.jar");
        assert!(!VersionFilter.accepts(&c));
    }
}
