//! 증거 저장소 — 컴포넌트별 신뢰도 태그가 붙은 사실 모음
//!
//! 각 [`Evidence`]는 불변 값이며, [`EvidenceCollection`]은 유형(vendor/product/version)별로
//! 정렬된 집합을 유지합니다. 동일성과 정렬은 `(source, name, value)`를 대소문자 구분 없이
//! 비교한 뒤 신뢰도를 비교합니다.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Confidence, EvidenceType};

/// 대소문자를 무시하고 두 문자열을 비교합니다.
fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// 신뢰도 태그가 붙은 단일 사실
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    /// 증거를 수집한 출처 (예: "pom", "Manifest", "file")
    pub source: String,
    /// 출처 내 필드 이름 (예: "artifactid")
    pub name: String,
    /// 값
    pub value: String,
    /// 신뢰도
    pub confidence: Confidence,
}

impl Evidence {
    /// 새 증거를 생성합니다.
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            value: value.into(),
            confidence,
        }
    }
}

impl PartialEq for Evidence {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Evidence {}

impl PartialOrd for Evidence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Evidence {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_ignore_case(&self.source, &other.source)
            .then_with(|| cmp_ignore_case(&self.name, &other.name))
            .then_with(|| cmp_ignore_case(&self.value, &other.value))
            .then_with(|| self.confidence.cmp(&other.confidence))
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}={} ({})",
            self.source, self.name, self.value, self.confidence
        )
    }
}

/// 유형별로 정렬된 증거 집합
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceCollection {
    vendor: BTreeSet<Evidence>,
    product: BTreeSet<Evidence>,
    version: BTreeSet<Evidence>,
}

impl EvidenceCollection {
    /// 빈 컬렉션을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, kind: EvidenceType) -> &BTreeSet<Evidence> {
        match kind {
            EvidenceType::Vendor => &self.vendor,
            EvidenceType::Product => &self.product,
            EvidenceType::Version => &self.version,
        }
    }

    fn set_mut(&mut self, kind: EvidenceType) -> &mut BTreeSet<Evidence> {
        match kind {
            EvidenceType::Vendor => &mut self.vendor,
            EvidenceType::Product => &mut self.product,
            EvidenceType::Version => &mut self.version,
        }
    }

    /// 증거를 추가합니다. 이미 동일한 증거가 있으면 `false`를 반환합니다.
    pub fn add_evidence(
        &mut self,
        kind: EvidenceType,
        source: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
        confidence: Confidence,
    ) -> bool {
        self.add(kind, Evidence::new(source, name, value, confidence))
    }

    /// 이미 생성된 증거를 추가합니다.
    pub fn add(&mut self, kind: EvidenceType, evidence: Evidence) -> bool {
        self.set_mut(kind).insert(evidence)
    }

    /// 해당 유형의 모든 증거를 정렬 순서대로 반환합니다.
    pub fn evidence(&self, kind: EvidenceType) -> impl Iterator<Item = &Evidence> {
        self.set(kind).iter()
    }

    /// 해당 유형에서 지정한 신뢰도의 증거만 반환합니다.
    pub fn evidence_at(
        &self,
        kind: EvidenceType,
        confidence: Confidence,
    ) -> impl Iterator<Item = &Evidence> {
        self.set(kind)
            .iter()
            .filter(move |e| e.confidence == confidence)
    }

    /// 증거를 제거합니다. 제거되었으면 `true`를 반환합니다.
    pub fn remove_evidence(&mut self, kind: EvidenceType, evidence: &Evidence) -> bool {
        self.set_mut(kind).remove(evidence)
    }

    /// 조건을 만족하는 증거를 모두 제거하고 제거된 개수를 반환합니다.
    pub fn remove_where<F>(&mut self, kind: EvidenceType, mut predicate: F) -> usize
    where
        F: FnMut(&Evidence) -> bool,
    {
        let set = self.set_mut(kind);
        let before = set.len();
        set.retain(|e| !predicate(e));
        before - set.len()
    }

    /// 해당 유형에 대소문자 구분 없이 같은 값을 가진 증거가 있는지 확인합니다.
    pub fn contains_value(&self, kind: EvidenceType, value: &str) -> bool {
        self.set(kind)
            .iter()
            .any(|e| e.value.eq_ignore_ascii_case(value))
    }

    /// 해당 유형의 증거 개수
    pub fn len_of(&self, kind: EvidenceType) -> usize {
        self.set(kind).len()
    }

    /// 전체 증거 개수
    pub fn len(&self) -> usize {
        self.vendor.len() + self.product.len() + self.version.len()
    }

    /// 증거가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 다른 컬렉션의 모든 증거를 복사합니다.
    pub fn extend_from(&mut self, other: &EvidenceCollection) {
        for kind in [
            EvidenceType::Vendor,
            EvidenceType::Product,
            EvidenceType::Version,
        ] {
            let set = self.set_mut(kind);
            set.extend(other.set(kind).iter().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_case_but_not_confidence() {
        let a = Evidence::new("POM", "ArtifactId", "Struts2-Core", Confidence::High);
        let b = Evidence::new("pom", "artifactid", "struts2-core", Confidence::High);
        let c = Evidence::new("pom", "artifactid", "struts2-core", Confidence::Low);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut ev = EvidenceCollection::new();
        assert!(ev.add_evidence(
            EvidenceType::Vendor,
            "pom",
            "groupid",
            "org.apache",
            Confidence::Highest
        ));
        assert!(!ev.add_evidence(
            EvidenceType::Vendor,
            "POM",
            "GroupId",
            "ORG.APACHE",
            Confidence::Highest
        ));
        assert_eq!(ev.len_of(EvidenceType::Vendor), 1);
    }

    #[test]
    fn evidence_at_filters_by_confidence() {
        let mut ev = EvidenceCollection::new();
        ev.add_evidence(EvidenceType::Product, "file", "name", "struts2", Confidence::High);
        ev.add_evidence(EvidenceType::Product, "pom", "name", "Struts 2", Confidence::Low);
        let high: Vec<_> = ev
            .evidence_at(EvidenceType::Product, Confidence::High)
            .collect();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].value, "struts2");
        assert_eq!(
            ev.evidence_at(EvidenceType::Product, Confidence::Medium)
                .count(),
            0
        );
    }

    #[test]
    fn remove_evidence_only_touches_requested_type() {
        let mut ev = EvidenceCollection::new();
        let e = Evidence::new("file", "name", "commons", Confidence::Medium);
        ev.add(EvidenceType::Vendor, e.clone());
        ev.add(EvidenceType::Product, e.clone());
        assert!(ev.remove_evidence(EvidenceType::Vendor, &e));
        assert!(!ev.remove_evidence(EvidenceType::Vendor, &e));
        assert_eq!(ev.len_of(EvidenceType::Product), 1);
    }

    #[test]
    fn remove_where_counts_removed() {
        let mut ev = EvidenceCollection::new();
        ev.add_evidence(EvidenceType::Version, "file", "version", "1.0", Confidence::High);
        ev.add_evidence(EvidenceType::Version, "pom", "version", "2.0", Confidence::High);
        let removed = ev.remove_where(EvidenceType::Version, |e| e.value != "2.0");
        assert_eq!(removed, 1);
        assert_eq!(ev.len(), 1);
    }

    #[test]
    fn contains_value_is_case_insensitive() {
        let mut ev = EvidenceCollection::new();
        ev.add_evidence(EvidenceType::Product, "pom", "artifactid", "M-Core", Confidence::High);
        assert!(ev.contains_value(EvidenceType::Product, "m-core"));
        assert!(!ev.contains_value(EvidenceType::Vendor, "m-core"));
    }

    #[test]
    fn serde_layout_is_grouped_by_type() {
        let json = r#"{
            "vendor": [{"source": "pom", "name": "groupid", "value": "org.apache", "confidence": "highest"}],
            "product": [{"source": "pom", "name": "artifactid", "value": "struts2-core", "confidence": "highest"}]
        }"#;
        let ev: EvidenceCollection = serde_json::from_str(json).unwrap();
        assert_eq!(ev.len_of(EvidenceType::Vendor), 1);
        assert_eq!(ev.len_of(EvidenceType::Product), 1);
        assert_eq!(ev.len_of(EvidenceType::Version), 0);
    }
}
