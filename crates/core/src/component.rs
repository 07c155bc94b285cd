//! 컴포넌트 — 분석 대상 물리 아티팩트
//!
//! 외부 추출기가 생성한 컴포넌트는 분석 단계를 거치며 증거와 식별자가 채워지고,
//! 다른 컴포넌트에 병합될 수 있습니다. 병합된 컴포넌트는 `related` 목록에
//! 평탄화된 값으로 소유되므로 순환이 생길 수 없습니다.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::evidence::EvidenceCollection;
use crate::identifier::{Cpe, Identifier, IdentifierKind};
use crate::types::{Confidence, Ecosystem, Vulnerability};

/// 분석 대상 컴포넌트
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
    /// 표시 경로 (아카이브 내부 경로 포함)
    pub file_path: String,
    /// 실제 파일 경로 (추출된 임시 파일일 수 있음)
    pub actual_file_path: String,
    /// 표시 파일 이름
    pub file_name: String,
    /// 패키지 루트 경로
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_path: Option<String>,

    /// MD5 해시
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    /// SHA-1 해시
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    /// SHA-256 해시
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// 생태계
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecosystem: Option<Ecosystem>,
    /// 선언된 패키지 이름
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 선언된 버전
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// 라이선스
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// 설명
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 실제 파일 없이 매니페스트로만 존재하는 컴포넌트
    #[serde(rename = "virtual")]
    pub is_virtual: bool,

    /// 수집된 증거
    pub evidence: EvidenceCollection,
    /// 소프트웨어 식별자 (purl, GAV)
    pub software_identifiers: BTreeSet<Identifier>,
    /// 취약 소프트웨어 식별자 (CPE)
    pub vulnerable_software_identifiers: BTreeSet<Identifier>,
    /// 알려진 취약점
    pub vulnerabilities: BTreeSet<Vulnerability>,
    /// 억제된 식별자 (감사용)
    pub suppressed_identifiers: BTreeSet<Identifier>,
    /// 억제된 취약점 (감사용)
    pub suppressed_vulnerabilities: BTreeSet<Vulnerability>,
    /// 병합된 중복 컴포넌트
    pub related: Vec<Component>,
    /// 프로젝트 참조 레이블
    pub project_references: BTreeSet<String>,
    /// 벤더 가중치 토큰
    pub vendor_weightings: BTreeSet<String>,
    /// 제품 가중치 토큰
    pub product_weightings: BTreeSet<String>,
}

impl Component {
    /// 파일 경로로 새 컴포넌트를 생성합니다.
    ///
    /// 표시 경로와 실제 경로를 모두 `path`로 설정하고 파일 이름을 추출합니다.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let file_name = file_name_of(&path).to_owned();
        Self {
            actual_file_path: path.clone(),
            file_path: path,
            file_name,
            ..Default::default()
        }
    }

    /// 가상 컴포넌트(매니페스트 항목)를 생성합니다.
    pub fn new_virtual(
        path: impl Into<String>,
        ecosystem: Ecosystem,
        name: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        let mut component = Self::new(path);
        component.is_virtual = true;
        component.ecosystem = Some(ecosystem);
        component.name = Some(name.into());
        component.version = version;
        component
    }

    /// 역직렬화된 입력의 빈 파생 필드를 채웁니다.
    pub fn normalize(&mut self) {
        if self.actual_file_path.is_empty() {
            self.actual_file_path = self.file_path.clone();
        }
        if self.file_name.is_empty() {
            self.file_name = file_name_of(&self.file_path).to_owned();
        }
    }

    /// 소문자 파일 확장자 (점 제외)
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.rsplit('/').next().unwrap_or(&self.file_name);
        name.rsplit_once('.')
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .map(|(_, ext)| ext.to_lowercase())
    }

    /// 실제 파일 이름 (임시 추출 경로의 마지막 세그먼트)
    pub fn actual_file_name(&self) -> &str {
        file_name_of(&self.actual_file_path)
    }

    /// 취약 소프트웨어 식별자를 추가합니다.
    pub fn add_vulnerable_software_identifier(&mut self, identifier: Identifier) -> bool {
        self.vulnerable_software_identifiers.insert(identifier)
    }

    /// 취약 소프트웨어 식별자를 제거합니다.
    pub fn remove_vulnerable_software_identifier(&mut self, identifier: &Identifier) -> bool {
        self.vulnerable_software_identifiers.remove(identifier)
    }

    /// 소프트웨어 식별자를 추가합니다.
    pub fn add_software_identifier(&mut self, identifier: Identifier) -> bool {
        self.software_identifiers.insert(identifier)
    }

    /// 취약점을 추가합니다.
    pub fn add_vulnerability(&mut self, vulnerability: Vulnerability) -> bool {
        self.vulnerabilities.insert(vulnerability)
    }

    /// CPE 식별자를 파싱하여 반환합니다.
    pub fn cpes(&self) -> impl Iterator<Item = (&Identifier, Cpe)> {
        self.vulnerable_software_identifiers
            .iter()
            .filter(|i| i.kind == IdentifierKind::Cpe)
            .filter_map(|i| i.as_cpe().map(|cpe| (i, cpe)))
    }

    /// 이미 부착된 취약 소프트웨어 식별자 중 가장 높은 신뢰도
    pub fn best_identifier_confidence(&self) -> Option<Confidence> {
        self.vulnerable_software_identifiers
            .iter()
            .map(|i| i.confidence)
            .max()
    }

    /// 다른 컴포넌트를 관련 컴포넌트로 흡수합니다.
    ///
    /// 흡수되는 컴포넌트의 관련 목록은 평탄화되어 이 컴포넌트로 옮겨지고 비워집니다.
    pub fn add_related(&mut self, mut other: Component) {
        let nested = std::mem::take(&mut other.related);
        self.related.push(other);
        for child in nested {
            self.add_related(child);
        }
    }

    /// 이 컴포넌트를 포함해 관련 컴포넌트 전체를 순회합니다.
    pub fn self_and_related(&self) -> impl Iterator<Item = &Component> {
        std::iter::once(self).chain(self.related.iter())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_path)
    }
}

fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_file_name() {
        let c = Component::new("/app/lib/struts2-core-2.3.20.jar");
        assert_eq!(c.file_name, "struts2-core-2.3.20.jar");
        assert_eq!(c.actual_file_path, c.file_path);
        assert_eq!(c.extension().as_deref(), Some("jar"));
    }

    #[test]
    fn extension_handles_dotfiles_and_case() {
        assert_eq!(Component::new("/x/Package.SWIFT").extension().as_deref(), Some("swift"));
        assert!(Component::new("/x/.npmrc").extension().is_none());
        assert!(Component::new("/x/Makefile").extension().is_none());
    }

    #[test]
    fn add_related_flattens() {
        let mut root = Component::new("/a.jar");
        let mut mid = Component::new("/b.jar");
        mid.add_related(Component::new("/c.jar"));
        mid.add_related(Component::new("/d.jar"));
        root.add_related(mid);

        assert_eq!(root.related.len(), 3);
        assert!(root.related.iter().all(|r| r.related.is_empty()));
        let paths: Vec<_> = root.related.iter().map(|r| r.file_path.as_str()).collect();
        assert_eq!(paths, vec!["/b.jar", "/c.jar", "/d.jar"]);
    }

    #[test]
    fn normalize_fills_derived_fields() {
        let mut c: Component =
            serde_json::from_str(r#"{"file_path": "/lib/commons-io-2.4.jar"}"#).unwrap();
        c.normalize();
        assert_eq!(c.actual_file_path, "/lib/commons-io-2.4.jar");
        assert_eq!(c.file_name, "commons-io-2.4.jar");
    }

    #[test]
    fn best_identifier_confidence() {
        let mut c = Component::new("/a.jar");
        assert!(c.best_identifier_confidence().is_none());
        let cpe = Cpe::application("apache", "struts", Some("2.3.20".to_owned()), None);
        c.add_vulnerable_software_identifier(Identifier::cpe(&cpe, Confidence::High, None));
        let cpe2 = Cpe::application("apache", "xwork", None, None);
        c.add_vulnerable_software_identifier(Identifier::cpe(&cpe2, Confidence::Low, None));
        assert_eq!(c.best_identifier_confidence(), Some(Confidence::High));
        assert_eq!(c.cpes().count(), 2);
    }

    #[test]
    fn virtual_flag_serializes_as_virtual() {
        let c = Component::new_virtual(
            "/app/package-lock.json?lodash",
            Ecosystem::Npm,
            "lodash",
            Some("4.17.21".to_owned()),
        );
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["virtual"], serde_json::Value::Bool(true));
        assert_eq!(json["ecosystem"], "npm");
    }
}
