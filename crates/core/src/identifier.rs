//! 식별자 — CPE, 패키지 URL, 일반 좌표
//!
//! [`Identifier`]의 유일성은 `(kind, value)` 기준입니다.
//! CPE 값은 2.2 URI 형식(`cpe:/a:vendor:product:version:update`)으로 저장됩니다.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Confidence;

/// 식별자 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    /// CPE 2.2 URI
    Cpe,
    /// 패키지 URL (pkg:type/namespace/name@version)
    Purl,
    /// 기타 좌표 (예: maven GAV)
    Generic,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpe => write!(f, "cpe"),
            Self::Purl => write!(f, "purl"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// 해석된 식별자
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    /// 종류
    pub kind: IdentifierKind,
    /// 값
    pub value: String,
    /// 참조 URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 신뢰도
    #[serde(default)]
    pub confidence: Confidence,
    /// 메모 (억제 규칙 등)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Identifier {
    /// CPE 식별자를 생성합니다.
    pub fn cpe(cpe: &Cpe, confidence: Confidence, url: Option<String>) -> Self {
        Self {
            kind: IdentifierKind::Cpe,
            value: cpe.to_uri(),
            url,
            confidence,
            notes: None,
        }
    }

    /// 패키지 URL 식별자를 생성합니다.
    pub fn purl(value: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            kind: IdentifierKind::Purl,
            value: value.into(),
            url: None,
            confidence,
            notes: None,
        }
    }

    /// 일반 좌표 식별자를 생성합니다.
    pub fn generic(value: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            kind: IdentifierKind::Generic,
            value: value.into(),
            url: None,
            confidence,
            notes: None,
        }
    }

    /// CPE 식별자라면 파싱된 CPE를 반환합니다.
    pub fn as_cpe(&self) -> Option<Cpe> {
        match self.kind {
            IdentifierKind::Cpe => Cpe::parse(&self.value),
            _ => None,
        }
    }

    /// 패키지 URL 식별자라면 파싱된 값을 반환합니다.
    pub fn as_purl(&self) -> Option<PackageUrl> {
        match self.kind {
            IdentifierKind::Purl => PackageUrl::parse(&self.value),
            _ => None,
        }
    }

    /// maven 좌표(`group:artifact:version`) 형태로 변환합니다.
    ///
    /// 패키지 URL은 GAV로 변환하고, 일반 좌표는 값을 그대로 사용합니다.
    pub fn to_gav(&self) -> Option<String> {
        match self.kind {
            IdentifierKind::Purl => self.as_purl().map(|p| p.to_gav()),
            IdentifierKind::Generic => Some(self.value.clone()),
            IdentifierKind::Cpe => None,
        }
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.value == other.value
    }
}

impl Eq for Identifier {}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.confidence)
    }
}

// ─── CPE ────────────────────────────────────────────────────────────

/// CPE 이름 (애플리케이션 파트 중심)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cpe {
    /// 파트 (`a`, `o`, `h`)
    pub part: String,
    /// 벤더
    pub vendor: String,
    /// 제품
    pub product: String,
    /// 버전
    pub version: Option<String>,
    /// 업데이트
    pub update: Option<String>,
}

impl Cpe {
    /// 애플리케이션 CPE를 생성합니다.
    pub fn application(
        vendor: impl Into<String>,
        product: impl Into<String>,
        version: Option<String>,
        update: Option<String>,
    ) -> Self {
        Self {
            part: "a".to_owned(),
            vendor: vendor.into(),
            product: product.into(),
            version: version.filter(|v| !v.is_empty()),
            update: update.filter(|u| !u.is_empty()),
        }
    }

    /// CPE 2.2 URI (`cpe:/a:...`) 또는 2.3 포맷 문자열(`cpe:2.3:a:...`)을 파싱합니다.
    pub fn parse(value: &str) -> Option<Self> {
        let fields: Vec<&str> = if let Some(rest) = value.strip_prefix("cpe:/") {
            rest.split(':').collect()
        } else if let Some(rest) = value.strip_prefix("cpe:2.3:") {
            rest.split(':').collect()
        } else {
            return None;
        };
        let field = |i: usize| -> Option<String> {
            fields
                .get(i)
                .filter(|s| !s.is_empty() && **s != "*")
                .map(|s| (*s).to_owned())
        };
        let part = field(0)?;
        let vendor = field(1)?;
        let product = field(2)?;
        Some(Self {
            part,
            vendor,
            product,
            version: field(3),
            update: field(4),
        })
    }

    /// CPE 2.2 URI로 직렬화합니다. 빈 뒤쪽 필드는 생략합니다.
    pub fn to_uri(&self) -> String {
        let mut uri = format!("cpe:/{}:{}:{}", self.part, self.vendor, self.product);
        match (&self.version, &self.update) {
            (Some(version), Some(update)) => {
                uri.push(':');
                uri.push_str(version);
                uri.push(':');
                uri.push_str(update);
            }
            (Some(version), None) => {
                uri.push(':');
                uri.push_str(version);
            }
            (None, Some(update)) => {
                uri.push_str("::");
                uri.push_str(update);
            }
            (None, None) => {}
        }
        uri
    }

    /// 벤더와 제품이 같은지 확인합니다.
    pub fn same_product(&self, other: &Cpe) -> bool {
        self.vendor == other.vendor && self.product == other.product
    }
}

impl fmt::Display for Cpe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

// ─── Package URL ────────────────────────────────────────────────────

/// 파싱된 패키지 URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageUrl {
    /// 패키지 유형 (maven, npm, nuget, ...)
    pub package_type: String,
    /// 네임스페이스 (maven groupId, npm scope)
    pub namespace: Option<String>,
    /// 이름
    pub name: String,
    /// 버전
    pub version: Option<String>,
}

impl PackageUrl {
    /// 패키지 URL을 생성합니다.
    pub fn new(
        package_type: impl Into<String>,
        namespace: Option<String>,
        name: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            package_type: package_type.into(),
            namespace,
            name: name.into(),
            version,
        }
    }

    /// `pkg:type/namespace/name@version?qualifiers#subpath` 형식을 파싱합니다.
    ///
    /// 한정자와 하위 경로는 무시합니다.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.strip_prefix("pkg:")?;
        let rest = rest.split(['?', '#']).next().unwrap_or(rest);
        let (path, version) = match rest.rsplit_once('@') {
            Some((path, version)) if !version.is_empty() => {
                (path, Some(decode(version)))
            }
            Some((path, _)) => (path, None),
            None => (rest, None),
        };
        let (package_type, remainder) = path.split_once('/')?;
        if package_type.is_empty() || remainder.is_empty() {
            return None;
        }
        let (namespace, name) = match remainder.rsplit_once('/') {
            Some((ns, name)) => (Some(decode(ns)), decode(name)),
            None => (None, decode(remainder)),
        };
        if name.is_empty() {
            return None;
        }
        Some(Self {
            package_type: package_type.to_lowercase(),
            namespace: namespace.filter(|n| !n.is_empty()),
            name,
            version,
        })
    }

    /// maven 좌표 `group:artifact:version` 형태
    pub fn to_gav(&self) -> String {
        let mut gav = String::new();
        if let Some(ns) = &self.namespace {
            gav.push_str(ns);
            gav.push(':');
        }
        gav.push_str(&self.name);
        if let Some(version) = &self.version {
            gav.push(':');
            gav.push_str(version);
        }
        gav
    }
}

impl fmt::Display for PackageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkg:{}/", self.package_type)?;
        if let Some(ns) = &self.namespace {
            write!(f, "{}/", encode_segment(ns))?;
        }
        write!(f, "{}", encode_segment(&self.name))?;
        if let Some(version) = &self.version {
            write!(f, "@{}", encode_segment(version))?;
        }
        Ok(())
    }
}

fn decode(segment: &str) -> String {
    // purl 경로 세그먼트는 '@'를 %40으로 인코딩한다 (npm scope)
    segment.replace("%40", "@").replace("%2F", "/").replace("%2f", "/")
}

fn encode_segment(segment: &str) -> String {
    segment.replace('@', "%40")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpe_uri_roundtrip_with_update() {
        let cpe = Cpe::application(
            "apache",
            "struts",
            Some("2.3.20".to_owned()),
            Some("beta".to_owned()),
        );
        assert_eq!(cpe.to_uri(), "cpe:/a:apache:struts:2.3.20:beta");
        assert_eq!(Cpe::parse(&cpe.to_uri()), Some(cpe));
    }

    #[test]
    fn cpe_without_version() {
        let cpe = Cpe::application("jquery", "jquery", None, None);
        assert_eq!(cpe.to_uri(), "cpe:/a:jquery:jquery");
        let parsed = Cpe::parse("cpe:/a:jquery:jquery").unwrap();
        assert!(parsed.version.is_none());
    }

    #[test]
    fn cpe_parse_23_format() {
        let parsed = Cpe::parse("cpe:2.3:a:apache:struts:2.3.20:*:*:*:*:*:*:*").unwrap();
        assert_eq!(parsed.vendor, "apache");
        assert_eq!(parsed.version.as_deref(), Some("2.3.20"));
        assert!(parsed.update.is_none());
    }

    #[test]
    fn cpe_parse_rejects_garbage() {
        assert!(Cpe::parse("pkg:maven/a/b@1").is_none());
        assert!(Cpe::parse("cpe:/a:vendor").is_none());
    }

    #[test]
    fn identifier_identity_is_kind_and_value() {
        let a = Identifier::purl("pkg:npm/lodash@4.17.21", Confidence::Highest);
        let mut b = a.clone();
        b.confidence = Confidence::Low;
        b.url = Some("https://example.invalid".to_owned());
        assert_eq!(a, b);
        let c = Identifier::generic("pkg:npm/lodash@4.17.21", Confidence::Highest);
        assert_ne!(a, c);
    }

    #[test]
    fn purl_parse_maven() {
        let purl = PackageUrl::parse("pkg:maven/org.apache.struts/struts2-core@2.3.20").unwrap();
        assert_eq!(purl.package_type, "maven");
        assert_eq!(purl.namespace.as_deref(), Some("org.apache.struts"));
        assert_eq!(purl.name, "struts2-core");
        assert_eq!(purl.version.as_deref(), Some("2.3.20"));
        assert_eq!(purl.to_gav(), "org.apache.struts:struts2-core:2.3.20");
    }

    #[test]
    fn purl_parse_scoped_npm() {
        let purl = PackageUrl::parse("pkg:npm/%40angular/core@12.0.0").unwrap();
        assert_eq!(purl.namespace.as_deref(), Some("@angular"));
        assert_eq!(purl.name, "core");
        assert_eq!(purl.to_string(), "pkg:npm/%40angular/core@12.0.0");
    }

    #[test]
    fn purl_parse_without_version() {
        let purl = PackageUrl::parse("pkg:npm/lodash").unwrap();
        assert_eq!(purl.name, "lodash");
        assert!(purl.version.is_none());
        assert!(PackageUrl::parse("pkg:npm").is_none());
    }

    #[test]
    fn identifier_to_gav() {
        let id = Identifier::purl("pkg:maven/org.springframework/spring-core@5.3.1", Confidence::High);
        assert_eq!(
            id.to_gav().as_deref(),
            Some("org.springframework:spring-core:5.3.1")
        );
        let cpe = Identifier::cpe(
            &Cpe::application("pivotal", "spring", None, None),
            Confidence::Low,
            None,
        );
        assert!(cpe.to_gav().is_none());
    }
}
