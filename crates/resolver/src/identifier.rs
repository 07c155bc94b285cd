//! 식별자 해석 -- 검증된 벤더/제품에 대해 구체적인 CPE를 선택합니다.
//!
//! 데이터베이스의 버전 레코드와 컴포넌트의 버전 증거를 비교하여
//! 정확 일치, 최선 추정, 광역 일치 후보를 모은 뒤 순위를 매겨 최상위 그룹만 부착합니다.
//! 부착 직후 억제 규칙을 적용하므로 억제된 후보는 "추가됨"으로 세지 않습니다.

use std::fmt;
use std::sync::LazyLock;

use metrics::counter;

use ironcheck_core::component::Component;
use ironcheck_core::error::DatabaseError;
use ironcheck_core::identifier::{Cpe, Identifier};
use ironcheck_core::metrics as m;
use ironcheck_core::pipeline::{Suppressor, VulnerabilityDatabase};
use ironcheck_core::types::{Confidence, Ecosystem, EvidenceType, VulnerableSoftwareRecord};

use crate::patterns::{self, StaticRegex};
use crate::verify::is_stop_word;
use crate::version::{self, StructuredVersion};

/// 버전 증거의 업데이트 한정자
static RX_UPDATE: StaticRegex = LazyLock::new(|| {
    patterns::compile(r"^(v|release|final|snapshot|beta|alpha|u|rc|m|20\d\d).*$")
});

/// 선언 버전의 업데이트 한정자 (더 넓은 목록)
static RX_DECLARED_UPDATE: StaticRegex = LazyLock::new(|| {
    patterns::compile(
        r"^(v|final|release|snapshot|r|b|beta|a|alpha|u|rc|sp|dev|revision|service|build|pre|p|patch|update|m|20\d\d).*$",
    )
});

/// `v` 뒤에 숫자가 오는 업데이트
static RX_V_DIGIT: StaticRegex = LazyLock::new(|| patterns::compile(r"^v\d.*$"));

const NVD_SEARCH_BASE: &str =
    "https://nvd.nist.gov/vuln/search/results?form_type=Advanced&results_type=overview&search_type=all";

/// 특정 버전의 NVD 검색 URL
pub fn nvd_search_url(vendor: &str, product: &str, version: &str) -> String {
    let v = urlencoding::encode(vendor);
    let p = urlencoding::encode(product);
    let ver = urlencoding::encode(version);
    format!(
        "{NVD_SEARCH_BASE}&cpe_vendor=cpe%3A%2F%3A{v}&cpe_product=cpe%3A%2F%3A{v}%3A{p}&cpe_version=cpe%3A%2F%3A{v}%3A{p}%3A{ver}"
    )
}

/// 모든 버전을 대상으로 하는 NVD 검색 URL
pub fn nvd_broad_search_url(vendor: &str, product: &str) -> String {
    let v = urlencoding::encode(vendor);
    let p = urlencoding::encode(product);
    format!("{NVD_SEARCH_BASE}&cpe_vendor=cpe%3A%2F%3A{v}&cpe_product=cpe%3A%2F%3A{v}%3A{p}")
}

/// 식별 결과의 품질 등급 (작을수록 좋음)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchKind {
    /// 버전이 정확히 일치
    ExactMatch,
    /// 부분 일치로 추정한 버전
    BestGuess,
    /// 버전 없는 레코드 (모든 버전 영향)
    BroadMatch,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactMatch => write!(f, "exact"),
            Self::BestGuess => write!(f, "best_guess"),
            Self::BroadMatch => write!(f, "broad"),
        }
    }
}

/// 순위를 매길 후보
#[derive(Debug, Clone)]
struct IdentifierMatch {
    kind: MatchKind,
    cpe: Cpe,
    url: Option<String>,
    confidence: Confidence,
}

impl IdentifierMatch {
    fn value(&self) -> String {
        self.cpe.to_uri()
    }
}

fn record_cpe(record: &VulnerableSoftwareRecord) -> Cpe {
    Cpe::application(
        record.vendor.clone(),
        record.product.clone(),
        record.version.clone().filter(|v| v != "*"),
        record.update.clone().filter(|u| u != "*"),
    )
}

/// 컴포넌트 생태계에 맞는 레코드만 남깁니다. iOS는 native 레코드도 허용합니다.
pub fn filter_ecosystem(
    ecosystem: Option<Ecosystem>,
    records: Vec<VulnerableSoftwareRecord>,
) -> Vec<VulnerableSoftwareRecord> {
    let Some(ecosystem) = ecosystem else {
        return records;
    };
    records
        .into_iter()
        .filter(|r| match r.ecosystem {
            None => true,
            Some(e) if e == ecosystem => true,
            Some(Ecosystem::Native) => ecosystem == Ecosystem::Ios,
            Some(_) => false,
        })
        .collect()
}

/// 마지막 부분이 업데이트 한정자면 `(버전, 업데이트)`로 나눕니다.
///
/// `v` 뒤에 숫자가 오는 업데이트는 `v`를 뗍니다.
fn split_update(version: &StructuredVersion, rx: &StaticRegex, min_index: usize) -> (String, Option<String>) {
    let parts = version.parts();
    if let Some((last, head)) = parts.split_last() {
        if head.len() >= min_index && patterns::is_match(rx, last) {
            let update = if patterns::is_match(&RX_V_DIGIT, last) {
                last[1..].to_owned()
            } else {
                last.clone()
            };
            return (head.join("."), Some(update));
        }
    }
    (version.to_string(), None)
}

/// 검증된 벤더/제품에 대해 식별자를 해석합니다.
pub struct IdentifierResolver<'a> {
    database: &'a dyn VulnerabilityDatabase,
    suppressor: Option<&'a dyn Suppressor>,
}

impl<'a> IdentifierResolver<'a> {
    /// 새 해석기를 생성합니다.
    pub fn new(
        database: &'a dyn VulnerabilityDatabase,
        suppressor: Option<&'a dyn Suppressor>,
    ) -> Self {
        Self {
            database,
            suppressor,
        }
    }

    /// 선언 버전으로 정확 일치 후보를 만듭니다.
    ///
    /// 제품의 모든 영숫자 단어가 컴포넌트 이름에 포함되거나 불용어일 때만 사용합니다.
    fn consider_declared_version(
        component: &Component,
        vendor: &str,
        product: &str,
        confidence: Confidence,
        collected: &mut Vec<IdentifierMatch>,
    ) {
        let Some(declared) = component.version.as_deref().filter(|v| !v.is_empty()) else {
            return;
        };
        if let Some(name) = component.name.as_deref().filter(|n| !n.is_empty()) {
            let usable = product
                .split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|w| !w.is_empty())
                .all(|w| name.contains(w) || is_stop_word(w));
            if !usable {
                return;
            }
        }

        let version = StructuredVersion::new(declared);
        if version.is_empty() {
            return;
        }
        let (ver, update) = split_update(&version, &RX_DECLARED_UPDATE, 1);
        let cpe = Cpe::application(vendor, product, Some(ver.clone()), update);
        collected.push(IdentifierMatch {
            kind: MatchKind::ExactMatch,
            url: Some(nvd_search_url(vendor, product, &ver)),
            cpe,
            confidence,
        });
    }

    /// 식별자를 결정하여 컴포넌트에 부착합니다.
    ///
    /// 억제 규칙을 통과한 식별자가 하나라도 있으면 `true`를 반환합니다.
    ///
    /// # Errors
    ///
    /// 데이터베이스 조회 실패 시 `DatabaseError`
    pub fn resolve(
        &self,
        component: &mut Component,
        vendor: &str,
        product: &str,
        current_confidence: Confidence,
    ) -> Result<bool, DatabaseError> {
        let records = filter_ecosystem(
            component.ecosystem,
            self.database.records_for(vendor, product)?,
        );
        if records.is_empty() {
            return Ok(false);
        }

        let mut best_guess = if component.ecosystem == Some(Ecosystem::Golang)
            && component.version.is_none()
        {
            StructuredVersion::from_parts(["*"])
        } else {
            StructuredVersion::from_parts(["-"])
        };
        let mut best_guess_update: Option<String> = None;
        let mut best_guess_conf: Option<Confidence> = None;
        let mut best_guess_url: Option<String> = None;
        let mut collected: Vec<IdentifierMatch> = Vec::new();

        Self::consider_declared_version(
            component,
            vendor,
            product,
            current_confidence,
            &mut collected,
        );

        // 같은 등급에서 먼저 정한 추정은 바꾸지 않는다
        let improves = |best: Option<Confidence>, conf: Confidence| best.is_none_or(|b| conf > b);

        for conf in Confidence::DESCENDING {
            for evidence in component.evidence.evidence_at(EvidenceType::Version, conf) {
                let Some(ev_ver) = version::parse_version(&evidence.value, true) else {
                    continue;
                };
                let mut ev_base: Option<StructuredVersion> = None;
                let mut ev_update: Option<String> = None;
                if let Some((last, head)) = ev_ver.parts().split_last() {
                    if patterns::is_match(&RX_UPDATE, last) {
                        ev_update = Some(last.clone());
                        ev_base = Some(StructuredVersion::from_parts(head.iter().cloned()));
                    }
                }

                for record in &records {
                    let db_ver = record.version.as_deref().and_then(version::parse);
                    let Some(db_ver) = db_ver else {
                        let url = nvd_broad_search_url(&record.vendor, &record.product);
                        collected.push(IdentifierMatch {
                            kind: MatchKind::BroadMatch,
                            cpe: record_cpe(record),
                            url: Some(url),
                            confidence: conf,
                        });
                        continue;
                    };
                    let record_version = record.version.as_deref().unwrap_or_default();
                    let db_ver_update = match record.update.as_deref() {
                        Some(u) if !u.is_empty() && !u.starts_with('*') && !u.starts_with('-') => {
                            version::parse_version(&format!("{record_version}.{u}"), true)
                        }
                        _ => Some(db_ver.clone()),
                    };

                    if ev_ver == db_ver {
                        let mut cpe = record_cpe(record);
                        if ev_update.is_some() && record.update.as_deref() == Some("*") {
                            cpe.update = ev_update.clone();
                        }
                        collected.push(IdentifierMatch {
                            kind: MatchKind::ExactMatch,
                            cpe,
                            url: Some(nvd_search_url(
                                &record.vendor,
                                &record.product,
                                record_version,
                            )),
                            confidence: conf,
                        });
                    } else if ev_base.as_ref().is_some_and(|b| *b == db_ver)
                        && improves(best_guess_conf, conf)
                    {
                        best_guess_conf = Some(conf);
                        best_guess = db_ver;
                        best_guess_update = ev_update.clone();
                        best_guess_url = Some(nvd_search_url(
                            &record.vendor,
                            &record.product,
                            record_version,
                        ));
                    } else if let Some(with_update) = db_ver_update.as_ref() {
                        if ev_ver.len() <= with_update.len()
                            && ev_ver.matches_at_least_three_levels(with_update)
                            && improves(best_guess_conf, conf)
                            && best_guess.len() < db_ver.len()
                        {
                            best_guess = db_ver;
                            best_guess_update = ev_update.clone();
                            best_guess_conf = Some(conf);
                        }
                    }
                }

                if improves(best_guess_conf, conf) && best_guess.len() < ev_ver.len() {
                    best_guess = ev_ver;
                    best_guess_update = ev_update;
                    best_guess_conf = Some(conf);
                }
            }
        }

        let (guess_version, guess_update) = match split_update(&best_guess, &RX_UPDATE, 0) {
            (version, Some(update)) => (version, Some(update)),
            (version, None) => (version, best_guess_update),
        };
        if guess_version != "-" && !guess_version.is_empty() {
            collected.push(IdentifierMatch {
                kind: MatchKind::BestGuess,
                cpe: Cpe::application(vendor, product, Some(guess_version), guess_update),
                url: best_guess_url,
                confidence: best_guess_conf.unwrap_or(Confidence::Low),
            });
        }

        Ok(self.attach_best(component, collected))
    }

    /// 후보 순위를 매기고 최상위 그룹을 부착합니다.
    fn attach_best(&self, component: &mut Component, mut collected: Vec<IdentifierMatch>) -> bool {
        if collected.is_empty() {
            return false;
        }
        collected.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then_with(|| b.confidence.cmp(&a.confidence))
                .then_with(|| a.value().cmp(&b.value()))
        });
        collected.dedup_by(|a, b| {
            a.kind == b.kind && a.confidence == b.confidence && a.value() == b.value()
        });

        let best_kind = collected[0].kind;
        let best_conf = collected[0].confidence;
        let previous_best = component.best_identifier_confidence();
        let mut added = false;

        for candidate in collected
            .into_iter()
            .take_while(|c| c.kind == best_kind && c.confidence == best_conf)
        {
            let confidence = if best_kind == MatchKind::BestGuess {
                Confidence::Low
            } else {
                best_conf
            };
            if previous_best.is_some_and(|prev| prev > confidence) {
                continue;
            }

            let identifier = Identifier::cpe(&candidate.cpe, confidence, candidate.url);
            component.add_vulnerable_software_identifier(identifier.clone());
            if let Some(suppressor) = self.suppressor {
                suppressor.apply(component);
            }
            if component.vulnerable_software_identifiers.contains(&identifier) {
                tracing::debug!(
                    component = %component,
                    cpe = %identifier.value,
                    confidence = %confidence,
                    kind = %best_kind,
                    "identifier added"
                );
                counter!(m::IDENTIFIERS_ADDED_TOTAL, m::LABEL_MATCH => best_kind.to_string())
                    .increment(1);
                added = true;
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryVulnerabilityDb;

    fn db() -> MemoryVulnerabilityDb {
        MemoryVulnerabilityDb::from_json(
            r#"{
                "software": [
                    { "vendor": "apache", "product": "struts", "version": "2.3.19" },
                    { "vendor": "apache", "product": "struts", "version": "2.3.20" },
                    { "vendor": "apache", "product": "struts", "version": "2.3.20.1" },
                    { "vendor": "example", "product": "libx" },
                    { "vendor": "oracle", "product": "mysql", "version": "5.1", "ecosystem": "native" },
                    { "vendor": "vendor", "product": "gotool", "version": "1.0", "ecosystem": "golang" },
                    { "vendor": "apache", "product": "log4j", "version": "1.2.17" }
                ]
            }"#,
        )
        .unwrap()
    }

    fn struts_component() -> Component {
        let mut c = Component::new("/app/WEB-INF/lib/struts2-core-2.3.20.jar");
        c.evidence.add_evidence(
            EvidenceType::Version,
            "file",
            "version",
            "2.3.20",
            Confidence::High,
        );
        c
    }

    #[test]
    fn exact_match_on_version_evidence() {
        let db = db();
        let resolver = IdentifierResolver::new(&db, None);
        let mut component = struts_component();

        let added = resolver
            .resolve(&mut component, "apache", "struts", Confidence::Highest)
            .unwrap();
        assert!(added);
        let ids: Vec<_> = component.vulnerable_software_identifiers.iter().collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].value, "cpe:/a:apache:struts:2.3.20");
        assert_eq!(ids[0].confidence, Confidence::High);
        assert!(ids[0].url.as_deref().is_some_and(|u| u.contains("cpe_version")));
    }

    #[test]
    fn version_guess_outranks_broad_match() {
        let db = db();
        let resolver = IdentifierResolver::new(&db, None);
        let mut component = Component::new("/lib/libx.so");
        component.evidence.add_evidence(
            EvidenceType::Version,
            "file",
            "version",
            "0.9.1",
            Confidence::Medium,
        );

        assert!(resolver
            .resolve(&mut component, "example", "libx", Confidence::High)
            .unwrap());
        // 정확/추정 후보가 없는 버전이므로 추정(0.9.1)이 광역 일치보다 우선한다
        let id = component.vulnerable_software_identifiers.iter().next().unwrap();
        assert_eq!(id.value, "cpe:/a:example:libx:0.9.1");
        assert_eq!(id.confidence, Confidence::Low);
    }

    #[test]
    fn broad_match_without_version_evidence() {
        let db = db();
        let resolver = IdentifierResolver::new(&db, None);
        let mut component = Component::new("/lib/libx.so");
        component.evidence.add_evidence(
            EvidenceType::Version,
            "file",
            "name",
            "libx",
            Confidence::Medium,
        );
        component.evidence.add_evidence(
            EvidenceType::Version,
            "file",
            "version",
            "-",
            Confidence::Low,
        );

        assert!(resolver
            .resolve(&mut component, "example", "libx", Confidence::High)
            .unwrap());
        let id = component.vulnerable_software_identifiers.iter().next().unwrap();
        assert_eq!(id.value, "cpe:/a:example:libx");
        assert!(id.url.as_deref().is_some_and(|u| !u.contains("cpe_version")));
    }

    #[test]
    fn declared_version_used_when_name_matches() {
        let db = db();
        let resolver = IdentifierResolver::new(&db, None);
        let mut component = Component::new("/app/lib/struts-2.3.20.1.jar");
        component.name = Some("struts".to_owned());
        component.version = Some("2.3.20.1".to_owned());

        assert!(resolver
            .resolve(&mut component, "apache", "struts", Confidence::Highest)
            .unwrap());
        let id = component.vulnerable_software_identifiers.iter().next().unwrap();
        assert_eq!(id.value, "cpe:/a:apache:struts:2.3.20.1");
        assert_eq!(id.confidence, Confidence::Highest);
    }

    #[test]
    fn declared_version_ignored_when_name_differs() {
        let db = db();
        let resolver = IdentifierResolver::new(&db, None);
        let mut component = Component::new("/app/lib/other.jar");
        component.name = Some("other".to_owned());
        component.version = Some("2.3.20".to_owned());

        // 버전 증거가 없고 선언 버전도 쓰지 않으므로 추정 후보도 없다
        assert!(!resolver
            .resolve(&mut component, "apache", "struts", Confidence::Highest)
            .unwrap());
        assert!(component.vulnerable_software_identifiers.is_empty());
    }

    #[test]
    fn ecosystem_filter_allows_native_for_ios() {
        let records = db().records_for("oracle", "mysql").unwrap();
        assert_eq!(filter_ecosystem(Some(Ecosystem::Ios), records.clone()).len(), 1);
        assert!(filter_ecosystem(Some(Ecosystem::Java), records.clone()).is_empty());
        assert_eq!(filter_ecosystem(None, records).len(), 1);
    }

    #[test]
    fn no_records_for_ecosystem_is_noop() {
        let db = db();
        let resolver = IdentifierResolver::new(&db, None);
        let mut component = struts_component();
        component.ecosystem = Some(Ecosystem::Java);
        assert!(!resolver
            .resolve(&mut component, "vendor", "gotool", Confidence::High)
            .unwrap());
    }

    #[test]
    fn golang_without_version_guesses_any() {
        let db = db();
        let resolver = IdentifierResolver::new(&db, None);
        let mut component = Component::new("/src/go.mod");
        component.ecosystem = Some(Ecosystem::Golang);

        assert!(resolver
            .resolve(&mut component, "vendor", "gotool", Confidence::High)
            .unwrap());
        let id = component.vulnerable_software_identifiers.iter().next().unwrap();
        assert_eq!(id.value, "cpe:/a:vendor:gotool:*");
        assert_eq!(id.confidence, Confidence::Low);
    }

    #[test]
    fn update_qualifier_is_split() {
        let db = db();
        let resolver = IdentifierResolver::new(&db, None);
        let mut component = Component::new("/lib/log4j.jar");
        component.evidence.add_evidence(
            EvidenceType::Version,
            "manifest",
            "version",
            "1.2.17-rc1",
            Confidence::High,
        );

        assert!(resolver
            .resolve(&mut component, "apache", "log4j", Confidence::High)
            .unwrap());
        let id = component.vulnerable_software_identifiers.iter().next().unwrap();
        // 기본 버전이 레코드와 일치하면 최선 추정이 된다
        assert_eq!(id.value, "cpe:/a:apache:log4j:1.2.17:rc1");
        assert_eq!(id.confidence, Confidence::Low);
    }

    #[test]
    fn worse_confidence_than_existing_is_skipped() {
        let db = db();
        let resolver = IdentifierResolver::new(&db, None);
        let mut component = struts_component();
        let existing = Cpe::application("apache", "tiles", Some("2.0".to_owned()), None);
        component.add_vulnerable_software_identifier(Identifier::cpe(
            &existing,
            Confidence::Highest,
            None,
        ));

        assert!(!resolver
            .resolve(&mut component, "apache", "struts", Confidence::High)
            .unwrap());
        assert_eq!(component.vulnerable_software_identifiers.len(), 1);
    }

    #[test]
    fn suppressed_identifier_is_not_counted() {
        struct DropAll;
        impl Suppressor for DropAll {
            fn apply(&self, component: &mut Component) -> usize {
                let n = component.vulnerable_software_identifiers.len();
                component.vulnerable_software_identifiers.clear();
                n
            }
        }
        let db = db();
        let resolver = IdentifierResolver::new(&db, Some(&DropAll));
        let mut component = struts_component();
        assert!(!resolver
            .resolve(&mut component, "apache", "struts", Confidence::High)
            .unwrap());
    }

    #[test]
    fn nvd_urls_are_encoded() {
        let url = nvd_search_url("apache", "struts", "2.3.20");
        assert!(url.ends_with("cpe_version=cpe%3A%2F%3Aapache%3Astruts%3A2.3.20"));
        let broad = nvd_broad_search_url("a b", "c/d");
        assert!(broad.contains("a%20b%3Ac%2Fd"));
    }
}
