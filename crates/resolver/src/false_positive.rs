//! 오탐 필터 -- 식별 직후 알려진 잘못된 CPE를 제거하고 누락된 별칭을 보충합니다.
//!
//! # 패스 순서
//! ```text
//! JRE/런타임 ─▶ 알려진 오매칭 ─▶ Spring 벤더 ─▶ axis/axis2 ─▶ 접두 버전 정리 ─▶ 별칭 보충
//! ```
//!
//! 아카이브 내부 중복 제거는 모든 컴포넌트가 필요하므로
//! 장벽 이후 [`ArchiveDuplicateFilter`]가 수행합니다.
//! 어떤 패스도 증거는 건드리지 않습니다.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use metrics::counter;

use ironcheck_core::component::Component;
use ironcheck_core::context::AnalysisContext;
use ironcheck_core::error::IroncheckError;
use ironcheck_core::identifier::{Cpe, Identifier};
use ironcheck_core::metrics as m;
use ironcheck_core::pipeline::{AnalysisPhase, Analyzer, GlobalAnalyzer};
use ironcheck_core::types::EvidenceType;

use crate::identifier::{nvd_broad_search_url, nvd_search_url};
use crate::patterns::{self, StaticRegex};

static RX_CORE_JAVA: StaticRegex = LazyLock::new(|| {
    patterns::compile(
        r"^cpe:/a:(sun|oracle|ibm):(j2[ems]e|java(_platform_micro_edition|_runtime_environment|_se|virtual_machine|se_development_kit|fx)?|jdk|jre|jsse)($|:.*)",
    )
});

static RX_CORE_JAVA_JSF: StaticRegex =
    LazyLock::new(|| patterns::compile(r"^cpe:/a:(sun|oracle|ibm):jsf($|:.*)"));

static RX_CORE_FILES: StaticRegex = LazyLock::new(|| {
    patterns::compile(r"(^|/)((alt[-])?rt|jsse|jfxrt|jfr|jce|javaws|deploy|charsets)\.jar$")
});

static RX_CORE_JSF_FILES: StaticRegex =
    LazyLock::new(|| patterns::compile(r"(^|/)jsf[-][^/]*\.jar$"));

static RX_MAVEN_CORE: StaticRegex =
    LazyLock::new(|| patterns::compile(r"^maven-core-[\d.]+\.jar$"));

static RX_JBOSS: StaticRegex = LazyLock::new(|| patterns::compile(r"^jboss-?[\d.-]+(ga)?\.jar$"));

/// 일반 이름 오매칭을 제거할 라이브러리/아카이브 확장자
const LIBRARY_SUFFIXES: &[&str] = &[
    ".jar", "pom.xml", ".dll", ".exe", ".nuspec", ".zip", ".sar", ".apk", ".tar", ".gz", ".tgz",
    ".rpm", ".ear", ".war",
];

/// JavaScript 라이브러리 오매칭을 제거할 확장자
const BINARY_SUFFIXES: &[&str] = &[".jar", "pom.xml", ".dll", ".exe"];

/// 오피스 제품 오매칭을 제거할 확장자
const JAVA_ARCHIVE_SUFFIXES: &[&str] = &[".jar", ".ear", ".war", "pom.xml"];

/// 이름이 흔한 단어라 자주 잘못 매칭되는 벤더=제품
const GENERIC_PRODUCTS: &[&str] = &["file", "mozilla", "cvs", "ftp", "tcp", "ssh", "lookup"];

const JS_LIBRARIES: &[(&str, &str)] = &[
    ("jquery", "jquery"),
    ("prototypejs", "prototype"),
    ("yahoo", "yui"),
];

const OFFICE_PRODUCTS: &[(&str, &str)] = &[
    ("microsoft", "excel"),
    ("microsoft", "word"),
    ("microsoft", "visio"),
    ("microsoft", "powerpoint"),
    ("microsoft", "office"),
    ("core_ftp", "core_ftp"),
];

const SPRING_PREFIX: &str = "org.springframework.";

fn ends_with_any(file_name: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|s| file_name.ends_with(s))
}

fn is_pair(cpe: &Cpe, pairs: &[(&str, &str)]) -> bool {
    pairs
        .iter()
        .any(|(v, p)| cpe.vendor == *v && cpe.product == *p)
}

/// 식별자를 제거하고 제거 수를 기록합니다.
fn remove_identifiers(component: &mut Component, remove: BTreeSet<Identifier>, pass: &str) {
    if remove.is_empty() {
        return;
    }
    for identifier in remove {
        if component.remove_vulnerable_software_identifier(&identifier) {
            tracing::debug!(
                component = %component,
                identifier = %identifier.value,
                pass,
                "removed false positive identifier"
            );
            counter!(m::IDENTIFIERS_SUPPRESSED_TOTAL, m::LABEL_ANALYZER => "false_positive")
                .increment(1);
        }
    }
}

/// JRE 구성 파일이 아닌 컴포넌트에서 JRE/JDK CPE를 제거합니다.
pub fn remove_jre_entries(component: &mut Component) {
    let file_name = component.file_name.as_str();
    let core_file = patterns::is_match(&RX_CORE_FILES, file_name);
    let jsf_file = patterns::is_match(&RX_CORE_JSF_FILES, file_name);
    let remove: BTreeSet<Identifier> = component
        .vulnerable_software_identifiers
        .iter()
        .filter(|i| {
            (patterns::is_match(&RX_CORE_JAVA, &i.value) && !core_file)
                || (patterns::is_match(&RX_CORE_JAVA_JSF, &i.value) && !jsf_file)
        })
        .cloned()
        .collect();
    remove_identifiers(component, remove, "jre");
}

fn has_m_core_evidence(component: &Component) -> bool {
    component
        .evidence
        .contains_value(EvidenceType::Product, "m-core")
        || component
            .evidence
            .contains_value(EvidenceType::Vendor, "m-core")
}

fn is_bad_match(component: &Component, cpe: &Cpe, file_name: &str) -> bool {
    if (cpe.product.contains("c++")
        || (cpe.vendor == cpe.product && GENERIC_PRODUCTS.contains(&cpe.vendor.as_str())))
        && ends_with_any(file_name, LIBRARY_SUFFIXES)
    {
        return true;
    }
    if is_pair(cpe, JS_LIBRARIES) && ends_with_any(file_name, BINARY_SUFFIXES) {
        return true;
    }
    if is_pair(cpe, OFFICE_PRODUCTS) && ends_with_any(file_name, JAVA_ARCHIVE_SUFFIXES) {
        return true;
    }
    match (cpe.vendor.as_str(), cpe.product.as_str()) {
        ("apache", "maven") => !patterns::is_match(&RX_MAVEN_CORE, file_name),
        ("m-core", "m-core") => !has_m_core_evidence(component),
        ("jboss", "jboss") => !patterns::is_match(&RX_JBOSS, file_name),
        ("java-websocket_project", "java-websocket") => !component
            .software_identifiers
            .iter()
            .any(|i| {
                i.value
                    .to_lowercase()
                    .contains("org.java-websocket/java-websocket")
            }),
        _ => false,
    }
}

/// 이름이 흔하거나 생태계가 다른 알려진 오매칭을 제거합니다.
pub fn remove_bad_matches(component: &mut Component) {
    let file_name = component.file_name.to_lowercase();
    let remove: BTreeSet<Identifier> = component
        .cpes()
        .filter(|(_, cpe)| is_bad_match(component, cpe, &file_name))
        .map(|(i, _)| i.clone())
        .collect();
    remove_identifiers(component, remove, "bad_match");
}

/// Spring 모듈 GAV와 맞지 않는 springsource CPE를 제거합니다.
pub fn remove_bad_spring_matches(component: &mut Component) {
    let must_contain = component
        .software_identifiers
        .iter()
        .filter_map(Identifier::to_gav)
        .find_map(|gav| {
            let rest = gav.strip_prefix(SPRING_PREFIX)?;
            let end = rest.find(':')?;
            Some(rest[..end].to_lowercase())
        });
    let Some(must_contain) = must_contain else {
        return;
    };
    let remove: BTreeSet<Identifier> = component
        .vulnerable_software_identifiers
        .iter()
        .filter(|i| {
            i.value.starts_with("cpe:/a:springsource:")
                && !i.value.to_lowercase().contains(&must_contain)
        })
        .cloned()
        .collect();
    remove_identifiers(component, remove, "spring");
}

/// axis와 axis2가 서로의 CPE를 받은 경우를 바로잡습니다.
pub fn remove_wrong_version_matches(component: &mut Component) {
    let wrong_product = if component.file_name.contains("axis2") {
        "axis"
    } else if component.file_name.contains("axis") {
        "axis2"
    } else {
        return;
    };
    let remove: BTreeSet<Identifier> = component
        .cpes()
        .filter(|(_, cpe)| cpe.vendor == "apache" && cpe.product == wrong_product)
        .map(|(i, _)| i.clone())
        .collect();
    remove_identifiers(component, remove, "wrong_version");
}

/// 같은 벤더/제품 CPE 중 다른 버전의 접두인 쪽을 제거합니다.
///
/// 버전이 없거나 `-`인 쪽은 버전이 있는 쪽에 밀려 제거됩니다.
pub fn remove_spurious_cpes(component: &mut Component) {
    let ids: Vec<(Identifier, Cpe)> = component
        .cpes()
        .map(|(i, cpe)| (i.clone(), cpe))
        .collect();
    let mut remove = BTreeSet::new();
    for (idx, (current_id, current)) in ids.iter().enumerate() {
        for (next_id, next) in &ids[idx + 1..] {
            if current.vendor != next.vendor || current.product != next.product {
                continue;
            }
            match (current.version.as_deref(), next.version.as_deref()) {
                (None, None) => {}
                (None, Some(_)) => {
                    remove.insert(current_id.clone());
                }
                (Some(_), None) => {
                    remove.insert(next_id.clone());
                }
                (Some(cv), Some(nv)) if cv.len() < nv.len() => {
                    if nv.starts_with(cv) || cv == "-" {
                        remove.insert(current_id.clone());
                    }
                }
                (Some(cv), Some(nv)) => {
                    if cv.starts_with(nv) || nv == "-" {
                        remove.insert(next_id.clone());
                    }
                }
            }
        }
    }
    remove_identifiers(component, remove, "spurious");
}

fn alias(vendor: &str, product: &str, version: Option<&str>, from: &Identifier) -> Identifier {
    let url = match version {
        Some(v) => nvd_search_url(vendor, product, v),
        None => nvd_broad_search_url(vendor, product),
    };
    let cpe = Cpe::application(vendor, product, version.map(str::to_owned), None);
    Identifier::cpe(&cpe, from.confidence, Some(url))
}

/// 데이터베이스가 다른 이름으로 등록한 제품의 CPE를 추가합니다.
pub fn add_false_negative_cpes(component: &mut Component) {
    let mut add = Vec::new();
    for (identifier, cpe) in component.cpes() {
        let version = cpe.version.as_deref();
        if matches!(cpe.vendor.as_str(), "sun" | "oracle")
            && matches!(cpe.product.as_str(), "opensso" | "opensso_enterprise")
        {
            for (vendor, product) in [
                ("sun", "opensso_enterprise"),
                ("oracle", "opensso_enterprise"),
                ("sun", "opensso"),
                ("oracle", "opensso"),
            ] {
                add.push(alias(vendor, product, version, identifier));
            }
        }
        if cpe.vendor == "apache" && cpe.product == "santuario_xml_security_for_java" {
            add.push(alias("apache", "xml_security_for_java", version, identifier));
        }
    }
    for identifier in add {
        component.add_vulnerable_software_identifier(identifier);
    }
}

/// 컴포넌트 단위 오탐 필터
pub struct FalsePositiveFilter;

impl FalsePositiveFilter {
    /// 모든 컴포넌트 단위 패스를 순서대로 적용합니다.
    pub fn apply(component: &mut Component) {
        remove_jre_entries(component);
        remove_bad_matches(component);
        remove_bad_spring_matches(component);
        remove_wrong_version_matches(component);
        remove_spurious_cpes(component);
        add_false_negative_cpes(component);
    }
}

impl Analyzer for FalsePositiveFilter {
    fn name(&self) -> &str {
        "false_positive"
    }

    fn phase(&self) -> AnalysisPhase {
        AnalysisPhase::PostIdentifierAnalysis
    }

    fn accepts(&self, component: &Component) -> bool {
        !component.vulnerable_software_identifiers.is_empty()
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

// ─── 아카이브 내부 중복 ─────────────────────────────────────────────

/// CPE 벤더/제품 쌍
fn product_pairs(component: &Component) -> BTreeSet<(String, String)> {
    component
        .cpes()
        .map(|(_, cpe)| (cpe.vendor, cpe.product))
        .collect()
}

/// 아카이브에서 추출된 컴포넌트가 컨테이너와 같은 제품만 식별했다면 제거합니다.
pub struct ArchiveDuplicateFilter;

impl ArchiveDuplicateFilter {
    /// 제거 대상 인덱스를 찾습니다.
    fn duplicates(components: &[Component]) -> BTreeSet<usize> {
        let pairs: Vec<BTreeSet<(String, String)>> =
            components.iter().map(product_pairs).collect();
        let mut remove = BTreeSet::new();
        for (idx, inner) in components.iter().enumerate() {
            if pairs[idx].is_empty() {
                continue;
            }
            let contained = components.iter().enumerate().any(|(cidx, container)| {
                cidx != idx
                    && !remove.contains(&cidx)
                    && !container.actual_file_path.is_empty()
                    && inner
                        .file_path
                        .strip_prefix(container.actual_file_path.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
                    && pairs[idx].is_subset(&pairs[cidx])
            });
            if contained {
                remove.insert(idx);
            }
        }
        remove
    }
}

impl GlobalAnalyzer for ArchiveDuplicateFilter {
    fn name(&self) -> &str {
        "archive_duplicate"
    }

    fn phase(&self) -> AnalysisPhase {
        AnalysisPhase::PostIdentifierAnalysis
    }

    fn process_all(
        &self,
        components: &mut Vec<Component>,
        _ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        let remove = Self::duplicates(components);
        if remove.is_empty() {
            return Ok(());
        }
        let mut idx = 0;
        components.retain(|c| {
            let keep = !remove.contains(&idx);
            if !keep {
                tracing::debug!(component = %c, "removed duplicate identified inside its archive");
            }
            idx += 1;
            keep
        });
        counter!(m::IDENTIFIERS_SUPPRESSED_TOTAL, m::LABEL_ANALYZER => "archive_duplicate")
            .increment(remove.len() as u64);
        Ok(())
    }
}
