//! 중복 번들링 -- 같은 소프트웨어를 가리키는 컴포넌트를 하나로 묶습니다.
//!
//! 모든 분석이 끝난 뒤 목록 전체에 대해 한 번 실행됩니다. 규칙은 순서대로
//! 평가되며 처음 일치한 규칙이 병합 방법을 결정합니다.
//!
//! 1. SHA-1 일치 (`.ear/`, `.war/` 내부 제외)
//! 2. 셰이딩된 jar와 그 `pom.xml`
//! 3. 웹 jar와 그 안의 스크립트
//! 4. 같은 CPE, 같은 경로 계열, 같은 취약점, 같은 파일 이름
//! 5. 같은 이름의 npm 패키지와 호환되는 버전

use std::sync::LazyLock;

use ironcheck_core::component::Component;
use ironcheck_core::context::AnalysisContext;
use ironcheck_core::error::IroncheckError;
use ironcheck_core::identifier::IdentifierKind;
use ironcheck_core::pipeline::{AnalysisPhase, GlobalAnalyzer};
use ironcheck_core::types::Ecosystem;

use crate::pairwise::{self, MergePlan, Survivor};
use crate::patterns::{self, StaticRegex};
use crate::version;

/// `.ear`/`.war` 아카이브 내부 경로
static RX_IN_WAR: StaticRegex = LazyLock::new(|| patterns::compile(r".*\.(ear|war)[\\/].*"));

/// 아카이브 파일 이름 (확장자 뒤에 내용이 이어지는 추출 경로)
static RX_ARCHIVE: StaticRegex =
    LazyLock::new(|| patterns::compile(r"^.*\.(tar|tgz|gz|zip|ear|war|rpm).+$"));

/// 파일 이름의 선두 영숫자
static RX_STARTING_TEXT: StaticRegex = LazyLock::new(|| patterns::compile(r"^[a-zA-Z0-9]*"));

/// 로컬 저장소 루트
static RX_REPOSITORY: StaticRegex =
    LazyLock::new(|| patterns::compile(r"[/\\](repository|local-repo)[/\\]"));

/// 핵심 모듈을 나타내는 이름 조각 (앞에 있을수록 우선)
const CORE_MARKERS: [&str; 7] = [
    "core",
    "kernel",
    "server",
    "project",
    "engine",
    "akka-stream",
    "netty-transport",
];

// ─── 경로 비교 ─────────────────────────────────────────────────────

/// 첫 번째 경로가 대표로 더 적합한지 판단합니다.
///
/// 임시 추출 경로(`dctemp`)는 지고, 그 외에는 `/`가 적은 쪽, 같으면 사전순으로
/// 앞선 쪽이 이깁니다.
pub fn first_path_is_shortest(left: &str, right: &str) -> bool {
    let left_temp = left.contains("dctemp");
    let right_temp = right.contains("dctemp");
    if left_temp != right_temp {
        return right_temp;
    }
    let left = left.replace('\\', "/");
    let right = right.replace('\\', "/");
    let left_depth = left.matches('/').count();
    let right_depth = right.matches('/').count();
    if left_depth == right_depth {
        left <= right
    } else {
        left_depth < right_depth
    }
}

fn contained_in_war(path: &str) -> bool {
    patterns::is_match(&RX_IN_WAR, path)
}

fn parent_of(path: &str) -> Option<&str> {
    path.rfind(['/', '\\']).map(|idx| &path[..idx])
}

/// 저장소 경로를 저장소 루트 아래 두 단계까지로 자릅니다.
fn base_repo_path(path: &str) -> &str {
    let Some(m) = patterns::get(&RX_REPOSITORY).and_then(|rx| rx.find(path)) else {
        return path;
    };
    let mut pos = m.end();
    let Some(next) = path[pos..].find(['/', '\\']) else {
        return path;
    };
    pos += next + 1;
    if let Some(next) = path[pos..].find(['/', '\\']) {
        pos += next + 1;
    }
    &path[..pos]
}

/// 두 컴포넌트가 같은 경로 계열에 있는지 확인합니다.
///
/// 부모 디렉토리가 같거나, 둘 다 저장소 아래라면 저장소 루트 기준으로 비교합니다.
/// 일치하지 않으면 `right`의 관련 컴포넌트를 재귀적으로 확인합니다.
fn has_same_base_path(left: &Component, right: &Component) -> bool {
    let (l, r) = match (parent_of(&left.file_path), parent_of(&right.file_path)) {
        (None, None) => return true,
        (Some(l), Some(r)) => (l, r),
        _ => return false,
    };
    if l.eq_ignore_ascii_case(r) {
        return true;
    }
    let in_repo = |p: &str| patterns::is_match(&RX_REPOSITORY, &format!("{p}/"));
    if in_repo(l) && in_repo(r) {
        let (bl, br) = (
            base_repo_path(&format!("{l}/")).to_owned(),
            base_repo_path(&format!("{r}/")).to_owned(),
        );
        if bl.eq_ignore_ascii_case(&br) {
            return true;
        }
    }
    right
        .related
        .iter()
        .any(|child| has_same_base_path(child, left))
}

// ─── 규칙 조건 ─────────────────────────────────────────────────────

fn cpe_identifiers_match(a: &Component, b: &Component) -> bool {
    !a.vulnerable_software_identifiers.is_empty()
        && a.vulnerable_software_identifiers == b.vulnerable_software_identifiers
}

fn vulnerabilities_match(a: &Component, b: &Component) -> bool {
    a.vulnerabilities == b.vulnerabilities
}

/// 실제 파일 이름의 버전과 선두 영숫자가 같은지 확인합니다.
fn file_name_match(a: &Component, b: &Component) -> bool {
    let (name_a, name_b) = (a.actual_file_name(), b.actual_file_name());
    if let (Some(va), Some(vb)) = (version::parse(name_a), version::parse(name_b)) {
        if va != vb {
            return false;
        }
    }
    let starting = |name: &str| {
        patterns::get(&RX_STARTING_TEXT)
            .and_then(|rx| rx.find(name))
            .map(|m| m.as_str().to_owned())
    };
    match (starting(name_a), starting(name_b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// 왼쪽이 핵심 컴포넌트로 살아남아야 하는지 판단합니다.
///
/// 가상 컴포넌트가 실제 컴포넌트보다 앞섭니다. 그다음 오른쪽을 살리는 조건
/// (왼쪽만 아카이브이거나, 오른쪽에만 핵심 이름 조각이 있음)을 먼저 보고,
/// 이어서 왼쪽을 살리는 조건을 봅니다. 둘 다 아니면 짧은 이름이 이깁니다.
pub fn is_core(left: &Component, right: &Component) -> bool {
    if left.is_virtual != right.is_virtual {
        return left.is_virtual;
    }
    let left_name = left.file_name.to_lowercase();
    let right_name = right.file_name.to_lowercase();

    let left_archive = patterns::is_match(&RX_ARCHIVE, &left_name);
    let right_archive = patterns::is_match(&RX_ARCHIVE, &right_name);
    let only_right = |marker: &&str| right_name.contains(*marker) && !left_name.contains(*marker);
    let only_left = |marker: &&str| left_name.contains(*marker) && !right_name.contains(*marker);

    if (left_archive && !right_archive) || CORE_MARKERS.iter().any(only_right) {
        return false;
    }
    if (right_archive && !left_archive) || CORE_MARKERS.iter().any(only_left) {
        return true;
    }
    left_name.len() <= right_name.len()
}

fn is_pom(c: &Component) -> bool {
    c.file_name.to_lowercase().ends_with("pom.xml")
}

fn is_jar(c: &Component) -> bool {
    c.file_name.to_lowercase().ends_with(".jar")
}

/// jar의 소프트웨어 식별자가 pom의 식별자를 모두 포함하는지 확인합니다.
fn is_shaded_jar(jar: &Component, pom: &Component) -> bool {
    is_jar(jar)
        && is_pom(pom)
        && !jar.software_identifiers.is_empty()
        && !pom.software_identifiers.is_empty()
        && pom
            .software_identifiers
            .iter()
            .all(|i| jar.software_identifiers.contains(i))
}

/// 스크립트의 npm 패키지 URL을 웹 jar 좌표로 바꿔 비교합니다.
fn is_web_jar(jar: &Component, script: &Component) -> bool {
    if jar.software_identifiers.is_empty() || script.software_identifiers.is_empty() {
        return false;
    }
    let jar_name = jar.file_name.to_lowercase();
    let script_name = script.file_name.to_lowercase();
    if !jar_name.ends_with(".jar") || !script_name.ends_with(".js") || !script_name.starts_with(&jar_name) {
        return false;
    }
    script.software_identifiers.iter().all(|id| {
        let translated = match (id.kind, id.as_purl()) {
            (IdentifierKind::Purl, Some(purl)) => match &purl.version {
                Some(v) => format!("pkg:maven/org.webjars/{}@{v}", purl.name),
                None => format!("pkg:maven/org.webjars/{}", purl.name),
            },
            _ => id.value.clone(),
        };
        jar.software_identifiers.iter().any(|j| j.value == translated)
    })
}

// ─── npm 버전 ──────────────────────────────────────────────────────

fn strip_leading_non_numeric(s: &str) -> Option<&str> {
    s.find(|c: char| c.is_ascii_digit()).map(|idx| &s[idx..])
}

/// npm 버전 문자열을 semver 버전으로 바꿉니다. 빠진 부분은 0으로 채웁니다.
fn npm_version(text: &str) -> Option<semver::Version> {
    let text = strip_leading_non_numeric(text.trim())?;
    if let Ok(v) = semver::Version::parse(text) {
        return Some(v);
    }
    let split = text.find(['-', '+']).unwrap_or(text.len());
    let (core, rest) = text.split_at(split);
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    semver::Version::parse(&format!("{}{rest}", parts.join("."))).ok()
}

/// npm 범위 표현을 semver 요구사항 목록으로 바꿉니다 (`||`로 나뉜 대안).
fn npm_range(range: &str) -> Option<Vec<semver::VersionReq>> {
    range
        .split("||")
        .map(|alt| {
            let tokens: Vec<&str> = alt.split_whitespace().collect();
            let comparators: Vec<String> = match tokens.as_slice() {
                [] => vec!["*".to_owned()],
                [low, "-", high] => vec![format!(">={low}"), format!("<={high}")],
                _ => {
                    let mut out: Vec<String> = Vec::new();
                    let mut pending = String::new();
                    for token in tokens {
                        if token.chars().all(|c| "<>=~^".contains(c)) {
                            pending.push_str(token);
                            continue;
                        }
                        let token = format!("{pending}{token}");
                        pending.clear();
                        let exact = token.starts_with(|c: char| c.is_ascii_digit())
                            && !token.contains(['x', 'X', '*']);
                        out.push(if exact { format!("={token}") } else { token });
                    }
                    out
                }
            };
            semver::VersionReq::parse(&comparators.join(", ")).ok()
        })
        .collect()
}

fn satisfies(version: &str, range: &str) -> bool {
    match (npm_version(version), npm_range(range)) {
        (Some(v), Some(reqs)) => reqs.iter().any(|r| r.matches(&v)),
        _ => false,
    }
}

/// 두 npm 버전 표현이 같은 패키지 버전을 가리킬 수 있는지 확인합니다.
///
/// 한쪽이 범위이면 다른 쪽 버전이 그 범위를 만족하는지 양방향으로 확인합니다.
/// 공백을 포함한 범위끼리는 비교하지 않습니다.
pub fn npm_versions_match(current: &str, next: &str) -> bool {
    if current == next || current == "*" || next == "*" {
        return true;
    }
    if current.contains(' ') {
        if next.contains(' ') {
            return false;
        }
        return satisfies(next, current);
    }
    if strip_leading_non_numeric(current).is_none_or(str::is_empty) {
        return false;
    }
    if !next.is_empty() && satisfies(current, next) {
        return true;
    }
    !next.contains(' ') && satisfies(next, current)
}

// ─── 분석기 ───────────────────────────────────────────────────────

/// 한 쌍에 대해 처음 일치하는 번들링 규칙을 찾습니다.
fn evaluate(a: &Component, b: &Component) -> Option<MergePlan> {
    if pairwise::sha1_equal(a, b) {
        if contained_in_war(&a.file_path) || contained_in_war(&b.file_path) {
            return None;
        }
        return Some(MergePlan::keep_first_if(first_path_is_shortest(
            &a.file_path,
            &b.file_path,
        )));
    }

    let detached = |survivor: Survivor, copy_findings: bool| MergePlan {
        detach: true,
        copy_findings,
        ..MergePlan::keep(survivor)
    };

    if is_shaded_jar(a, b) {
        return Some(detached(Survivor::First, false));
    }
    if is_shaded_jar(b, a) {
        return Some(detached(Survivor::Second, false));
    }
    if is_web_jar(a, b) {
        return Some(detached(Survivor::First, true));
    }
    if is_web_jar(b, a) {
        return Some(detached(Survivor::Second, true));
    }

    if cpe_identifiers_match(a, b)
        && has_same_base_path(a, b)
        && vulnerabilities_match(a, b)
        && file_name_match(a, b)
    {
        return Some(MergePlan::keep_first_if(is_core(a, b)));
    }

    if a.ecosystem == Some(Ecosystem::Npm)
        && b.ecosystem == Some(Ecosystem::Npm)
        && a.name.is_some()
        && a.name == b.name
    {
        if let (Some(va), Some(vb)) = (&a.version, &b.version) {
            if npm_versions_match(va, vb) {
                return Some(MergePlan {
                    copy_evidence: true,
                    ..MergePlan::keep_first_if(!a.is_virtual)
                });
            }
        }
    }
    None
}

/// 중복 컴포넌트 번들링 분석기
pub struct DependencyBundler;

impl DependencyBundler {
    /// 목록 전체를 번들링하고 흡수된 컴포넌트 수를 반환합니다.
    pub fn bundle(components: &mut Vec<Component>) -> usize {
        pairwise::merge_pairwise(components, "bundling", evaluate)
    }
}

impl GlobalAnalyzer for DependencyBundler {
    fn name(&self) -> &str {
        "bundling"
    }

    fn phase(&self) -> AnalysisPhase {
        AnalysisPhase::Final
    }

    fn process_all(
        &self,
        components: &mut Vec<Component>,
        _ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        let before = components.len();
        let merged = Self::bundle(components);
        tracing::info!(before, after = components.len(), merged, "bundled duplicate components");
        Ok(())
    }
}
