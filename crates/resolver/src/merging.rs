//! 생태계별 대표 선택 -- 한 패키지를 설명하는 여러 매니페스트를 합칩니다.
//!
//! 정보 수집 직후 목록 전체에 대해 실행됩니다. 살아남는 컴포넌트는 흡수된
//! 컴포넌트의 증거와 프로젝트 참조를 모두 가져갑니다.
//!
//! | 생태계 | 조건 | 대표 |
//! |--------|------|------|
//! | Ruby | 같은 패키지 경로의 `.gemspec` | `specifications` 디렉토리의 것 |
//! | iOS | 같은 패키지 경로의 `.podspec`/`Package.swift` | `.podspec` |
//! | Java | `.aar`와 그 안의 `classes.jar` | `.aar` |
//! | .NET | 같은 이름과 버전 | 가상이 아닌 것 |

use ironcheck_core::component::Component;
use ironcheck_core::context::AnalysisContext;
use ironcheck_core::error::IroncheckError;
use ironcheck_core::pipeline::{AnalysisPhase, GlobalAnalyzer};
use ironcheck_core::types::Ecosystem;

use crate::pairwise::{self, MergePlan};

fn both(a: &Component, b: &Component, ecosystem: Ecosystem) -> bool {
    a.ecosystem == Some(ecosystem) && b.ecosystem == Some(ecosystem)
}

fn same_package_path(a: &Component, b: &Component) -> bool {
    match (&a.package_path, &b.package_path) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}

fn parent_dir_name(path: &str) -> Option<&str> {
    let mut segments = path.rsplit(['/', '\\']);
    segments.next()?;
    segments.next()
}

/// 앞쪽이 대표이면 `Some(true)`, 뒤쪽이면 `Some(false)`
fn main_gemspec(a: &Component, b: &Component) -> Option<bool> {
    let is_gemspec = |c: &Component| c.file_name.ends_with(".gemspec");
    if !both(a, b, Ecosystem::Ruby) || !is_gemspec(a) || !is_gemspec(b) || !same_package_path(a, b) {
        return None;
    }
    Some(parent_dir_name(&a.actual_file_path).is_some_and(|d| d.eq_ignore_ascii_case("specifications")))
}

fn main_swift(a: &Component, b: &Component) -> Option<bool> {
    let is_manifest =
        |c: &Component| c.file_name.ends_with(".podspec") || c.file_name == "Package.swift";
    if !both(a, b, Ecosystem::Ios) || !is_manifest(a) || !is_manifest(b) || !same_package_path(a, b) {
        return None;
    }
    Some(a.file_name.ends_with(".podspec"))
}

fn main_android(a: &Component, b: &Component) -> Option<bool> {
    if a.is_virtual || b.is_virtual || !both(a, b, Ecosystem::Java) {
        return None;
    }
    let contains_classes = |aar: &Component, classes: &Component| {
        let aar_name = aar.actual_file_name();
        classes.actual_file_name() == "classes.jar"
            && aar.extension().as_deref() == Some("aar")
            && classes.file_name.contains(aar_name)
    };
    if contains_classes(a, b) {
        Some(true)
    } else if contains_classes(b, a) {
        Some(false)
    } else {
        None
    }
}

fn main_dotnet(a: &Component, b: &Component) -> Option<bool> {
    if !both(a, b, Ecosystem::Dotnet) {
        return None;
    }
    let (Some(name_a), Some(version_a), Some(name_b), Some(version_b)) =
        (&a.name, &a.version, &b.name, &b.version)
    else {
        return None;
    };
    (name_a == name_b && version_a == version_b).then_some(!a.is_virtual)
}

fn evaluate(a: &Component, b: &Component) -> Option<MergePlan> {
    let first_wins = main_gemspec(a, b)
        .or_else(|| main_swift(a, b))
        .or_else(|| main_android(a, b))
        .or_else(|| main_dotnet(a, b))?;
    Some(MergePlan {
        copy_evidence: true,
        ..MergePlan::keep_first_if(first_wins)
    })
}

/// 생태계별 대표 선택 분석기
pub struct DependencyMerger;

impl DependencyMerger {
    /// 목록 전체를 병합하고 흡수된 컴포넌트 수를 반환합니다.
    pub fn merge(components: &mut Vec<Component>) -> usize {
        pairwise::merge_pairwise(components, "merging", evaluate)
    }
}

impl GlobalAnalyzer for DependencyMerger {
    fn name(&self) -> &str {
        "merging"
    }

    fn phase(&self) -> AnalysisPhase {
        AnalysisPhase::PostInformationCollection
    }

    fn process_all(
        &self,
        components: &mut Vec<Component>,
        _ctx: &AnalysisContext,
    ) -> Result<(), IroncheckError> {
        let merged = Self::merge(components);
        if merged > 0 {
            tracing::info!(merged, remaining = components.len(), "merged ecosystem manifests");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironcheck_core::types::{Confidence, EvidenceType};

    fn component(path: &str, ecosystem: Ecosystem, package_path: Option<&str>) -> Component {
        let mut c = Component::new(path);
        c.ecosystem = Some(ecosystem);
        c.package_path = package_path.map(str::to_owned);
        c
    }

    #[test]
    fn gemspec_in_specifications_wins() {
        let mut loose = component("/app/vendor/rack/rack.gemspec", Ecosystem::Ruby, Some("/gems/rack"));
        loose
            .evidence
            .add_evidence(EvidenceType::Product, "gemspec", "name", "rack", Confidence::High);
        loose.project_references.insert("web".to_owned());
        let spec = component(
            "/gems/specifications/rack-2.2.3.gemspec",
            Ecosystem::Ruby,
            Some("/gems/rack"),
        );

        let mut list = vec![loose, spec];
        assert_eq!(DependencyMerger::merge(&mut list), 1);
        assert_eq!(list[0].file_name, "rack-2.2.3.gemspec");
        assert!(list[0].evidence.contains_value(EvidenceType::Product, "rack"));
        assert!(list[0].project_references.contains("web"));
        assert_eq!(list[0].related.len(), 1);
    }

    #[test]
    fn podspec_beats_package_swift() {
        let mut list = vec![
            component("/src/Alamofire/Package.swift", Ecosystem::Ios, Some("/src/Alamofire")),
            component("/src/Alamofire/Alamofire.podspec", Ecosystem::Ios, Some("/src/Alamofire")),
        ];
        assert_eq!(DependencyMerger::merge(&mut list), 1);
        assert_eq!(list[0].file_name, "Alamofire.podspec");
    }

    #[test]
    fn aar_beats_classes_jar() {
        let aar = component("/libs/appcompat-1.2.0.aar", Ecosystem::Java, None);
        let mut classes = component("/tmp/x/classes.jar", Ecosystem::Java, None);
        classes.file_path = "/libs/appcompat-1.2.0.aar/classes.jar".to_owned();
        classes.file_name = "appcompat-1.2.0.aar: classes.jar".to_owned();

        let mut list = vec![classes, aar];
        assert_eq!(DependencyMerger::merge(&mut list), 1);
        assert_eq!(list[0].file_name, "appcompat-1.2.0.aar");
    }

    #[test]
    fn dotnet_prefers_non_virtual() {
        let virt = Component::new_virtual(
            "/src/app.csproj",
            Ecosystem::Dotnet,
            "Newtonsoft.Json",
            Some("13.0.1".to_owned()),
        );
        let mut dll = component("/bin/Newtonsoft.Json.dll", Ecosystem::Dotnet, None);
        dll.name = Some("Newtonsoft.Json".to_owned());
        dll.version = Some("13.0.1".to_owned());

        let mut list = vec![virt, dll];
        assert_eq!(DependencyMerger::merge(&mut list), 1);
        assert!(!list[0].is_virtual);
    }

    #[test]
    fn different_packages_untouched() {
        let mut list = vec![
            component("/a/a.gemspec", Ecosystem::Ruby, Some("/a")),
            component("/b/b.gemspec", Ecosystem::Ruby, Some("/b")),
        ];
        assert_eq!(DependencyMerger::merge(&mut list), 0);
        assert_eq!(list.len(), 2);
    }
}
