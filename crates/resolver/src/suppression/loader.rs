//! 규칙 파일 로더 -- YAML 억제/힌트 규칙 파일을 디스크에서 로드합니다.
//!
//! 경로가 디렉토리이면 내부의 `.yml`/`.yaml` 파일을 이름 순으로 스캔합니다.
//! 디렉토리 내 개별 파일 파싱 실패는 경고 로그를 남기고 건너뜁니다.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::config::ResolverConfig;
use crate::error::ResolverError;

/// 규칙 파일 형식
///
/// 파일 하나는 규칙 목록을 담은 문서이며, 로더는 문서를 규칙으로 펼칩니다.
pub trait RuleDocument: DeserializeOwned {
    /// 규칙 타입
    type Rule;

    /// 문서를 규칙 목록으로 변환합니다.
    fn into_rules(self) -> Vec<Self::Rule>;

    /// 규칙 하나의 유효성을 검증합니다.
    fn validate_rule(rule: &Self::Rule) -> Result<(), ResolverError>;
}

/// 파일 크기와 규칙 수 제한
#[derive(Debug, Clone, Copy)]
pub struct RuleLimits {
    /// 파일 최대 크기 (바이트)
    pub max_file_size: u64,
    /// 경로당 최대 규칙 수
    pub max_rules: usize,
}

impl RuleLimits {
    /// 리졸버 설정에서 제한을 가져옵니다.
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            max_file_size: config.max_rule_file_size,
            max_rules: config.max_rules,
        }
    }
}

impl Default for RuleLimits {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 파일 또는 디렉토리에서 규칙을 로드합니다.
    ///
    /// # Errors
    /// - 경로를 읽을 수 없는 경우
    /// - 단일 파일이 크기 제한을 넘거나 파싱/검증에 실패한 경우
    /// - 규칙 수가 `max_rules`를 초과하는 경우
    pub async fn load_path<D: RuleDocument>(
        path: impl AsRef<Path>,
        limits: RuleLimits,
    ) -> Result<Vec<D::Rule>, ResolverError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ResolverError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read metadata: {e}"),
            })?;

        let rules = if metadata.is_dir() {
            Self::load_directory::<D>(path, limits).await?
        } else {
            Self::load_file::<D>(path, limits).await?
        };

        if rules.len() > limits.max_rules {
            return Err(ResolverError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("too many rules: max {}", limits.max_rules),
            });
        }
        Ok(rules)
    }

    /// 디렉토리의 모든 YAML 규칙 파일을 로드합니다.
    pub async fn load_directory<D: RuleDocument>(
        dir: &Path,
        limits: RuleLimits,
    ) -> Result<Vec<D::Rule>, ResolverError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| ResolverError::RuleLoad {
                path: dir.display().to_string(),
                reason: format!("failed to read directory: {e}"),
            })?;

        let mut files: Vec<PathBuf> = Vec::new();
        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| ResolverError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory entry: {e}"),
                })?
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                files.push(path);
            }
        }
        files.sort();

        let mut rules = Vec::new();
        for path in files {
            match Self::load_file::<D>(&path, limits).await {
                Ok(mut loaded) => rules.append(&mut loaded),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load rule file, skipping"
                    );
                }
            }

            if rules.len() > limits.max_rules {
                return Err(ResolverError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("too many rules: max {}", limits.max_rules),
                });
            }
        }

        tracing::info!(dir = %dir.display(), count = rules.len(), "loaded rule directory");
        Ok(rules)
    }

    /// 단일 YAML 파일에서 규칙을 로드합니다.
    pub async fn load_file<D: RuleDocument>(
        path: &Path,
        limits: RuleLimits,
    ) -> Result<Vec<D::Rule>, ResolverError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ResolverError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > limits.max_file_size {
            return Err(ResolverError::FileTooBig {
                path: path.display().to_string(),
                size: metadata.len(),
                max: limits.max_file_size,
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ResolverError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        Self::parse_yaml::<D>(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하고 각 규칙을 검증합니다.
    pub fn parse_yaml<D: RuleDocument>(
        yaml_str: &str,
        source: &str,
    ) -> Result<Vec<D::Rule>, ResolverError> {
        let document: D = serde_yaml::from_str(yaml_str).map_err(|e| ResolverError::RuleParse {
            source_name: source.to_owned(),
            reason: format!("YAML parse error: {e}"),
        })?;

        let rules = document.into_rules();
        for (idx, rule) in rules.iter().enumerate() {
            D::validate_rule(rule).map_err(|e| ResolverError::RuleParse {
                source_name: format!("{source}[{idx}]"),
                reason: e.to_string(),
            })?;
        }
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suppression::types::SuppressionFile;
    use std::io::Write;

    const RULES: &str = r#"
suppressions:
  - cpe: ["cpe:/a:apache:struts"]
  - cve: ["CVE-2017-5638"]
"#;

    fn write(dir: &Path, name: &str, content: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn parse_valid_yaml() {
        let rules = RuleLoader::parse_yaml::<SuppressionFile>(RULES, "test.yml").unwrap();
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn parse_invalid_yaml_returns_error() {
        let result = RuleLoader::parse_yaml::<SuppressionFile>("not: [valid: {{{", "bad.yml");
        assert!(matches!(result, Err(ResolverError::RuleParse { .. })));
    }

    #[test]
    fn parse_rule_without_target_names_index() {
        let yaml = "suppressions:\n  - cpe: [\"cpe:/a:x:y\"]\n  - sha1: \"abc\"\n";
        let err = RuleLoader::parse_yaml::<SuppressionFile>(yaml, "rules.yml").unwrap_err();
        assert!(err.to_string().contains("rules.yml[1]"));
    }

    #[tokio::test]
    async fn load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yml", RULES);
        write(dir.path(), "b.yaml", "suppressions: [{{{");
        write(dir.path(), "readme.txt", "ignored");

        let rules = RuleLoader::load_path::<SuppressionFile>(dir.path(), RuleLimits::default())
            .await
            .unwrap();
        assert_eq!(rules.len(), 2);
    }

    #[tokio::test]
    async fn single_bad_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.yml", "suppressions: [{{{");
        let result = RuleLoader::load_path::<SuppressionFile>(
            dir.path().join("bad.yml"),
            RuleLimits::default(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn file_size_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "rules.yml", RULES);
        let limits = RuleLimits {
            max_file_size: 8,
            max_rules: 10,
        };
        let result =
            RuleLoader::load_path::<SuppressionFile>(dir.path().join("rules.yml"), limits).await;
        assert!(matches!(result, Err(ResolverError::FileTooBig { .. })));
    }

    #[tokio::test]
    async fn rule_count_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "rules.yml", RULES);
        let limits = RuleLimits {
            max_file_size: 1024,
            max_rules: 1,
        };
        let result = RuleLoader::load_path::<SuppressionFile>(dir.path(), limits).await;
        assert!(matches!(result, Err(ResolverError::RuleLoad { .. })));
    }

    #[tokio::test]
    async fn load_nonexistent_path_returns_error() {
        let result = RuleLoader::load_path::<SuppressionFile>(
            "/nonexistent/ironcheck/rules",
            RuleLimits::default(),
        )
        .await;
        assert!(result.is_err());
    }
}
