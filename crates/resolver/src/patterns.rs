//! 내장 정규식 -- 최초 사용 시 한 번만 컴파일
//!
//! 모든 내장 패턴은 리터럴이며 `builtin_patterns_compile` 테스트로 검증됩니다.
//! 컴파일에 실패하면 `error!`를 남기고 해당 패턴은 어떤 입력에도 일치하지 않습니다.

use std::sync::LazyLock;

use regex::Regex;

/// 지연 컴파일되는 내장 정규식
pub(crate) type StaticRegex = LazyLock<Option<Regex>>;

/// 내장 패턴을 컴파일합니다.
pub(crate) fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(rx) => Some(rx),
        Err(e) => {
            tracing::error!(pattern, error = %e, "failed to compile built-in pattern");
            None
        }
    }
}

/// 문자열의 어딘가에 패턴이 일치하는지 확인합니다.
pub(crate) fn is_match(rx: &StaticRegex, text: &str) -> bool {
    rx.as_ref().is_some_and(|r| r.is_match(text))
}

/// 내장 패턴의 참조를 반환합니다.
pub(crate) fn get(rx: &StaticRegex) -> Option<&Regex> {
    rx.as_ref()
}

/// 사용자 패턴을 전체 일치용으로 고정해 컴파일합니다.
///
/// `^(?:...)$`로 감싸므로 대체(`|`)가 있어도 문자열 전체와 비교됩니다.
pub fn compile_anchored(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    let flags = if case_insensitive { "(?i)" } else { "" };
    Regex::new(&format!("{flags}^(?:{pattern})$"))
}
