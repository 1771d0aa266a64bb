//! `osascript` 실행기.
//!
//! 스크립트 본문은 고정 문자열이다. 외부 값은 모두 별도 인자로 넘기고
//! 스크립트 안에서 `on run argv`로 읽는다.

use std::process::Command;

use anyhow::{Context, Result};

const OSASCRIPT: &str = "osascript";

/// AppleScript를 실행하고 표준 출력을 반환한다 (끝의 공백 제거).
/// 실패는 로그 없이 에러로 돌려주며, 호출한 쪽에서 기록한다.
pub fn run_script(script: &str, args: &[&str]) -> Result<String> {
    let mut command = Command::new(OSASCRIPT);
    for line in script.lines().filter(|l| !l.trim().is_empty()) {
        command.arg("-e").arg(line);
    }
    command.args(args);

    let output = command
        .output()
        .with_context(|| format!("{} 실행에 실패했습니다", OSASCRIPT))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        anyhow::bail!("AppleScript 실행 오류 ({}): {}", output.status, stderr);
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}
