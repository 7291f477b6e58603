use std::fs;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::finding::{Finding, Severity};
use crate::stages::Stage;
use crate::state::{ReviewState, StateDelta};

/// Secret-literal and dynamic-evaluation heuristics.
pub struct SecurityStage;

const SECRET_NAMES: &[&str] = &["password", "passwd", "secret", "api_key", "apikey", "token"];

/// A line assigns a quoted literal to a name that smells like a credential.
fn looks_like_hardcoded_secret(line: &str) -> bool {
    let lower = line.to_lowercase();
    let Some(eq) = lower.find('=') else {
        return false;
    };
    let (lhs, rhs) = lower.split_at(eq);
    SECRET_NAMES.iter().any(|name| lhs.contains(name))
        && (rhs.contains('"') || rhs.contains('\''))
        && !rhs.contains("env")
        && !rhs.contains("getenv")
}

fn uses_dynamic_eval(line: &str) -> bool {
    let trimmed = line.trim_start();
    !trimmed.starts_with('#') && !trimmed.starts_with("//") && trimmed.contains("eval(")
}

#[async_trait]
impl Stage for SecurityStage {
    #[instrument(skip(self, state), fields(files = state.target_files.len()))]
    async fn run(&self, state: &ReviewState) -> anyhow::Result<StateDelta> {
        let mut findings = vec![];

        for path in &state.target_files {
            let file = path.display().to_string();
            let Ok(contents) = fs::read_to_string(path) else {
                continue;
            };

            for (idx, line) in contents.lines().enumerate() {
                let lineno = idx + 1;
                if looks_like_hardcoded_secret(line) {
                    findings.push(Finding {
                        description: "credential-like literal committed to source".to_string(),
                        impact: "anyone with repository access can read the credential"
                            .to_string(),
                        recommendation: "read the value from the environment or a secret store"
                            .to_string(),
                        auto_fixable: true,
                        cwe_id: Some("CWE-798".to_string()),
                        cvss_score: Some(9.1),
                        references: vec!["https://cwe.mitre.org/data/definitions/798.html".to_string()],
                        ..Finding::new(&file, lineno, Severity::Critical, "security", "Hardcoded secret")
                    });
                }
                if uses_dynamic_eval(line) {
                    findings.push(Finding {
                        description: "dynamic evaluation of runtime data".to_string(),
                        impact: "attacker-controlled input may execute as code".to_string(),
                        recommendation: "replace eval with explicit parsing".to_string(),
                        cwe_id: Some("CWE-95".to_string()),
                        ..Finding::new(&file, lineno, Severity::High, "security", "Use of eval")
                    });
                }
            }
        }

        debug!(findings = findings.len(), "security audit complete");

        Ok(StateDelta {
            security_findings: findings,
            current_stage: Some("security_audit_complete".to_string()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_hardcoded_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.py");
        std::fs::write(
            &path,
            "API_KEY = \"sk-123456\"\npassword = os.environ[\"PW\"]\nlimit = 10\n",
        )
        .unwrap();

        let state = ReviewState {
            target_files: vec![path],
            ..Default::default()
        };
        let delta = SecurityStage.run(&state).await.unwrap();

        assert_eq!(delta.security_findings.len(), 1);
        let finding = &delta.security_findings[0];
        assert_eq!(finding.title, "Hardcoded secret");
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.cwe_id.as_deref(), Some("CWE-798"));
        assert!(finding.auto_fixable);
        assert_eq!(finding.line, 1);
    }

    #[tokio::test]
    async fn flags_eval_but_not_in_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handler.js");
        std::fs::write(&path, "// eval(is bad)\nconst out = eval(input);\n").unwrap();

        let state = ReviewState {
            target_files: vec![path],
            ..Default::default()
        };
        let delta = SecurityStage.run(&state).await.unwrap();

        assert_eq!(delta.security_findings.len(), 1);
        assert_eq!(delta.security_findings[0].title, "Use of eval");
        assert_eq!(delta.security_findings[0].line, 2);
    }

    #[test]
    fn env_lookups_are_not_secrets() {
        assert!(!looks_like_hardcoded_secret("password = os.getenv('PW')"));
        assert!(looks_like_hardcoded_secret("let token = \"abc\";"));
        assert!(!looks_like_hardcoded_secret("token == other"));
    }
}
