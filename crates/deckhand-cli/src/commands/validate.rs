use std::path::Path;

use deckhand_core::ServiceConfig;
use deckhand_plan::{Element, PlanBuilder};

use super::print_snapshot;

pub fn validate(path: &Path, format: &str) -> anyhow::Result<()> {
    let config = ServiceConfig::from_file(path)?;
    let plan = PlanBuilder::new(&config).build()?;

    print_snapshot(&plan.snapshot(), format)?;

    let invalid = plan.steps().filter(|s| s.has_errors()).count();
    if invalid > 0 {
        anyhow::bail!("{invalid} step(s) in {} have validation errors", config.service.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn service_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn valid_service_passes() {
        let file = service_file(
            r#"
[service]
name = "ok"

[[pods]]
type = "hello"
count = 1
[[pods.tasks]]
name = "server"
"#,
        );
        assert!(validate(file.path(), "text").is_ok());
    }

    #[test]
    fn invalid_steps_fail() {
        let file = service_file(
            r#"
[service]
name = "bad"

[[pods]]
type = "hello"
count = 2
"#,
        );
        let err = validate(file.path(), "json").unwrap_err();
        assert!(err.to_string().contains("2 step(s)"));
    }

    #[test]
    fn missing_file_fails() {
        assert!(validate(Path::new("/nonexistent/deckhand.toml"), "text").is_err());
    }
}
