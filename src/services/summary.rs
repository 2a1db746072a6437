use crate::lattice::PermissionMap;
use std::io::Write;

/// YAML-shaped permissions block shared by the observer summary and the
/// miner report sections. `permissions: {}` when nothing was needed.
pub fn permissions_block(map: &PermissionMap) -> String {
    if map.is_empty() {
        return "permissions: {}".to_string();
    }
    let mut block = String::from("permissions:\n");
    for (scope, level) in map.iter() {
        block.push_str(&format!("  {}: {}\n", scope, level));
    }
    block
}

/// Markdown for a single job's summary: heading plus the yaml code block.
pub fn job_summary_markdown(map: &PermissionMap) -> String {
    format!(
        "#### Minimal required permissions:\n\n```yaml\n{}\n```\n",
        permissions_block(map).trim_end()
    )
}

/// Publish a summary fragment.
///
/// Appended to the step-summary file when the host environment provides
/// one, printed to stdout otherwise. Appending keeps earlier fragments
/// from other steps intact.
pub fn publish(markdown: &str) -> anyhow::Result<()> {
    match std::env::var("GITHUB_STEP_SUMMARY") {
        Ok(path) if !path.is_empty() => {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            file.write_all(markdown.as_bytes())?;
            Ok(())
        }
        _ => {
            println!("{}", markdown);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{job_summary_markdown, permissions_block};
    use crate::lattice::{AccessLevel, PermissionMap};

    #[test]
    fn empty_map_renders_empty_object_form() {
        assert_eq!(permissions_block(&PermissionMap::new()), "permissions: {}");
    }

    #[test]
    fn block_lists_scopes_with_levels() {
        let map: PermissionMap = [
            ("issues".to_string(), AccessLevel::Write),
            ("contents".to_string(), AccessLevel::Read),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            permissions_block(&map),
            "permissions:\n  contents: read\n  issues: write\n"
        );
    }

    #[test]
    fn markdown_wraps_block_in_yaml_fence() {
        let md = job_summary_markdown(&PermissionMap::new());
        assert!(md.starts_with("#### Minimal required permissions:"));
        assert!(md.contains("```yaml\npermissions: {}\n```"));
    }
}
