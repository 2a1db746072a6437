use crate::*;

pub fn handle_mine(
    workflow: &str,
    count: u32,
    owner: &str,
    repo: &str,
    branch: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let token = std::env::var("GITHUB_TOKEN")
        .map_err(|_| anyhow::anyhow!("GITHUB_TOKEN is not set"))?;
    let host = services::github::HttpWorkflowHost::new(owner, repo, &token)?;

    if format == OutputFormat::Text {
        println!(
            "Analyzing {} for the last {} successful runs.\n",
            workflow, count
        );
    }

    let aggregate = services::miner::mine(&host, workflow, count, branch)?;
    render(workflow, &aggregate, format)?;
    Ok(())
}

fn render(workflow: &str, aggregate: &RunAggregate, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Yaml {
        return services::output::print_yaml(&aggregate.jobs);
    }

    let mut markdown = format!("### Minimal required permissions for {}:\n\n", workflow);
    println!("Minimal required permissions for {}:", workflow);

    if aggregate.is_empty() {
        markdown.push_str("No permissions logs were found.\n");
        println!("No permissions logs were found.");
    } else {
        for (job, permissions) in &aggregate.jobs {
            let block = services::summary::permissions_block(permissions);
            markdown.push_str(&format!(
                "#### {}:\n\n```yaml\n{}\n```\n",
                job,
                block.trim_end()
            ));
            println!("---------------------= {} =---------------------", job);
            println!("{}", block.trim_end());
        }
    }

    // mirrored into the step summary when running inside the host CI
    if std::env::var("GITHUB_STEP_SUMMARY").is_ok() {
        services::summary::publish(&markdown)?;
    }
    Ok(())
}
