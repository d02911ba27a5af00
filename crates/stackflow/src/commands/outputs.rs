use crate::GlobalOpts;
use crate::utils;
use colored::Colorize;
use stackflow_cloud::Orchestrator;

pub async fn handle(opts: &GlobalOpts, json: bool) -> anyhow::Result<()> {
    let (template, source) = utils::load_stack(opts.file.as_deref())?;
    if !json {
        utils::print_stack_header("Describing", &template, &source);
    }
    let (plane, description) = utils::connect(opts, &template).await?;
    if !json {
        println!("  control plane: {}", description);
    }

    let state = Orchestrator::new(plane).discover(&template).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    println!();
    if state.is_empty() {
        println!("{}", "The stack is not deployed".yellow());
        return Ok(());
    }

    println!("{}", "Resources:".bold());
    for spec in template.iter() {
        match state.get(&spec.name) {
            Some(found) => println!(
                "  {} {:<13} {} ({})",
                "✓".green(),
                spec.kind.to_string(),
                spec.name.cyan(),
                found.id
            ),
            None => println!(
                "  {} {:<13} {} (missing)",
                "-".dimmed(),
                spec.kind.to_string(),
                spec.name
            ),
        }
    }
    utils::print_endpoints(&state);
    Ok(())
}
