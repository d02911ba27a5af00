use crate::GlobalOpts;
use crate::utils;
use colored::Colorize;
use stackflow_cloud::{Mode, Orchestrator};

pub fn handle(opts: &GlobalOpts, mode: Mode) -> anyhow::Result<()> {
    let (template, source) = utils::load_stack(opts.file.as_deref())?;
    let plan = Orchestrator::plan(&template, mode)?;

    utils::print_stack_header(&format!("Plan to {}", mode), &template, &source);
    if let Some(region) = utils::region(opts, &template) {
        println!("  region: {}", region.cyan());
    }
    println!();

    for (i, action) in plan.actions.iter().enumerate() {
        let relation = match mode {
            Mode::Create => "after",
            Mode::Delete => "once gone:",
        };
        let deps = if action.depends_on.is_empty() {
            String::new()
        } else {
            format!(" ({} {})", relation, action.depends_on.join(", "))
                .dimmed()
                .to_string()
        };
        println!(
            "  {:>2}. {} {:<13} {}{}",
            i + 1,
            action.action_type.to_string().bold(),
            action.kind.to_string(),
            action.resource.cyan(),
            deps
        );
    }

    println!();
    println!("{}", plan.summary());
    if mode == Mode::Delete {
        println!(
            "{}",
            "Resources that do not exist are skipped when the plan runs.".dimmed()
        );
    }
    Ok(())
}
