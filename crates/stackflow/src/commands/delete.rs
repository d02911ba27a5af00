use crate::GlobalOpts;
use crate::progress::ApplyProgress;
use crate::utils;
use colored::Colorize;
use stackflow_cloud::{Orchestrator, Outcome};

pub async fn handle(opts: &GlobalOpts) -> anyhow::Result<()> {
    let (template, source) = utils::load_stack(opts.file.as_deref())?;
    utils::print_stack_header("Deleting", &template, &source);
    let (plane, description) = utils::connect(opts, &template).await?;
    println!("  control plane: {}", description);
    println!();

    let progress = ApplyProgress::new(template.len());
    let orchestrator = Orchestrator::new(plane).with_listener(progress.listener());

    match orchestrator.delete(&template).await {
        Ok(report) => {
            let deleted = report.count(Outcome::Succeeded);
            let message = if deleted == 0 {
                "Nothing to delete, the stack is not deployed".yellow().to_string()
            } else {
                format!(
                    "{} {} resource(s) deleted, {} already absent",
                    "✓".green().bold(),
                    deleted,
                    report.count(Outcome::Skipped)
                )
                .green()
                .to_string()
            };
            progress.finish(&message);
            Ok(())
        }
        Err(e) => {
            progress.abandon();
            if !e.completed.is_empty() {
                eprintln!();
                eprintln!("{}", "Deleted before the failure:".yellow());
                for name in &e.completed {
                    eprintln!("  • {}", name.cyan());
                }
            }
            Err(e.into())
        }
    }
}
