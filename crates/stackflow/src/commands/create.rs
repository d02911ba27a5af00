use crate::GlobalOpts;
use crate::progress::ApplyProgress;
use crate::utils;
use colored::Colorize;
use stackflow_cloud::Orchestrator;

pub async fn handle(opts: &GlobalOpts) -> anyhow::Result<()> {
    let (template, source) = utils::load_stack(opts.file.as_deref())?;
    utils::print_stack_header("Creating", &template, &source);
    let (plane, description) = utils::connect(opts, &template).await?;
    println!("  control plane: {}", description);
    println!();

    let progress = ApplyProgress::new(template.len());
    let orchestrator = Orchestrator::new(plane).with_listener(progress.listener());

    match orchestrator.create(&template).await {
        Ok(report) => {
            progress.finish(
                &format!(
                    "{} {} resource(s) created in {:.1}s",
                    "✓".green().bold(),
                    report.state.len(),
                    report.duration_ms as f64 / 1000.0
                )
                .green()
                .to_string(),
            );
            utils::print_endpoints(&report.state);
            Ok(())
        }
        Err(e) => {
            progress.abandon();
            eprintln!();
            if e.completed.is_empty() {
                eprintln!("{}", "Nothing was created.".yellow());
            } else {
                eprintln!(
                    "{}",
                    "Created before the failure (left in place, run with -d to remove):".yellow()
                );
                for name in &e.completed {
                    let id = e
                        .report
                        .state
                        .get(name)
                        .map(|s| s.id.as_str())
                        .unwrap_or_default();
                    eprintln!("  • {} ({})", name.cyan(), id);
                }
            }
            Err(e.into())
        }
    }
}
