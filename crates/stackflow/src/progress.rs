use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use stackflow_cloud::{ActionType, ApplyEvent};

/// Spinner driven by orchestrator events
pub struct ApplyProgress {
    progress_bar: ProgressBar,
}

impl ApplyProgress {
    pub fn new(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { progress_bar: pb }
    }

    /// Listener to hand to [`stackflow_cloud::Orchestrator::with_listener`]
    pub fn listener(&self) -> impl Fn(&ApplyEvent) + Send + Sync + 'static {
        let pb = self.progress_bar.clone();
        move |event| match event {
            ApplyEvent::Started {
                resource,
                kind,
                action,
            } => {
                let verb = match action {
                    ActionType::Create => "Creating",
                    ActionType::Delete => "Deleting",
                    ActionType::NoOp => "Checking",
                };
                pb.set_message(format!("{} {} '{}'...", verb, kind, resource));
            }
            ApplyEvent::Created { resource, kind, id } => {
                pb.inc(1);
                line(&pb, format!("  {} {} {} ({})", "✓".green(), kind, resource.cyan(), id));
            }
            ApplyEvent::Deleted { resource, kind, id } => {
                pb.inc(1);
                line(
                    &pb,
                    format!("  {} {} {} deleted ({})", "✓".green(), kind, resource.cyan(), id),
                );
            }
            ApplyEvent::Skipped {
                resource,
                kind,
                reason,
            } => {
                pb.inc(1);
                line(
                    &pb,
                    format!("  {} {} {} ({})", "-".dimmed(), kind, resource, reason).dimmed().to_string(),
                );
            }
            ApplyEvent::Failed {
                resource,
                kind,
                error,
            } => {
                line(
                    &pb,
                    format!("  {} {} {}: {}", "✗".red(), kind, resource.cyan(), error.red()),
                );
            }
        }
    }

    pub fn finish(&self, message: &str) {
        self.progress_bar.finish_and_clear();
        println!("{}", message);
    }

    pub fn abandon(&self) {
        self.progress_bar.abandon_with_message("aborted");
    }
}

/// Print above the spinner; straight to stdout when it is not drawn
fn line(pb: &ProgressBar, message: String) {
    if pb.is_hidden() {
        println!("{}", message);
    } else {
        pb.println(message);
    }
}
