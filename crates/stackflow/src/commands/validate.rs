use crate::GlobalOpts;
use crate::utils;
use colored::Colorize;

pub fn handle(opts: &GlobalOpts) -> anyhow::Result<()> {
    println!("{}", "Validating stack...".blue());

    let (template, source) = match utils::load_stack(opts.file.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Invalid stack".red().bold());
            return Err(e);
        }
    };
    let graph = template.graph()?;
    let order = graph.creation_order()?;

    println!("{}", "✓ Stack is valid".green().bold());
    println!();
    println!("Summary:");
    println!("  stack: {}", template.name.cyan());
    println!("  source: {}", source);
    println!(
        "  region: {}",
        utils::region(opts, &template).unwrap_or_else(|| "(AWS default)".to_string())
    );
    println!("  variables: {}", template.variables.len());
    println!("  resources: {}", template.len());
    for spec in order {
        let deps = if spec.depends_on.is_empty() {
            String::new()
        } else {
            format!(" <- {}", spec.depends_on.join(", "))
        };
        println!("    - {} ({}){}", spec.name.cyan(), spec.kind, deps.dimmed());
    }
    Ok(())
}
