use crate::GlobalOpts;
use crate::utils;
use stackflow_core::{ExportFormat, render_cloudformation};

pub fn handle(opts: &GlobalOpts, format: &str) -> anyhow::Result<()> {
    let format: ExportFormat = format.parse()?;
    let (template, _) = utils::load_stack(opts.file.as_deref())?;
    print!("{}", render_cloudformation(&template, format)?);
    if format == ExportFormat::Json {
        println!();
    }
    Ok(())
}
