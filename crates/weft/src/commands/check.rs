/*
 * check.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Report syntax errors without evaluating.
 */

use crate::diagnostics;
use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use tracing::info;
use weft_template::{Template, WeftConfig};

pub fn execute(templates: &[PathBuf], config: &WeftConfig) -> Result<()> {
    if templates.is_empty() {
        bail!("No templates given");
    }
    let options = config.compile_options();
    let mut failed = 0;
    for path in templates {
        let template = Template::compile_from_file(path, &options)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        let found = template.parse_diagnostics();
        if found.is_empty() {
            info!(template = %path.display(), "ok");
            continue;
        }
        failed += 1;
        diagnostics::report(found, &template.source_context(), false)?;
    }
    if failed > 0 {
        bail!("{failed} of {} template(s) have syntax errors", templates.len());
    }
    Ok(())
}
