/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Render a template against a JSON state table.
 */

use crate::diagnostics;
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use weft_source_map::SourceContext;
use weft_template::{
    ErrorList, FileSystemResolver, StateTable, Template, TemplateCache, WeftConfig,
};

pub struct RenderArgs {
    pub template: PathBuf,
    pub data: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub json_errors: bool,
    pub config: WeftConfig,
}

/// Result of one render, before anything is printed.
pub struct Rendered {
    pub output: String,
    pub errors: ErrorList,
    /// Every template that took part, for rendering diagnostics.
    pub sources: SourceContext,
    pub state: StateTable,
}

pub fn execute(args: RenderArgs) -> Result<()> {
    let rendered = render(&args.template, args.data.as_deref(), &args.config)?;

    diagnostics::report(rendered.errors.as_slice(), &rendered.sources, args.json_errors)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered.output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            info!(output = %path.display(), "wrote output");
        }
        None => print!("{}", rendered.output),
    }

    let errors = diagnostics::count_errors(rendered.errors.as_slice());
    if errors > 0 {
        bail!("Rendering {} produced {errors} error(s)", args.template.display());
    }
    Ok(())
}

/// Compile and evaluate `template`.
///
/// `#parse` and `#include` search the template's own directory first and
/// then the configured template directories.
pub fn render(template: &Path, data: Option<&Path>, config: &WeftConfig) -> Result<Rendered> {
    let options = config.compile_options();
    let compiled = Template::compile_from_file(template, &options)
        .with_context(|| format!("Failed to read template {}", template.display()))?;
    let mut state = load_state(data)?;

    let mut search_dirs: Vec<PathBuf> = template.parent().map(Path::to_path_buf).into_iter().collect();
    search_dirs.extend(config.template_dirs.iter().cloned());
    debug!(?search_dirs, "template search path");

    let cache = TemplateCache::with_options(FileSystemResolver::new(search_dirs), options);
    let result = compiled.evaluate_with(&mut state, &cache, config.eval_options());

    let mut sources = cache.source_context();
    sources.add_file_with_id(
        compiled.file_id(),
        compiled.name().to_string(),
        Some(compiled.source().to_string()),
    );

    Ok(Rendered {
        output: result.output,
        errors: result.errors,
        sources,
        state,
    })
}

fn load_state(data: Option<&Path>) -> Result<StateTable> {
    let Some(path) = data else {
        return Ok(StateTable::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read data file {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    match StateTable::from_json(&json) {
        Some(state) => Ok(state),
        None => bail!("Data file {} must contain a JSON object", path.display()),
    }
}
