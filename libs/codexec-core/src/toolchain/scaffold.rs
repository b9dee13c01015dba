//! Staging helpers: file writes, asset copies and generated-code splicing.

use codexec_common::{ExecutorError, Result};
use std::fs;
use std::path::Path;

/// Line that a runner template reserves for generated call-site code.
pub const WRAPPER_MARKER: &str = "// @codexec:solution-wrapper";

pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, contents).map_err(|source| ExecutorError::Scaffold {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ExecutorError::Scaffold {
        path: path.to_path_buf(),
        source,
    })
}

pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    ensure_parent(to)?;
    fs::copy(from, to).map_err(|source| ExecutorError::Scaffold {
        path: from.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ExecutorError::Scaffold {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Replace the line holding `marker` with `insertion`.
///
/// Exactly one marker line is expected; `None` when there is none.
pub fn splice_at_marker(template: &str, marker: &str, insertion: &str) -> Option<String> {
    let mut spliced = String::with_capacity(template.len() + insertion.len());
    let mut found = false;
    for line in template.split_inclusive('\n') {
        if !found && line.trim() == marker {
            found = true;
            spliced.push_str(insertion);
            if !insertion.ends_with('\n') {
                spliced.push('\n');
            }
        } else {
            spliced.push_str(line);
        }
    }
    found.then_some(spliced)
}

/// Read `template_path` and splice `insertion` at [`WRAPPER_MARKER`].
pub fn render_template(template_path: &Path, insertion: &str) -> Result<String> {
    let template = read_file(template_path)?;
    splice_at_marker(&template, WRAPPER_MARKER, insertion).ok_or_else(|| ExecutorError::MissingMarker {
        template: template_path.to_path_buf(),
        marker: WRAPPER_MARKER.to_string(),
    })
}

/// Call-site function for the C++ runner: unpacks `arity` positional
/// arguments from a JSON array and forwards them to `solution`.
pub fn cpp_call_wrapper(arity: usize) -> String {
    let args = (0..arity)
        .map(|i| format!("args[{}]", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "auto solutionWrapper(json args) {{\n    return solution({});\n}}\n",
        args
    )
}
