use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use bellhop_core::tool::typed_tool;
use bellhop_model::{Tool, ToolError};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::task::spawn_blocking;

const MAX_LINES: usize = 50;

#[derive(Deserialize, JsonSchema)]
struct ReadFileItem {
    #[schemars(description = "Absolute path to the file.")]
    path: String,
    #[schemars(description = "1-based start line to read from, default to 1.")]
    start_line: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
struct ReadFileParameters {
    #[schemars(description = "Files to read.")]
    files: Vec<ReadFileItem>,
}

/// Creates the `read_file` tool, which returns file contents prefixed with
/// line numbers, up to 50 lines per file.
pub fn read_file_tool() -> Tool {
    typed_tool(
        "read_file",
        "Reads files from absolute paths and returns their contents prefixed \
         with line numbers. Each file includes a path and a 1-based start \
         line, and returns up to 50 lines.",
        |cancel, input: ReadFileParameters| async move {
            let mut result = String::new();
            for file in input.files {
                if cancel.is_cancelled() {
                    return Err(ToolError::execution_error()
                        .with_reason("cancelled"));
                }
                if !Path::new(&file.path).is_absolute() {
                    return Err(ToolError::invalid_input()
                        .with_reason("`path` must be absolute"));
                }
                let start_line = file.start_line.unwrap_or(1);
                if start_line == 0 {
                    return Err(ToolError::invalid_input()
                        .with_reason("`start_line` must be 1-based"));
                }

                let section = spawn_blocking(move || {
                    read_file_section(&file.path, start_line)
                })
                .await
                .map_err(|_| {
                    ToolError::execution_error()
                        .with_reason("failed to read file")
                })??;

                if !result.is_empty() {
                    result.push('\n');
                }
                result.push_str(&section);
            }
            Ok(result)
        },
    )
}

fn read_file_section(
    path: &str,
    start_line: usize,
) -> Result<String, ToolError> {
    let file = File::open(path).map_err(|err| {
        ToolError::execution_error().with_reason(err.to_string())
    })?;
    format_reader_section(path, file, start_line)
}

fn format_reader_section<R: Read>(
    path: &str,
    reader: R,
    start_line: usize,
) -> Result<String, ToolError> {
    let lines = BufReader::new(reader)
        .lines()
        .skip(start_line - 1)
        .take(MAX_LINES)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            ToolError::execution_error().with_reason(err.to_string())
        })?;

    let mut result = format!("==> {path} <==\n");
    let last_line_no = start_line + lines.len().saturating_sub(1);
    let width = last_line_no.to_string().len();
    for (offset, line) in lines.into_iter().enumerate() {
        let line_no = start_line + offset;
        result.push_str(&format!("{line_no:>width$}: {line}\n"));
    }
    Ok(result)
}
