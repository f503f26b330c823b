use std::path::Path;

use bellhop_core::tool::typed_tool;
use bellhop_model::{Tool, ToolError};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::task::spawn_blocking;

const MAX_MATCHES: usize = 50;

#[derive(Deserialize, JsonSchema)]
struct GlobParameters {
    #[schemars(description = "The glob pattern, must be relative to `path`.")]
    pattern: String,
    #[schemars(description = "Absolute path to search in.")]
    path: String,
}

/// Creates the `glob` tool, which lists up to 50 paths matching a pattern.
pub fn glob_tool() -> Tool {
    typed_tool(
        "glob",
        "Finds files and directories using glob patterns. Supports standard \
         glob syntax like *, ? and ** for recursive searches.",
        |_, input: GlobParameters| async move {
            let pattern = full_pattern(&input)?;
            let paths = glob::glob(&pattern).map_err(|err| {
                ToolError::invalid_input().with_reason(err.to_string())
            })?;

            spawn_blocking(move || {
                let mut result = String::new();
                for item in paths.take(MAX_MATCHES).flatten() {
                    result.push_str(&item.to_string_lossy());
                    result.push('\n');
                }
                result
            })
            .await
            .map_err(|_| {
                ToolError::execution_error().with_reason("failed to execute glob")
            })
        },
    )
}

fn full_pattern(input: &GlobParameters) -> Result<String, ToolError> {
    if Path::new(&input.pattern).is_absolute() {
        return Err(ToolError::invalid_input()
            .with_reason("`pattern` must be relative to `path`"));
    }
    if !Path::new(&input.path).is_absolute() {
        return Err(
            ToolError::invalid_input().with_reason("`path` must be absolute")
        );
    }

    let mut pattern = input.path.clone();
    if !pattern.ends_with('/') {
        pattern.push('/');
    }
    pattern.push_str(&input.pattern);
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pattern: &str, path: &str) -> GlobParameters {
        GlobParameters {
            pattern: pattern.to_owned(),
            path: path.to_owned(),
        }
    }

    #[test]
    fn test_input_validation() {
        assert!(full_pattern(&params("*.rs", "some/relative/path")).is_err());
        assert!(full_pattern(&params("/etc/*", "/tmp")).is_err());
        assert_eq!(
            full_pattern(&params("**/*.rs", "/src")).unwrap(),
            "/src/**/*.rs"
        );
        assert_eq!(full_pattern(&params("*", "/src/")).unwrap(), "/src/*");
    }
}
