use std::io::ErrorKind;
use std::process::ExitStatus;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("no clipboard utility found (tried {0})")]
    NoTool(String),

    #[error("failed to run `{tool}`: {source}")]
    Io {
        tool: &'static str,
        source: std::io::Error,
    },

    #[error("`{tool}` exited with {status}")]
    Failed {
        tool: &'static str,
        status: ExitStatus,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Tool {
    pub program: &'static str,
    pub args: &'static [&'static str],
}

#[cfg(target_os = "macos")]
const TOOLS: &[Tool] = &[Tool {
    program: "pbcopy",
    args: &[],
}];

#[cfg(windows)]
const TOOLS: &[Tool] = &[Tool {
    program: "clip",
    args: &[],
}];

#[cfg(not(any(target_os = "macos", windows)))]
const TOOLS: &[Tool] = &[
    Tool {
        program: "wl-copy",
        args: &[],
    },
    Tool {
        program: "xclip",
        args: &["-selection", "clipboard"],
    },
    Tool {
        program: "xsel",
        args: &["--clipboard", "--input"],
    },
];

/// Puts `text` on the system clipboard and returns the utility that took it.
pub async fn copy(text: &str) -> Result<&'static str, ClipboardError> {
    copy_with(TOOLS, text).await
}

/// Tries each tool in order; a tool that is not installed is skipped.
pub async fn copy_with(tools: &[Tool], text: &str) -> Result<&'static str, ClipboardError> {
    for tool in tools {
        let mut child = match Command::new(tool.program)
            .args(tool.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(tool = tool.program, "clipboard utility not installed");
                continue;
            }
            Err(source) => {
                return Err(ClipboardError::Io {
                    tool: tool.program,
                    source,
                });
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|source| ClipboardError::Io {
                    tool: tool.program,
                    source,
                })?;
            // Closing stdin tells the tool the input is complete
            drop(stdin);
        }

        let status = child.wait().await.map_err(|source| ClipboardError::Io {
            tool: tool.program,
            source,
        })?;

        if !status.success() {
            return Err(ClipboardError::Failed {
                tool: tool.program,
                status,
            });
        }

        debug!(tool = tool.program, "link copied");
        return Ok(tool.program);
    }

    let tried: Vec<_> = tools.iter().map(|tool| tool.program).collect();
    Err(ClipboardError::NoTool(tried.join(", ")))
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    const MISSING: Tool = Tool {
        program: "cors-probe-no-such-clipboard-tool",
        args: &[],
    };

    #[tokio::test]
    async fn skips_missing_tools() {
        let tools = [
            MISSING,
            Tool {
                program: "cat",
                args: &[],
            },
        ];

        assert_eq!(copy_with(&tools, "https://x/?url=a").await.unwrap(), "cat");
    }

    #[tokio::test]
    async fn reports_when_nothing_is_installed() {
        let err = copy_with(&[MISSING], "link").await.unwrap_err();
        assert!(matches!(err, ClipboardError::NoTool(ref tried) if tried == MISSING.program));
    }

    #[tokio::test]
    async fn reports_failing_tool() {
        let tools = [Tool {
            program: "sh",
            args: &["-c", "cat > /dev/null; exit 3"],
        }];

        let err = copy_with(&tools, "link").await.unwrap_err();
        assert!(matches!(err, ClipboardError::Failed { tool: "sh", .. }));
    }
}
