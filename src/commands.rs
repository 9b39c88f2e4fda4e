//! Dashboard commands typed at the prompt or passed with `-c`.
//!
//! A leading `/` is optional, so `/check` and `check` are the same command.
//! Arguments are split shell-style, so quoted names may contain spaces.

use crate::sync::UpdateScope;
use anyhow::{anyhow, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Re-fetch the container list, dropping selection and check results
    Refresh,
    /// Print the current list without contacting the server
    Status,
    Check,
    /// Toggle selection of every container matching each pattern
    Select(Vec<String>),
    Update(UpdateScope),
    Logout,
    Trace,
    Help,
    Exit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let words = shell_words::split(line.trim())
            .map_err(|e| anyhow!("Could not parse command: {}", e))?;
        let (head, args) = match words.split_first() {
            Some((head, args)) => (head.trim_start_matches('/').to_lowercase(), args),
            None => return Err(anyhow!("Empty command")),
        };

        let command = match head.as_str() {
            "refresh" | "list" | "ls" => Command::Refresh,
            "status" | "show" => Command::Status,
            "check" => Command::Check,
            "select" | "toggle" => {
                if args.is_empty() {
                    return Err(anyhow!("Usage: select <name|id|pattern>..."));
                }
                Command::Select(args.to_vec())
            }
            "update" => match args.first().map(|a| a.to_lowercase()).as_deref() {
                None | Some("selected") => Command::Update(UpdateScope::Selected),
                Some("all") => Command::Update(UpdateScope::All),
                Some(other) => {
                    return Err(anyhow!(
                        "Unknown update target '{}'. Use: update [selected|all]",
                        other
                    ))
                }
            },
            "logout" => Command::Logout,
            "trace" => Command::Trace,
            "help" | "?" => Command::Help,
            "exit" | "quit" => Command::Exit,
            other => return Err(anyhow!("Unknown command: {}", other)),
        };

        match command {
            Command::Select(_) | Command::Update(_) => {}
            _ if !args.is_empty() => {
                return Err(anyhow!("'{}' takes no arguments", head));
            }
            _ => {}
        }

        Ok(command)
    }
}

pub fn help_text() -> &'static str {
    "Commands:
  list | refresh          - fetch the container list (clears selection and check results)
  status                  - show the list again
  check                   - check every container for a newer image
  select <name|id|glob>.. - toggle selection, e.g. select web-* \"my app\"
  update [selected]       - update the selected containers, then re-check
  update all              - update every container with an available update
  logout                  - forget the token and return to the login prompt
  trace                   - toggle request tracing
  help                    - show commands
  exit                    - quit"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("list").unwrap(), Command::Refresh);
        assert_eq!(Command::parse("/refresh").unwrap(), Command::Refresh);
        assert_eq!(Command::parse("  CHECK ").unwrap(), Command::Check);
        assert_eq!(Command::parse("/exit").unwrap(), Command::Exit);
        assert_eq!(Command::parse("quit").unwrap(), Command::Exit);
        assert_eq!(Command::parse("?").unwrap(), Command::Help);
    }

    #[test]
    fn test_parse_update_scope() {
        assert_eq!(
            Command::parse("update").unwrap(),
            Command::Update(UpdateScope::Selected)
        );
        assert_eq!(
            Command::parse("update all").unwrap(),
            Command::Update(UpdateScope::All)
        );
        assert!(Command::parse("update everything").is_err());
    }

    #[test]
    fn test_parse_select_quoted() {
        assert_eq!(
            Command::parse(r#"select web-* "my app""#).unwrap(),
            Command::Select(vec!["web-*".to_string(), "my app".to_string()])
        );
        assert!(Command::parse("select").is_err());
        assert!(Command::parse(r#"select "unterminated"#).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_and_extra_args() {
        assert!(Command::parse("").is_err());
        assert!(Command::parse("frobnicate").is_err());
        let err = Command::parse("check now").unwrap_err();
        assert!(err.to_string().contains("takes no arguments"));
    }
}
