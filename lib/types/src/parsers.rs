/// Parses commands out of a multiline string and chains them together
/// with `&&`. Supports full-line comments (`# ...`) and end-of-line
/// comments. Blank lines and comment-only lines are dropped.
///
/// The result may be empty if every line was a comment.
pub fn parse_multiline_command(input: impl AsRef<str>) -> String {
  input
    .as_ref()
    .lines()
    .map(strip_comment)
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .collect::<Vec<_>>()
    .join(" && ")
}

fn strip_comment(line: &str) -> &str {
  let mut in_single = false;
  let mut in_double = false;
  let bytes = line.as_bytes();
  for (i, b) in bytes.iter().enumerate() {
    match b {
      b'\'' if !in_double => in_single = !in_single,
      b'"' if !in_single => in_double = !in_double,
      b'#' if !in_single && !in_double => return &line[..i],
      _ => {}
    }
  }
  line
}

/// Parses a `KEY=VALUE` list (one per line, `#` comments, blank lines
/// ignored) as used by `.env` files and deep-analysis env var specs.
pub fn parse_key_value_list(
  input: &str,
) -> anyhow::Result<Vec<(String, String)>> {
  let mut out = Vec::new();
  for (lineno, raw_line) in input.lines().enumerate() {
    let line = strip_comment(raw_line).trim();
    if line.is_empty() {
      continue;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let Some((key, value)) = line.split_once('=') else {
      anyhow::bail!(
        "failed to parse key=value pair on line {}: {raw_line:?}",
        lineno + 1
      );
    };
    let key = key.trim().to_string();
    let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
    out.push((key, value));
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn multiline_drops_comments() {
    let input = "# setup\nnpm install # deps\n\nnpm run build\n";
    assert_eq!(parse_multiline_command(input), "npm install && npm run build");
  }

  #[test]
  fn multiline_all_comments_is_empty() {
    assert_eq!(parse_multiline_command("# only a comment\n"), "");
  }

  #[test]
  fn key_value_list_parses_env_file() {
    let input = "# comment\nPORT=3000\nexport DATABASE_URL=\"postgres://x\"\n";
    let parsed = parse_key_value_list(input).unwrap();
    assert_eq!(
      parsed,
      vec![
        ("PORT".to_string(), "3000".to_string()),
        ("DATABASE_URL".to_string(), "postgres://x".to_string()),
      ]
    );
  }
}
