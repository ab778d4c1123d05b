mod architect;
mod deep_analysis;
mod docker_analysis;
mod infra;
mod plan;
mod repo_profile;

pub use architect::{ArchitectDecision, Sizing};
pub use deep_analysis::{DeepAnalysis, EnvVarSpec};
pub use docker_analysis::DockerAnalysis;
pub use infra::{Bindings, InfraSnapshot, SecurityGroupInfo, SubnetInfo};
pub use plan::{Command, Plan, PlanPage, PlanValidation, Provider};
pub use repo_profile::RepoProfile;

/// Parses a port string (or a bare integer already in range),
/// accepting only `[1, 65535]`. Per Design Notes open question (c):
/// the source's `parseFlagInt` silently rejected negative numbers;
/// here any out-of-range or unparsable value is explicitly treated as
/// absent rather than silently defaulting to 0.
pub fn parse_port(input: &str) -> Option<u16> {
  let n: i64 = input.trim().parse().ok()?;
  if (1..=65535).contains(&n) { Some(n as u16) } else { None }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_port_rejects_out_of_range() {
    assert_eq!(parse_port("0"), None);
    assert_eq!(parse_port("-1"), None);
    assert_eq!(parse_port("65536"), None);
    assert_eq!(parse_port("8080"), Some(8080));
    assert_eq!(parse_port("65535"), Some(65535));
  }
}
