//! Infra Scanner (C4). Runs a fixed inventory of read-only provider
//! CLI queries in parallel and joins before the Architect (C6). Every
//! probe failure is silently dropped — auth scope varies across
//! accounts and a missing permission shouldn't abort the scan
//! (InfraProbeFailure, §7).

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::{
  capability::CliRunner,
  entities::{InfraSnapshot, Provider, SecurityGroupInfo, SubnetInfo},
};

const DESCRIBE_TIMEOUT: std::time::Duration = command::DEFAULT_DESCRIBE_TIMEOUT;
const MAX_LIST_RESULTS: usize = 25;

pub async fn scan(
  cli: &dyn CliRunner,
  provider: Provider,
  env: &HashMap<String, String>,
  cancel: &CancellationToken,
) -> InfraSnapshot {
  if provider != Provider::Aws {
    // Non-AWS infra scanning reuses the same probe plumbing but isn't
    // specified in depth here; return an empty, safely-ignorable
    // snapshot rather than guessing at gcloud/az/wrangler inventory
    // commands.
    return InfraSnapshot::default();
  }

  let (
    account,
    vpcs,
    subnets,
    security_groups,
    ecr,
    ecs,
    albs,
    rds,
    cloudfront,
    ami,
  ) = tokio::join!(
    probe(cli, &["sts", "get-caller-identity"], env, cancel),
    probe(cli, &["ec2", "describe-vpcs", "--filters", "Name=is-default,Values=true"], env, cancel),
    probe(cli, &["ec2", "describe-subnets"], env, cancel),
    probe(cli, &["ec2", "describe-security-groups"], env, cancel),
    probe(cli, &["ecr", "describe-repositories"], env, cancel),
    probe(cli, &["ecs", "list-clusters"], env, cancel),
    probe(cli, &["elbv2", "describe-load-balancers"], env, cancel),
    probe(cli, &["rds", "describe-db-instances"], env, cancel),
    probe(cli, &["cloudfront", "list-distributions"], env, cancel),
    probe_ssm_ami(cli, env, cancel),
  );

  let mut snapshot = InfraSnapshot {
    region: env.get("AWS_REGION").cloned(),
    ..Default::default()
  };

  if let Some(json) = account {
    snapshot.account_id = json.get("Account").and_then(|v| v.as_str()).map(str::to_string);
  }
  if let Some(json) = vpcs {
    snapshot.default_vpc_id = json
      .get("Vpcs")
      .and_then(|v| v.as_array())
      .and_then(|a| a.first())
      .and_then(|v| v.get("VpcId"))
      .and_then(|v| v.as_str())
      .map(str::to_string);
  }
  if let Some(json) = subnets {
    snapshot.subnets = json
      .get("Subnets")
      .and_then(|v| v.as_array())
      .into_iter()
      .flatten()
      .take(MAX_LIST_RESULTS)
      .filter_map(|s| {
        Some(SubnetInfo {
          id: s.get("SubnetId")?.as_str()?.to_string(),
          availability_zone: s
            .get("AvailabilityZone")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
        })
      })
      .collect();
  }
  if let Some(json) = security_groups {
    snapshot.security_groups = json
      .get("SecurityGroups")
      .and_then(|v| v.as_array())
      .into_iter()
      .flatten()
      .take(MAX_LIST_RESULTS)
      .filter_map(|sg| {
        Some(SecurityGroupInfo {
          id: sg.get("GroupId")?.as_str()?.to_string(),
          name: sg.get("GroupName").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        })
      })
      .collect();
  }
  if let Some(json) = ecr {
    snapshot.ecr_repositories = string_list(&json, "repositories", "repositoryName");
  }
  if let Some(json) = ecs {
    snapshot.ecs_clusters = json
      .get("clusterArns")
      .and_then(|v| v.as_array())
      .into_iter()
      .flatten()
      .take(MAX_LIST_RESULTS)
      .filter_map(|v| v.as_str().map(str::to_string))
      .collect();
  }
  if let Some(json) = albs {
    snapshot.albs = string_list(&json, "LoadBalancers", "LoadBalancerName");
  }
  if let Some(json) = rds {
    snapshot.rds_instances = string_list(&json, "DBInstances", "DBInstanceIdentifier");
  }
  if let Some(json) = cloudfront {
    snapshot.cloudfront_distributions = json
      .get("DistributionList")
      .and_then(|v| v.get("Items"))
      .and_then(|v| v.as_array())
      .into_iter()
      .flatten()
      .take(MAX_LIST_RESULTS)
      .filter_map(|d| d.get("Id").and_then(|v| v.as_str()).map(str::to_string))
      .collect();
  }
  snapshot.latest_ami = ami;

  snapshot
}

fn string_list(json: &serde_json::Value, array_key: &str, field: &str) -> Vec<String> {
  json
    .get(array_key)
    .and_then(|v| v.as_array())
    .into_iter()
    .flatten()
    .take(MAX_LIST_RESULTS)
    .filter_map(|v| v.get(field).and_then(|v| v.as_str()).map(str::to_string))
    .collect()
}

async fn probe(
  cli: &dyn CliRunner,
  args: &[&str],
  env: &HashMap<String, String>,
  cancel: &CancellationToken,
) -> Option<serde_json::Value> {
  let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
  let mut args = args;
  args.push("--output".to_string());
  args.push("json".to_string());
  match cli.run("aws", &args, env, DESCRIBE_TIMEOUT, cancel).await {
    Ok(output) if output.success() => serde_json::from_str(&output.stdout).ok(),
    Ok(output) => {
      tracing::debug!("infra probe `aws {}` failed: {}", args.join(" "), output.stderr);
      None
    }
    Err(e) => {
      tracing::debug!("infra probe `aws {}` errored: {e:#}", args.join(" "));
      None
    }
  }
}

async fn probe_ssm_ami(
  cli: &dyn CliRunner,
  env: &HashMap<String, String>,
  cancel: &CancellationToken,
) -> Option<String> {
  let args = vec![
    "ssm".to_string(),
    "get-parameter".to_string(),
    "--name".to_string(),
    "/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-default-x86_64".to_string(),
    "--query".to_string(),
    "Parameter.Value".to_string(),
    "--output".to_string(),
    "text".to_string(),
  ];
  match cli.run("aws", &args, env, DESCRIBE_TIMEOUT, cancel).await {
    Ok(output) if output.success() => {
      let ami = output.stdout.trim();
      if ami.is_empty() { None } else { Some(ami.to_string()) }
    }
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::capability::CliRunner;
  use async_trait::async_trait;
  use command::CliOutput;
  use std::time::Duration;

  struct FakeCli;

  #[async_trait]
  impl CliRunner for FakeCli {
    async fn run(
      &self,
      _program: &str,
      args: &[String],
      _env: &HashMap<String, String>,
      _timeout: Duration,
      _cancel: &CancellationToken,
    ) -> anyhow::Result<CliOutput> {
      if args.contains(&"get-caller-identity".to_string()) {
        return Ok(CliOutput {
          stdout: r#"{"Account":"123456789012"}"#.to_string(),
          stderr: String::new(),
          exit_code: 0,
        });
      }
      if args.contains(&"describe-load-balancers".to_string()) {
        // simulate a permission error, which must not abort the scan
        return Ok(CliOutput {
          stdout: String::new(),
          stderr: "AccessDenied".to_string(),
          exit_code: 254,
        });
      }
      Ok(CliOutput { stdout: "{}".to_string(), stderr: String::new(), exit_code: 0 })
    }
  }

  #[tokio::test]
  async fn silently_ignores_probe_failures() {
    let cancel = CancellationToken::new();
    let snapshot = scan(&FakeCli, Provider::Aws, &HashMap::new(), &cancel).await;
    assert_eq!(snapshot.account_id.as_deref(), Some("123456789012"));
    assert!(snapshot.albs.is_empty());
  }
}
