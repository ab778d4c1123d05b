use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetInfo {
  pub id: String,
  pub availability_zone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroupInfo {
  pub name: String,
  pub id: String,
}

/// Read-only inventory of the target cloud account, built once per
/// run by the Infra Scanner (C4). Every field is best-effort: a probe
/// that fails (auth, throttling, region mismatch) is silently dropped
/// rather than aborting the scan (InfraProbeFailure, §7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfraSnapshot {
  pub account_id: Option<String>,
  pub region: Option<String>,
  pub default_vpc_id: Option<String>,
  pub subnets: Vec<SubnetInfo>,
  pub security_groups: Vec<SecurityGroupInfo>,
  pub ecr_repositories: Vec<String>,
  pub ecs_clusters: Vec<String>,
  pub albs: Vec<String>,
  pub rds_instances: Vec<String>,
  pub cloudfront_distributions: Vec<String>,
  pub latest_ami: Option<String>,
}

impl InfraSnapshot {
  /// Builds the fixed alias table the Placeholder Resolver (C14)
  /// seeds bindings from, e.g. `VPC_ID`, `SUBNET_1A_ID`, `ALB_SG_ID`
  /// (the security group whose name contains "alb"), `AMI_ID` (the
  /// latest scanned AMI).
  pub fn to_bindings(&self) -> HashMap<String, String> {
    let mut bindings = HashMap::new();
    if let Some(vpc) = &self.default_vpc_id {
      bindings.insert("VPC_ID".to_string(), vpc.clone());
    }
    if let Some(region) = &self.region {
      bindings.insert("REGION".to_string(), region.clone());
    }
    if let Some(account_id) = &self.account_id {
      bindings.insert("ACCOUNT_ID".to_string(), account_id.clone());
    }
    if let Some(ami) = &self.latest_ami {
      bindings.insert("AMI_ID".to_string(), ami.clone());
    }
    for (i, subnet) in self.subnets.iter().enumerate() {
      bindings.insert(format!("SUBNET_{}_ID", subnet.availability_zone), subnet.id.clone());
      if i == 0 {
        bindings.insert("SUBNET_ID".to_string(), subnet.id.clone());
      }
    }
    for sg in &self.security_groups {
      let lower = sg.name.to_ascii_lowercase();
      if lower.contains("alb") {
        bindings.insert("ALB_SG_ID".to_string(), sg.id.clone());
      }
      if lower.contains("default") {
        bindings.insert("DEFAULT_SG_ID".to_string(), sg.id.clone());
      }
    }
    bindings
  }
}

/// Process-local placeholder → value map. Seeded from
/// [InfraSnapshot::to_bindings], extended at execution time from
/// `produces` outputs of earlier commands. Bindings only grow; a key
/// is never overwritten once set ("Binding monotonicity" law, §8).
#[derive(Debug, Clone, Default)]
pub struct Bindings(HashMap<String, String>);

impl Bindings {
  pub fn new(seed: HashMap<String, String>) -> Self {
    Bindings(seed)
  }

  pub fn as_map(&self) -> &HashMap<String, String> {
    &self.0
  }

  /// Inserts `value` under `name` unless a value is already bound,
  /// returning whether the insert took effect.
  pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
    let name = name.into();
    if self.0.contains_key(&name) {
      return false;
    }
    self.0.insert(name, value.into());
    true
  }

  pub fn get(&self, name: &str) -> Option<&String> {
    self.0.get(name)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}
