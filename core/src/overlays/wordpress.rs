use crate::entities::{ArchitectDecision, DeepAnalysis, Plan, Provider, RepoProfile};

use super::Overlay;

pub struct WordpressOverlay;

impl Overlay for WordpressOverlay {
  fn name(&self) -> &'static str {
    "wordpress"
  }

  fn matches(&self, profile: &RepoProfile, _deep: &DeepAnalysis) -> bool {
    profile.framework.as_deref() == Some("wordpress")
  }

  /// WordPress always lands on EC2 behind an ALB — there's no
  /// serverless WordPress deploy worth generating by default (§4.6).
  fn apply_override(&self, arch: &mut ArchitectDecision) {
    if arch.provider == Provider::Aws {
      arch.method = "ec2".to_string();
      arch.needs_alb = true;
      arch.needs_db = true;
      if arch.db_service.is_none() {
        arch.db_service = Some("mariadb".to_string());
      }
    }
  }

  fn requirements(&self, plan: &Plan) -> Vec<String> {
    let mut issues = Vec::new();

    let user_data_blob: String = plan
      .commands
      .iter()
      .flat_map(|c| c.args.iter())
      .cloned()
      .collect::<Vec<_>>()
      .join(" ");
    let lower = user_data_blob.to_ascii_lowercase();

    if !lower.contains("wordpress") {
      issues.push("[HARD] wordpress overlay: no wordpress image reference found in plan".to_string());
    }
    if !lower.contains("mariadb") && !lower.contains("mysql") {
      issues.push("[HARD] wordpress overlay: no mariadb/mysql service reference found in plan".to_string());
    }
    if !lower.contains("wp-login.php") {
      issues.push("[HARD] wordpress overlay: health check path /wp-login.php not referenced".to_string());
    }
    if plan.position_of("elbv2", "create-target-group").is_none() {
      issues.push("[HARD] wordpress overlay: no ALB target group on port 80".to_string());
    }
    if lower.contains("wordpress_db_password") && lower.contains("secretsmanager") {
      issues.push(
        "[HARD] wordpress overlay: WORDPRESS_DB_PASSWORD must not be stored in Secrets Manager"
          .to_string(),
      );
    }

    issues
  }
}
