use anyhow::Result;
use colored::Colorize;
use sshkit::{DeployPlan, HostKeyPolicy, ProcessTransport, Transport};
use std::time::Duration;

use crate::Context;
use crate::cli::DoctorArgs;
use crate::config::{self, FileConfig};
use crate::ui;

/// Bound on the `--online` script URL probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Key files ssh tries by default.
const DEFAULT_KEYS: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

struct Issue {
    category: &'static str,
    summary: String,
    detail: Option<String>,
    fix: Option<String>,
    fix_cmd: Option<String>,
}

pub fn run(ctx: &Context, args: DoctorArgs) -> Result<()> {
    ui::banner();
    ui::header("Deployment Health Check");

    let mut issues: Vec<Issue> = Vec::new();
    let transport = ProcessTransport::new();

    let plan = check_config(ctx, &args, &mut issues);
    check_tools(&transport, plan.as_ref(), &mut issues);
    check_ssh_keys(&mut issues);

    if let Some(plan) = &plan {
        check_plan(plan, &mut issues);
        if args.online {
            check_script_url(plan, &mut issues);
        }
    }

    println!();
    if issues.is_empty() {
        ui::success("Ready to deploy!");
    } else {
        print_issue_summary(&issues);
    }

    Ok(())
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        let num = i + 1;
        println!(
            "  {}  {} {}",
            format!("{num}.").bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        if let Some(cmd) = &issue.fix_cmd {
            println!("      {} {}", "$".dimmed(), cmd.bold());
        }
        println!();
    }
}

fn check_config(ctx: &Context, args: &DoctorArgs, issues: &mut Vec<Issue>) -> Option<DeployPlan> {
    ui::section("Configuration");

    let (file, path) = match FileConfig::load(ctx.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            println!("  {} {}", "✗".red(), "config file could not be loaded".red());
            issues.push(Issue {
                category: "Configuration",
                summary: "Config file is invalid".into(),
                detail: Some(format!("{e:#}")),
                fix: Some("Fix the file or regenerate it".into()),
                fix_cmd: Some("rdeploy config init --force".into()),
            });
            return None;
        }
    };

    if path.exists() {
        println!("  {} {}", "✓".green(), path.display());
    } else {
        println!(
            "  {} {} {}",
            "-".dimmed(),
            path.display(),
            "(not found, using flags and env)".dimmed()
        );
    }

    if file.server.password.is_some() {
        println!("  {} password stored in config file", "⚠".yellow());
        issues.push(Issue {
            category: "Configuration",
            summary: "Password is stored in plain text in the config file".into(),
            detail: Some(path.display().to_string()),
            fix: Some("Remove [server].password and export RDEPLOY_PASSWORD instead".into()),
            fix_cmd: None,
        });
    }

    match config::resolve(&file, &args.target) {
        Ok(plan) => {
            println!(
                "  {} target {} (port {})",
                "✓".green(),
                plan.endpoint.destination(),
                plan.endpoint.port
            );
            Some(plan)
        }
        Err(e) => {
            println!("  {} {}", "✗".red(), format!("{e}").red());
            issues.push(Issue {
                category: "Configuration",
                summary: "Deployment target is incomplete".into(),
                detail: Some(format!("{e:#}")),
                fix: Some("Create a config file and fill in [server] and [script]".into()),
                fix_cmd: Some("rdeploy config init".into()),
            });
            None
        }
    }
}

fn check_tools(transport: &ProcessTransport, plan: Option<&DeployPlan>, issues: &mut Vec<Issue>) {
    ui::section("Local Tools");

    let ssh = plan.map_or("ssh", |p| p.ssh.as_str());
    let helper = plan.map_or("sshpass", |p| p.helper.as_str());

    for tool in local_tools(ssh, helper) {
        if transport.tool_exists(tool.name) {
            println!("  {} {} - {}", "✓".green(), tool.name, tool.desc.dimmed());
            continue;
        }

        let marker = if tool.required { "✗".red() } else { "⚠".yellow() };
        println!(
            "  {} {} - {} {}",
            marker,
            tool.name,
            tool.desc,
            "(missing)".red()
        );
        issues.push(missing_tool_issue(&tool));
    }
}

struct LocalTool<'a> {
    name: &'a str,
    desc: &'static str,
    required: bool,
    install_hint: &'static str,
}

/// Tools the deployment and its manual fallback rely on locally.
fn local_tools<'a>(ssh: &'a str, helper: &'a str) -> [LocalTool<'a>; 3] {
    [
        LocalTool {
            name: ssh,
            desc: "Remote execution",
            required: true,
            install_hint: "Install the OpenSSH client",
        },
        LocalTool {
            name: helper,
            desc: "Password authentication",
            required: false,
            install_hint: "apt install sshpass  # or: brew install hudochenkov/sshpass/sshpass",
        },
        LocalTool {
            name: "curl",
            desc: "Fetching the deploy script by hand",
            required: false,
            install_hint: "apt install curl  # or: brew install curl",
        },
    ]
}

fn missing_tool_issue(tool: &LocalTool) -> Issue {
    Issue {
        category: "Local Tools",
        summary: format!("{} is not installed", tool.name),
        detail: Some(if tool.required {
            format!(
                "{}: no automated deployment is possible without it",
                tool.desc
            )
        } else {
            format!("{} will not be available", tool.desc)
        }),
        fix: Some(format!("Install {}", tool.name)),
        fix_cmd: Some(tool.install_hint.to_string()),
    }
}

fn check_ssh_keys(issues: &mut Vec<Issue>) {
    ui::section("SSH Keys");

    let Some(ssh_dir) = dirs::home_dir().map(|h| h.join(".ssh")) else {
        ui::warn("Could not determine home directory");
        return;
    };

    let found: Vec<&str> = DEFAULT_KEYS
        .iter()
        .copied()
        .filter(|k| ssh_dir.join(k).exists())
        .collect();

    if found.is_empty() {
        println!("  {} no default key in {}", "⚠".yellow(), ssh_dir.display());
        issues.push(Issue {
            category: "SSH Keys",
            summary: "No default SSH key found".into(),
            detail: Some("Key-based deployment relies on ssh's default identities".into()),
            fix: Some("Generate a key and install it on the server".into()),
            fix_cmd: Some("ssh-keygen -t ed25519 && ssh-copy-id <user>@<host>".into()),
        });
    } else {
        for key in found {
            println!("  {} {}", "✓".green(), ssh_dir.join(key).display());
        }
    }
}

fn check_plan(plan: &DeployPlan, issues: &mut Vec<Issue>) {
    ui::section("Security");

    if plan.endpoint.secret.is_some() {
        println!("  {} password configured", "✓".green());
    } else {
        println!("  {} no password, sshpass attempt will be skipped", "-".dimmed());
    }

    if plan.host_keys == HostKeyPolicy::AcceptAny {
        println!("  {} host key verification disabled", "⚠".yellow());
        issues.push(Issue {
            category: "Security",
            summary: "Host key verification is disabled".into(),
            detail: Some("Any server answering on this address will be trusted".into()),
            fix: Some("Add the host to known_hosts and set [ssh].host_keys = \"strict\"".into()),
            fix_cmd: Some(format!("ssh-keyscan {} >> ~/.ssh/known_hosts", plan.endpoint.host)),
        });
    } else {
        println!("  {} host key verification enabled", "✓".green());
    }

    if plan.script.is_insecure() {
        println!("  {} script fetched over plain HTTP", "⚠".yellow());
        issues.push(Issue {
            category: "Security",
            summary: "Deploy script is fetched over plain HTTP".into(),
            detail: Some(plan.script.to_string()),
            fix: Some("Serve the script over HTTPS".into()),
            fix_cmd: None,
        });
    }
}

fn check_script_url(plan: &DeployPlan, issues: &mut Vec<Issue>) {
    ui::section("Script URL");

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(PROBE_TIMEOUT))
        .build()
        .into();

    match agent
        .head(plan.script.as_str())
        .header("User-Agent", "rdeploy-doctor")
        .call()
    {
        Ok(response) => {
            println!(
                "  {} {} ({})",
                "✓".green(),
                plan.script,
                response.status()
            );
        }
        Err(e) => {
            println!("  {} {} {}", "✗".red(), plan.script, format!("({e})").red());
            issues.push(Issue {
                category: "Script URL",
                summary: "Deploy script is not reachable".into(),
                detail: Some(e.to_string()),
                fix: Some("Check the URL and that the branch or file still exists".into()),
                fix_cmd: Some(format!("curl -fsSLI {}", plan.script)),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_tools_include_curl() {
        let tools = local_tools("ssh", "sshpass");
        let names: Vec<&str> = tools.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["ssh", "sshpass", "curl"]);

        let curl = tools.iter().find(|t| t.name == "curl").unwrap();
        assert!(!curl.required);
        assert!(curl.install_hint.contains("curl"));
    }

    #[test]
    fn test_local_tools_follow_configured_programs() {
        let tools = local_tools("/opt/ssh/bin/ssh", "/usr/local/bin/sshpass");
        assert_eq!(tools[0].name, "/opt/ssh/bin/ssh");
        assert!(tools[0].required);
        assert_eq!(tools[1].name, "/usr/local/bin/sshpass");
    }

    #[test]
    fn test_missing_curl_is_reported_with_fix() {
        let tools = local_tools("ssh", "sshpass");
        let issue = missing_tool_issue(&tools[2]);
        assert_eq!(issue.category, "Local Tools");
        assert_eq!(issue.summary, "curl is not installed");
        assert!(issue.detail.unwrap().contains("will not be available"));
        assert_eq!(issue.fix.as_deref(), Some("Install curl"));
        assert!(issue.fix_cmd.unwrap().starts_with("apt install curl"));
    }
}
