//! Builders for the remote command and the ssh invocations that carry it.
//!
//! Everything here is pure string assembly so the exact argument vectors
//! can be asserted in tests without running anything.

use crate::error::{Error, Result};
use crate::types::{DeployPlan, Endpoint, HostKeyPolicy, Invocation, ScriptRef};

/// Environment variable `sshpass -e` reads the password from.
pub const SSHPASS_ENV: &str = "SSHPASS";

/// The command run on the remote host: fetch the script and pipe it into
/// the interpreter.
///
/// The URL is quoted when it carries shell metacharacters (`&`, `;`, `$`),
/// so query strings reach curl intact.
pub fn remote_command(script: &ScriptRef, interpreter: &str) -> String {
    format!(
        "curl -fsSL {} | {interpreter}",
        shell_quote(script.as_str())
    )
}

/// `-o` options for a host key posture.
pub fn host_key_options(policy: HostKeyPolicy) -> Vec<String> {
    let options: &[&str] = match policy {
        HostKeyPolicy::AcceptAny => &[
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
        ],
        HostKeyPolicy::Strict => &["-o", "StrictHostKeyChecking=yes"],
    };
    options.iter().map(ToString::to_string).collect()
}

/// `-p <port>` when the port is not the ssh default.
fn port_args(endpoint: &Endpoint) -> Vec<String> {
    if endpoint.has_custom_port() {
        vec!["-p".to_string(), endpoint.port.to_string()]
    } else {
        Vec::new()
    }
}

/// Password-authenticated invocation through the forwarding helper.
///
/// The password travels in the helper's environment, never in argv.
pub fn forwarded_invocation(plan: &DeployPlan) -> Result<Invocation> {
    let secret = plan.endpoint.secret.clone().ok_or(Error::MissingSecret)?;

    Ok(Invocation::new(&plan.helper)
        .arg("-e")
        .arg(&plan.ssh)
        .args(host_key_options(plan.host_keys))
        .args(port_args(&plan.endpoint))
        .arg(plan.endpoint.destination())
        .arg(remote_command(&plan.script, &plan.interpreter))
        .env(SSHPASS_ENV, secret))
}

/// Key-based invocation. Password prompts are disabled so a missing key
/// fails fast instead of waiting for input.
pub fn key_invocation(plan: &DeployPlan) -> Invocation {
    Invocation::new(&plan.ssh)
        .args(host_key_options(plan.host_keys))
        .args([
            "-o",
            "PasswordAuthentication=no",
            "-o",
            "BatchMode=yes",
        ])
        .args(port_args(&plan.endpoint))
        .arg(plan.endpoint.destination())
        .arg(remote_command(&plan.script, &plan.interpreter))
}

/// Single copy-paste line equivalent to the automated attempts.
pub fn manual_one_liner(endpoint: &Endpoint, command: &str) -> String {
    let mut line = String::from("ssh ");
    if endpoint.has_custom_port() {
        line.push_str(&format!("-p {} ", endpoint.port));
    }
    line.push_str(&endpoint.destination());
    line.push(' ');
    line.push_str(&single_quote(command));
    line
}

/// Wrap a string in single quotes, escaping embedded quotes POSIX-style.
pub fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Quote only when the shell would otherwise split or expand the value.
pub fn shell_quote(value: &str) -> String {
    let is_plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if is_plain {
        value.to_string()
    } else {
        single_quote(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Secret;

    fn plan() -> DeployPlan {
        DeployPlan::new(
            Endpoint::new("203.0.113.7", "root").with_secret(Secret::new("s3cr3t")),
            ScriptRef::parse("https://example.com/deploy-server-side.sh").unwrap(),
        )
    }

    #[test]
    fn test_remote_command() {
        let plan = plan();
        assert_eq!(
            remote_command(&plan.script, "bash"),
            "curl -fsSL https://example.com/deploy-server-side.sh | bash"
        );
        assert_eq!(
            remote_command(&plan.script, "sh"),
            "curl -fsSL https://example.com/deploy-server-side.sh | sh"
        );
    }

    #[test]
    fn test_forwarded_invocation() {
        let invocation = forwarded_invocation(&plan()).unwrap();
        assert_eq!(invocation.program, "sshpass");
        assert_eq!(
            invocation.args,
            vec![
                "-e",
                "ssh",
                "-o",
                "StrictHostKeyChecking=no",
                "-o",
                "UserKnownHostsFile=/dev/null",
                "root@203.0.113.7",
                "curl -fsSL https://example.com/deploy-server-side.sh | bash",
            ]
        );
        assert_eq!(invocation.env.len(), 1);
        assert_eq!(invocation.env[0].0, SSHPASS_ENV);
        assert_eq!(invocation.env[0].1.expose(), "s3cr3t");
        assert!(!invocation.args.iter().any(|a| a.contains("s3cr3t")));
    }

    #[test]
    fn test_forwarded_invocation_requires_secret() {
        let mut plan = plan();
        plan.endpoint.secret = None;
        assert!(matches!(
            forwarded_invocation(&plan),
            Err(Error::MissingSecret)
        ));
    }

    #[test]
    fn test_key_invocation_disables_passwords() {
        let invocation = key_invocation(&plan());
        assert_eq!(invocation.program, "ssh");
        assert!(invocation.env.is_empty());
        let joined = invocation.args.join(" ");
        assert!(joined.contains("-o PasswordAuthentication=no"));
        assert!(joined.contains("-o BatchMode=yes"));
        assert!(joined.contains("-o StrictHostKeyChecking=no"));
        assert_eq!(
            invocation.args.last().unwrap(),
            "curl -fsSL https://example.com/deploy-server-side.sh | bash"
        );
    }

    #[test]
    fn test_strict_host_keys_never_disable_checking() {
        let mut plan = plan();
        plan.host_keys = HostKeyPolicy::Strict;

        let forwarded = forwarded_invocation(&plan).unwrap();
        let key = key_invocation(&plan);
        for args in [&forwarded.args, &key.args] {
            assert!(args.contains(&"StrictHostKeyChecking=yes".to_string()));
            assert!(!args.contains(&"StrictHostKeyChecking=no".to_string()));
            assert!(!args.contains(&"UserKnownHostsFile=/dev/null".to_string()));
        }
    }

    #[test]
    fn test_custom_port() {
        let mut plan = plan();
        plan.endpoint.port = 2222;

        let key = key_invocation(&plan);
        let dest = key.args.iter().position(|a| a == "root@203.0.113.7").unwrap();
        assert_eq!(key.args[dest - 2], "-p");
        assert_eq!(key.args[dest - 1], "2222");

        let line = manual_one_liner(&plan.endpoint, "true");
        assert_eq!(line, "ssh -p 2222 root@203.0.113.7 'true'");
    }

    #[test]
    fn test_manual_one_liner_is_verbatim() {
        let plan = plan();
        let command = remote_command(&plan.script, &plan.interpreter);
        assert_eq!(
            manual_one_liner(&plan.endpoint, &command),
            "ssh root@203.0.113.7 'curl -fsSL https://example.com/deploy-server-side.sh | bash'"
        );
    }

    #[test]
    fn test_query_string_url_is_quoted() {
        let script = ScriptRef::parse("https://example.com/deploy.sh?a=1&b=2").unwrap();
        let command = remote_command(&script, "bash");
        assert_eq!(
            command,
            "curl -fsSL 'https://example.com/deploy.sh?a=1&b=2' | bash"
        );

        let endpoint = Endpoint::new("203.0.113.7", "root");
        assert_eq!(
            manual_one_liner(&endpoint, &command),
            r"ssh root@203.0.113.7 'curl -fsSL '\''https://example.com/deploy.sh?a=1&b=2'\'' | bash'"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_query_string_url_reaches_curl_intact() {
        let script =
            ScriptRef::parse("https://example.com/deploy.sh?ref=main&token=abc;x=$HOME").unwrap();
        let command = remote_command(&script, "cat");
        let stub = format!("curl() {{ echo \"URL:$2\"; }}; {command}");

        let output = std::process::Command::new("sh")
            .args(["-c", &stub])
            .output()
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&output.stdout),
            "URL:https://example.com/deploy.sh?ref=main&token=abc;x=$HOME\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_one_liner_unwraps_to_remote_command() {
        let script = ScriptRef::parse("https://example.com/deploy.sh?a=1&b=2").unwrap();
        let command = remote_command(&script, "bash");
        let line = manual_one_liner(&Endpoint::new("203.0.113.7", "root"), &command);

        // Let sh strip one level of quoting, as the local shell does for ssh.
        let quoted = line.strip_prefix("ssh root@203.0.113.7 ").unwrap();
        let output = std::process::Command::new("sh")
            .args(["-c", &format!("printf %s {quoted}")])
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), command);
    }

    #[test]
    fn test_single_quote_escapes_quotes() {
        assert_eq!(single_quote("echo 'hi'"), r"'echo '\''hi'\'''");
        assert_eq!(single_quote(""), "''");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("root@host"), "root@host");
        assert_eq!(shell_quote("StrictHostKeyChecking=no"), "StrictHostKeyChecking=no");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
        assert_eq!(shell_quote(""), "''");
    }
}
