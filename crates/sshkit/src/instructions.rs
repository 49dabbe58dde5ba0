//! Manual deployment instructions, the terminal fallback.
//!
//! Rendering is plain text and depends only on its inputs, so the same
//! endpoint and command always produce the same bytes.

use std::fmt;

use crate::command::manual_one_liner;
use crate::types::{DocLink, Endpoint};

const RULE_WIDTH: usize = 70;

/// Everything an operator needs to run the deployment by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualInstructions {
    endpoint: Endpoint,
    command: String,
    one_liner: String,
    docs: Vec<DocLink>,
}

impl ManualInstructions {
    pub fn new(endpoint: &Endpoint, command: &str, docs: &[DocLink]) -> Self {
        Self {
            endpoint: endpoint.clone(),
            command: command.to_string(),
            one_liner: manual_one_liner(endpoint, command),
            docs: docs.to_vec(),
        }
    }

    /// The command to run on the remote host.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Single copy-paste line combining login and command.
    pub fn one_liner(&self) -> &str {
        &self.one_liner
    }

    fn login_command(&self) -> String {
        if self.endpoint.has_custom_port() {
            format!("ssh -p {} {}", self.endpoint.port, self.endpoint.destination())
        } else {
            format!("ssh {}", self.endpoint.destination())
        }
    }

    /// Render the full instruction block.
    pub fn render(&self) -> String {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);
        let password = self
            .endpoint
            .secret
            .as_ref()
            .map_or("(not configured)", |s| s.expose());

        let mut lines = vec![
            heavy.clone(),
            "MANUAL DEPLOYMENT INSTRUCTIONS".to_string(),
            heavy.clone(),
            String::new(),
            format!("Host: {}", self.endpoint.host),
            format!("Port: {}", self.endpoint.port),
            format!("User: {}", self.endpoint.user),
            String::new(),
            "Step 1: Connect to the server".to_string(),
            light.clone(),
            self.login_command(),
            format!("Password: {password}"),
            String::new(),
            "Step 2: Run the deployment script".to_string(),
            light,
            self.command.clone(),
            String::new(),
            heavy.clone(),
            String::new(),
            "Or as a single command (copy and paste into your terminal):".to_string(),
            String::new(),
            self.one_liner.clone(),
            String::new(),
            "(You will be prompted for the password)".to_string(),
            String::new(),
        ];

        if !self.docs.is_empty() {
            lines.push(heavy.clone());
            lines.extend(self.docs.iter().map(|d| format!("{}: {}", d.label, d.path)));
        }
        lines.push(heavy);

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

impl fmt::Display for ManualInstructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
