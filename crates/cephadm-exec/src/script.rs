//! Helper-payload assembly: turns a logical remote command into the bytes
//! that actually cross the wire, for both dispatch modes of §4.A.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::result::DispatchMode;

/// Remote interpreters tried in order when shipping the helper script in
/// [`DispatchMode::Root`] — the target host may lack any particular one.
pub const KNOWN_INTERPRETERS: &[&str] =
    &["python3", "python3.9", "python3.8", "python3.6", "/usr/bin/python3"];

/// The helper payload itself lives in the remote helper binary, which §1
/// lists as an out-of-scope collaborator. This placeholder marks where it
/// would be spliced onto the prelude for a `DispatchMode::Root` dispatch.
pub const HELPER_PAYLOAD_PLACEHOLDER: &str =
    "# --- helper payload omitted (out of scope, see SPEC_FULL.md section 1) ---\n";

/// Name of the installed helper binary invoked under `DispatchMode::Packaged`.
pub const PACKAGED_HELPER_BIN: &str = "cephadm";

/// stdin payload shape shared by `deploy`/`reconfig` (§6 wire format).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StdinPayload {
    /// Minimal cluster config (ceph.conf-equivalent)
    pub config: Option<String>,
    /// Daemon keyring
    pub keyring: Option<String>,
    /// Per-host crash-daemon keyring
    pub crash_keyring: Option<String>,
}

impl StdinPayload {
    /// True when there is nothing to send
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.config.is_none() && self.keyring.is_none() && self.crash_keyring.is_none()
    }

    /// Serialize to the JSON object shape expected on stdin
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization somehow fails (it will
    /// not for this type, but the signature keeps call sites uniform).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A fully-specified remote invocation: `run(host, entity, command, args,
/// stdin?, image?, no_fsid?, error_ok?)` from §4.A, minus the host/entity
/// which the caller resolves through the inventory before building this.
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    /// e.g. `ls`, `deploy`, `rm-daemon`, `check-host`, `inspect-image`, `pull`, `unit`
    pub command: String,
    /// Positional/flag arguments appended after `--fsid`
    pub args: Vec<String>,
    /// Optional stdin payload (config/keyring/crash-keyring JSON)
    pub stdin: Option<StdinPayload>,
    /// Container image reference; when absent the executor resolves one
    /// from the config store before dispatch.
    pub image: Option<String>,
    /// Cluster fsid to pass via `--fsid`; omitted entirely when `no_fsid`.
    pub fsid: Option<String>,
    /// Suppress `--fsid` even if one is known (used for bootstrap-adjacent calls)
    pub no_fsid: bool,
    /// When true, transport/exit failures are returned as data instead of an error
    pub error_ok: bool,
}

impl RemoteCommand {
    /// Start building a command with no arguments, image, or stdin
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            stdin: None,
            image: None,
            fsid: None,
            no_fsid: false,
            error_ok: false,
        }
    }

    /// Append arguments
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    /// Attach a stdin payload
    #[must_use]
    pub fn with_stdin(mut self, stdin: StdinPayload) -> Self {
        self.stdin = Some(stdin);
        self
    }

    /// Pin a specific image rather than resolving one from config
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Attach the cluster fsid
    #[must_use]
    pub fn with_fsid(mut self, fsid: impl Into<String>) -> Self {
        self.fsid = Some(fsid.into());
        self
    }

    /// Mark the call as error-tolerant
    #[must_use]
    pub fn error_ok(mut self) -> Self {
        self.error_ok = true;
        self
    }

    /// Build the full argument vector: `[--image IMG, command, --fsid FSID?, ...args]`
    #[must_use]
    pub fn build_argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 4);
        if let Some(image) = &self.image {
            argv.push("--image".to_string());
            argv.push(image.clone());
        }
        argv.push(self.command.clone());
        if !self.no_fsid
            && let Some(fsid) = &self.fsid
        {
            argv.push("--fsid".to_string());
            argv.push(fsid.clone());
        }
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// Build the shell-level invocation string and raw stdin bytes for a
/// command, given the dispatch mode. The returned stdin, when present, is
/// what must be written to the channel after `exec`.
#[must_use]
pub fn build_invocation(cmd: &RemoteCommand, mode: DispatchMode) -> (String, Option<String>) {
    let argv = cmd.build_argv();
    let stdin_json = cmd
        .stdin
        .as_ref()
        .filter(|s| !s.is_empty())
        .and_then(|s| s.to_json().ok());

    match mode {
        DispatchMode::Packaged => {
            let quoted: Vec<String> = argv.iter().map(|a| shell_quote(a)).collect();
            let line = format!("sudo {PACKAGED_HELPER_BIN} {}", quoted.join(" "));
            (line, stdin_json)
        }
        DispatchMode::Root => {
            let interpreter = KNOWN_INTERPRETERS
                .first()
                .copied()
                .unwrap_or("python3");
            let script = build_root_script(&argv, stdin_json.as_deref());
            (format!("{interpreter} -"), Some(script))
        }
    }
}

/// Compose the prelude (injected argv, optional injected stdin literal) with
/// the helper payload, matching §4.A's root dispatch description.
fn build_root_script(argv: &[String], stdin_json: Option<&str>) -> String {
    let argv_literal = json!(argv);
    let mut prelude = format!("import sys, json\nsys.argv = {argv_literal}\n");
    if let Some(stdin) = stdin_json {
        prelude.push_str(&format!(
            "__cephadm_stdin__ = {}\n",
            json!(stdin)
        ));
    }
    format!("{prelude}{HELPER_PAYLOAD_PLACEHOLDER}")
}

fn shell_quote(arg: &str) -> String {
    if arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':'))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_argv_orders_image_command_fsid_args() {
        let cmd = RemoteCommand::new("deploy")
            .with_image("quay.io/ceph/ceph:v18")
            .with_fsid("abc-123")
            .with_args(["--name".to_string(), "mon.a".to_string()]);

        assert_eq!(
            cmd.build_argv(),
            vec![
                "--image",
                "quay.io/ceph/ceph:v18",
                "deploy",
                "--fsid",
                "abc-123",
                "--name",
                "mon.a",
            ]
        );
    }

    #[test]
    fn no_fsid_suppresses_flag_even_when_known() {
        let mut cmd = RemoteCommand::new("check-host").with_fsid("abc-123");
        cmd.no_fsid = true;

        assert_eq!(cmd.build_argv(), vec!["check-host"]);
    }

    #[test]
    fn packaged_invocation_quotes_unsafe_arguments() {
        let cmd = RemoteCommand::new("deploy").with_args(["--name".to_string(), "mon a".to_string()]);
        let (line, stdin) = build_invocation(&cmd, DispatchMode::Packaged);

        assert!(line.starts_with("sudo cephadm deploy"));
        assert!(line.contains("'mon a'"));
        assert!(stdin.is_none());
    }

    #[test]
    fn root_invocation_embeds_argv_and_stdin() {
        let cmd = RemoteCommand::new("deploy").with_stdin(StdinPayload {
            config: Some("minimal conf".into()),
            keyring: None,
            crash_keyring: None,
        });
        let (line, stdin) = build_invocation(&cmd, DispatchMode::Root);

        assert!(line.contains("python3"));
        let script = stdin.expect("root dispatch always carries a script body");
        assert!(script.contains("sys.argv"));
        assert!(script.contains("__cephadm_stdin__"));
        assert!(script.ends_with(HELPER_PAYLOAD_PLACEHOLDER));
    }
}
